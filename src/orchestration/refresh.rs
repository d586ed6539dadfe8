//! Refresh instructions that must precede any action reading reserve or
//! obligation valuations in the same bundle.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};

use crate::orchestration::portfolio::PortfolioSnapshot;
use crate::orchestration::reserve::ReserveContext;
use crate::protocol::instruction;

/// Recomputes a reserve's price and interest
pub fn reserve_refresh(program_id: Pubkey, reserve: &ReserveContext) -> Instruction {
    instruction::refresh_reserve(program_id, reserve.reserve, reserve.price)
}

/// Recomputes an obligation's valuations over exactly the reserves in the snapshot
pub fn obligation_refresh(program_id: Pubkey, snapshot: &PortfolioSnapshot) -> Instruction {
    instruction::refresh_obligation(program_id, snapshot.obligation, snapshot.refresh_reserves())
}

/// Ordered refreshes: reserves as given, then at most one obligation
#[derive(Debug, Clone)]
pub struct RefreshPlan {
    instructions: Vec<Instruction>,
    reserve_count: usize,
}

impl RefreshPlan {
    pub fn for_reserves<'a, I>(program_id: Pubkey, reserves: I) -> Self
    where
        I: IntoIterator<Item = &'a ReserveContext>,
    {
        let instructions: Vec<Instruction> = reserves
            .into_iter()
            .map(|reserve| reserve_refresh(program_id, reserve))
            .collect();
        Self {
            reserve_count: instructions.len(),
            instructions,
        }
    }

    pub fn with_obligation<'a, I>(program_id: Pubkey, reserves: I, snapshot: &PortfolioSnapshot) -> Self
    where
        I: IntoIterator<Item = &'a ReserveContext>,
    {
        let mut plan = Self::for_reserves(program_id, reserves);
        plan.instructions.push(obligation_refresh(program_id, snapshot));
        plan
    }

    pub fn reserve_count(&self) -> usize {
        self.reserve_count
    }

    pub fn refreshes_obligation(&self) -> bool {
        self.instructions.len() > self.reserve_count
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }
}
