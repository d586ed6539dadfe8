use async_trait::async_trait;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
};

use crate::error::LedgerError;

/// Outcome of a dry-run submission
#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    /// Runtime error the bundle would fail with, if any
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationOutcome {
    pub fn would_succeed(&self) -> bool {
        self.err.is_none()
    }
}

/// Boundary to the remote ledger.
///
/// One call to [`LedgerClient::send_bundle`] is one transaction: every
/// instruction in it lands or none do. Implementations never retry.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Signs and submits `instructions` as one transaction, waiting for confirmation
    async fn send_bundle(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<Signature, LedgerError>;

    /// Same as `send_bundle` but only simulates; nothing is committed
    async fn simulate_bundle(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<SimulationOutcome, LedgerError>;

    /// Raw data of an account, `AccountNotFound` if it does not exist
    async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError>;

    /// Raw amount held by a token account
    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64, LedgerError>;

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError>;

    /// Lamport balance of an account
    async fn balance(&self, address: &Pubkey) -> Result<u64, LedgerError>;

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature, LedgerError>;
}
