use solana_sdk::pubkey::Pubkey;

use crate::error::{LendingClientError, Result};

/// Program-derived address that signs every privileged transfer of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketAuthority {
    pub address: Pubkey,
    pub bump_seed: u8,
}

impl MarketAuthority {
    /// Re-derives the address from the stored bump and checks it matches
    pub fn verify(&self, market: &Pubkey, program_id: &Pubkey) -> bool {
        Pubkey::create_program_address(&[market.as_ref(), &[self.bump_seed]], program_id)
            .map(|address| address == self.address)
            .unwrap_or(false)
    }
}

/// Derives the market authority from the single seed `[market]`.
///
/// Pure and deterministic; callers may derive it as often as they like.
pub fn derive_market_authority(market: &Pubkey, program_id: &Pubkey) -> Result<MarketAuthority> {
    let (address, bump_seed) = Pubkey::try_find_program_address(&[market.as_ref()], program_id)
        .ok_or(LendingClientError::Derivation { market: *market })?;
    Ok(MarketAuthority { address, bump_seed })
}
