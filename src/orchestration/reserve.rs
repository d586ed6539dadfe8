use solana_sdk::pubkey::Pubkey;

use crate::config::AssetSpec;
use crate::orchestration::keyring::Keyring;

/// Every account that makes up one asset's reserve, from the client's side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveContext {
    pub symbol: String,
    /// Mint of the underlying asset
    pub liquidity_mint: Pubkey,
    /// Owner's token account holding the underlying asset
    pub user_liquidity: Pubkey,
    /// Receives the host share of borrow and flash loan fees
    pub host_fee_receiver: Pubkey,
    /// Reserve-owned account holding deposited liquidity
    pub liquidity_supply: Pubkey,
    /// Receives the protocol share of fees
    pub fee_receiver: Pubkey,
    pub collateral_mint: Pubkey,
    /// Owner's collateral token account
    pub user_collateral: Pubkey,
    /// Reserve-owned account holding collateral pledged to obligations
    pub collateral_supply: Pubkey,
    pub price_product: Pubkey,
    pub price: Pubkey,
    pub reserve: Pubkey,
}

/// Accounts provisioned client-side before a reserve can be initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetAccounts {
    pub mint: Pubkey,
    pub user: Pubkey,
    pub host: Pubkey,
}

impl ReserveContext {
    /// Allocates fresh keys for the program-initialized accounts of a new reserve
    pub fn allocate(asset: &AssetSpec, provisioned: AssetAccounts, keyring: &mut Keyring) -> Self {
        Self {
            symbol: asset.symbol.clone(),
            liquidity_mint: provisioned.mint,
            user_liquidity: provisioned.user,
            host_fee_receiver: provisioned.host,
            liquidity_supply: keyring.generate(),
            fee_receiver: keyring.generate(),
            collateral_mint: keyring.generate(),
            user_collateral: keyring.generate(),
            collateral_supply: keyring.generate(),
            price_product: asset.price_product,
            price: asset.price,
            reserve: keyring.generate(),
        }
    }
}
