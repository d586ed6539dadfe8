pub mod authority;
pub mod bundle;
pub mod client;
pub mod keyring;
pub mod metrics;
pub mod portfolio;
pub mod provision;
pub mod refresh;
pub mod reserve;

pub use authority::{derive_market_authority, MarketAuthority};
pub use bundle::{
    Action, ActionKind, BundleBuilder, BundleContext, Operation, OperationBundle, ReserveRole, Step,
};
pub use client::LendingClient;
pub use keyring::Keyring;
pub use metrics::{AssetMetrics, PortfolioMetrics};
pub use portfolio::{PortfolioSnapshot, PortfolioTracker};
pub use refresh::RefreshPlan;
pub use reserve::{AssetAccounts, ReserveContext};

use solana_program::program_pack::{IsInitialized, Pack};
use solana_sdk::pubkey::Pubkey;

use crate::error::{LendingClientError, Result};
use crate::execution::LedgerClient;

/// Reads and parses a program-owned account, naming it `kind` in errors
pub(crate) async fn read_state<T, L>(ledger: &L, address: &Pubkey, kind: &'static str) -> Result<T>
where
    T: Pack + IsInitialized,
    L: LedgerClient + ?Sized,
{
    let data = ledger
        .account_data(address)
        .await
        .map_err(|source| LendingClientError::StateRead {
            address: *address,
            source,
        })?;
    T::unpack(&data).map_err(|source| LendingClientError::UnparseableAccount {
        address: *address,
        kind,
        source,
    })
}
