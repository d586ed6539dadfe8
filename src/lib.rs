//! Solana Lending SDK - client-side orchestration for an SPL token-lending market
//!
//! Drives a lending market through its lifecycle: market and reserve setup,
//! liquidity deposits and redemptions, obligation collateral, borrowing,
//! repayment, liquidation and flash loans. Every action is composed into one
//! atomically submitted bundle whose refreshes always precede the operation
//! that reads them.
//!
//! # Example Usage
//!
//! ```no_run
//! use solana_lending_sdk::prelude::*;
//! use solana_sdk::signature::Keypair;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::default();
//!     let ledger = RpcLedger::new(config.rpc_url.clone(), config.commitment_config());
//!     let mut client = LendingClient::new(ledger, config, Keypair::new())?;
//!
//!     client.fund_owner().await?;
//!     client.init_market().await?;
//!     client.init_reserve("ETH", 100, 40).await?;
//!     client.borrow_flash_loan("ETH", 10).await?;
//!
//!     client.portfolio_metrics().await?.log_report();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod orchestration;
pub mod protocol;

// Re-export commonly used types
pub use config::{AssetSpec, ClientConfig};
pub use error::{LedgerError, LendingClientError, Result};
pub use execution::{LedgerClient, RpcLedger, SimulationOutcome};
pub use orchestration::{
    derive_market_authority, Action, ActionKind, AssetMetrics, LendingClient, MarketAuthority,
    OperationBundle, PortfolioMetrics, PortfolioSnapshot, PortfolioTracker, ReserveContext, ReserveRole,
    Step,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{AssetSpec, ClientConfig};
    pub use crate::error::{LedgerError, LendingClientError};
    pub use crate::execution::{LedgerClient, RpcLedger, SimulationOutcome};
    pub use crate::orchestration::{
        Action, ActionKind, AssetMetrics, LendingClient, MarketAuthority, OperationBundle,
        PortfolioMetrics, ReserveRole, Step,
    };
    pub use crate::protocol::{ReserveConfig, ReserveFees};
}
