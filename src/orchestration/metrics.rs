use solana_sdk::pubkey::Pubkey;

use super::read_state;
use crate::error::{LendingClientError, Result};
use crate::execution::LedgerClient;
use crate::orchestration::reserve::ReserveContext;
use crate::protocol::{Obligation, Reserve};

/// Token balances around one reserve plus its parsed state
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMetrics {
    pub symbol: String,
    pub user: u64,
    pub host: u64,
    pub liquidity_supply: u64,
    pub fee_receiver: u64,
    pub user_collateral: u64,
    pub collateral_supply: u64,
    pub reserve: Reserve,
}

impl AssetMetrics {
    pub async fn read<L: LedgerClient + ?Sized>(ledger: &L, ctx: &ReserveContext) -> Result<Self> {
        Ok(Self {
            symbol: ctx.symbol.clone(),
            user: balance(ledger, &ctx.user_liquidity).await?,
            host: balance(ledger, &ctx.host_fee_receiver).await?,
            liquidity_supply: balance(ledger, &ctx.liquidity_supply).await?,
            fee_receiver: balance(ledger, &ctx.fee_receiver).await?,
            user_collateral: balance(ledger, &ctx.user_collateral).await?,
            collateral_supply: balance(ledger, &ctx.collateral_supply).await?,
            reserve: read_state(ledger, &ctx.reserve, "reserve").await?,
        })
    }
}

async fn balance<L: LedgerClient + ?Sized>(ledger: &L, account: &Pubkey) -> Result<u64> {
    ledger
        .token_balance(account)
        .await
        .map_err(|source| LendingClientError::StateRead {
            address: *account,
            source,
        })
}

/// Snapshot of everything the client reports on
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioMetrics {
    /// None until the obligation has been initialized
    pub obligation: Option<Obligation>,
    pub assets: Vec<AssetMetrics>,
}

impl PortfolioMetrics {
    pub fn asset(&self, symbol: &str) -> Option<&AssetMetrics> {
        self.assets.iter().find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn log_report(&self) {
        log::info!("📊 ─────────────── lending metrics ───────────────");
        for asset in &self.assets {
            log::info!(
                "{} | user {} | host {} | supply {} | fees {} | lp user {} | lp supply {}",
                asset.symbol,
                asset.user,
                asset.host,
                asset.liquidity_supply,
                asset.fee_receiver,
                asset.user_collateral,
                asset.collateral_supply
            );
            log::info!(
                "{} reserve | available {} | borrowed {:.4} | lp minted {}",
                asset.symbol,
                asset.reserve.liquidity.available_amount,
                asset.reserve.liquidity.borrowed_amount_wads.to_f64(),
                asset.reserve.collateral.mint_total_supply
            );
        }
        match &self.obligation {
            Some(obligation) => log::info!(
                "obligation | deposited {:.4} | borrowed {:.4} | allowed {:.4} | unhealthy {:.4}",
                obligation.deposited_value.to_f64(),
                obligation.borrowed_value.to_f64(),
                obligation.allowed_borrow_value.to_f64(),
                obligation.unhealthy_borrow_value.to_f64()
            ),
            None => log::info!("obligation | not initialized"),
        }
    }
}
