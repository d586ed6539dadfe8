//! Lending Scenario - end-to-end run against a live cluster
//!
//! Creates a market, one reserve and an obligation, moves liquidity in and
//! out, takes a flash loan and checks the balances after each phase.
//!
//! # Usage
//!
//! ```bash
//! # Devnet with a fresh, airdropped owner
//! cargo run --bin lending-scenario
//!
//! # Local validator with an existing keypair and a config override
//! export LENDING_RPC_URL="http://127.0.0.1:8899"
//! cargo run --bin lending-scenario -- --config lending.json --keypair ~/.config/solana/id.json
//! ```

use anyhow::{ensure, Context};
use clap::Parser;
use solana_lending_sdk::prelude::*;
use solana_sdk::signature::{read_keypair_file, Keypair};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lending-scenario")]
#[command(about = "Runs the lending lifecycle scenario against a Solana cluster", long_about = None)]
struct Args {
    /// JSON-RPC endpoint, overrides the config file
    #[arg(short = 'u', long = "rpc-url", env = "LENDING_RPC_URL")]
    rpc_url: Option<String>,

    /// JSON config file; defaults apply for anything it leaves out
    #[arg(short = 'c', long = "config", env = "LENDING_CONFIG")]
    config: Option<PathBuf>,

    /// Market owner keypair; a fresh one is generated and airdropped when omitted
    #[arg(short = 'k', long = "keypair", env = "LENDING_KEYPAIR")]
    keypair: Option<PathBuf>,

    /// Asset to open the reserve for
    #[arg(short = 'a', long = "asset", default_value = "ETH")]
    asset: String,

    /// Tokens minted to the owner
    #[arg(long = "mint-amount", default_value = "100")]
    mint_amount: u64,

    /// Tokens deposited when the reserve is created
    #[arg(long = "initial-deposit", default_value = "40")]
    initial_deposit: u64,

    /// Skip the owner airdrop
    #[arg(long = "skip-airdrop")]
    skip_airdrop: bool,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        Ok(config)
    }

    fn load_owner(&self) -> anyhow::Result<Keypair> {
        match &self.keypair {
            Some(path) => read_keypair_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to read keypair {}: {}", path.display(), e)),
            None => Ok(Keypair::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.load_config()?;
    let owner = args.load_owner()?;
    let asset = args.asset.clone();
    let (mint_amount, initial_deposit) = (args.mint_amount, args.initial_deposit);
    ensure!(
        initial_deposit <= mint_amount,
        "initial deposit {} exceeds minted amount {}",
        initial_deposit,
        mint_amount
    );

    let ledger = RpcLedger::new(config.rpc_url.clone(), config.commitment_config());
    let version = ledger.cluster_version().await.context("Failed to reach cluster")?;

    log::info!("=== Lending Scenario ===");
    log::info!("Endpoint: {} (solana-core {})", ledger.url(), version);
    log::info!("Lending program: {}", config.lending_program_id);
    log::info!("Asset: {} ({} minted, {} seeded)", asset, mint_amount, initial_deposit);
    log::info!("========================\n");

    let mut client = LendingClient::new(ledger, config, owner)?;
    if !args.skip_airdrop {
        client.fund_owner().await.context("Failed to fund market owner")?;
    }

    // --- setup
    client.init_market().await?;
    client.init_reserve(&asset, mint_amount, initial_deposit).await?;
    client.init_obligation().await?;

    let report = client.portfolio_metrics().await?;
    report.log_report();
    let metrics = client.metrics(&asset).await?;
    ensure!(metrics.user == mint_amount - initial_deposit, "user balance {} after setup", metrics.user);
    ensure!(metrics.liquidity_supply == initial_deposit, "supply {} after setup", metrics.liquidity_supply);
    ensure!(metrics.user_collateral == initial_deposit, "collateral {} after setup", metrics.user_collateral);
    ensure!(
        metrics.reserve.liquidity.available_amount == initial_deposit,
        "available liquidity {} after setup",
        metrics.reserve.liquidity.available_amount
    );

    // --- liquidity in and out
    client.deposit_liquidity(&asset, 20).await?;
    client.redeem_collateral(&asset, 10).await?;

    client.portfolio_metrics().await?.log_report();
    let metrics = client.metrics(&asset).await?;
    ensure!(
        metrics.user == mint_amount - initial_deposit - 20 + 10,
        "user balance {} after deposit/redeem",
        metrics.user
    );
    ensure!(
        metrics.liquidity_supply == initial_deposit + 20 - 10,
        "supply {} after deposit/redeem",
        metrics.liquidity_supply
    );

    // --- flash loan
    let before = client.portfolio_metrics().await?;
    let before_asset = client.metrics(&asset).await?;
    client.borrow_flash_loan(&asset, 10).await?;

    let after = client.portfolio_metrics().await?;
    after.log_report();
    let after_asset = client.metrics(&asset).await?;
    ensure!(
        after.obligation.as_ref().map(|o| o.borrowed_value) == before.obligation.as_ref().map(|o| o.borrowed_value),
        "flash loan left a standing borrow"
    );
    ensure!(after_asset.fee_receiver > before_asset.fee_receiver, "protocol fee did not increase");
    ensure!(after_asset.host > before_asset.host, "host fee did not increase");

    log::info!("✅ All checks passed");
    Ok(())
}
