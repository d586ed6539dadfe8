use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
};
use std::collections::HashMap;

use super::read_state;
use crate::config::{AssetSpec, ClientConfig};
use crate::error::{LendingClientError, Result};
use crate::execution::{LedgerClient, SimulationOutcome};
use crate::orchestration::authority::{derive_market_authority, MarketAuthority};
use crate::orchestration::bundle::{Action, ActionKind, BundleBuilder, BundleContext, OperationBundle, Step};
use crate::orchestration::keyring::Keyring;
use crate::orchestration::metrics::{AssetMetrics, PortfolioMetrics};
use crate::orchestration::portfolio::PortfolioTracker;
use crate::orchestration::provision::{
    create_mint_instructions, create_token_account_instructions, fund_payer, mint_to_instruction, RentSchedule,
};
use crate::orchestration::refresh::RefreshPlan;
use crate::orchestration::reserve::{AssetAccounts, ReserveContext};
use crate::protocol::instruction::quote_currency;

/// Reserve accounts created by an `init_reserve` call whose InitReserve did not land
struct StagedReserve {
    reserve: ReserveContext,
    /// Account-creation bundle already committed
    prefix_landed: bool,
}

/// Drives one market, its reserves and one obligation through their lifecycle.
///
/// Every mutating method takes `&mut self`, so a client has at most one
/// action in flight and the portfolio it syncs cannot change underneath it.
pub struct LendingClient<L: LedgerClient> {
    ledger: L,
    config: ClientConfig,
    keyring: Keyring,
    owner: Pubkey,
    market: Pubkey,
    authority: MarketAuthority,
    obligation: Pubkey,
    market_initialized: bool,
    obligation_initialized: bool,
    reserves: HashMap<String, ReserveContext>,
    staged: HashMap<String, StagedReserve>,
    portfolio: PortfolioTracker,
    rent: Option<RentSchedule>,
}

impl<L: LedgerClient> LendingClient<L> {
    /// Creates a client for a new market owned by `owner`.
    ///
    /// Market and obligation keys are generated here; nothing is submitted.
    pub fn new(ledger: L, config: ClientConfig, owner: Keypair) -> Result<Self> {
        let mut keyring = Keyring::new();
        let owner = keyring.insert(owner);
        let market = keyring.generate();
        let obligation = keyring.generate();
        let authority = derive_market_authority(&market, &config.lending_program_id)?;

        log::info!("Lending market {} (authority {}, bump {})", market, authority.address, authority.bump_seed);

        Ok(Self {
            ledger,
            config,
            keyring,
            owner,
            market,
            authority,
            obligation,
            market_initialized: false,
            obligation_initialized: false,
            reserves: HashMap::new(),
            staged: HashMap::new(),
            portfolio: PortfolioTracker::new(),
            rent: None,
        })
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn owner(&self) -> Pubkey {
        self.owner
    }

    pub fn market(&self) -> Pubkey {
        self.market
    }

    pub fn authority(&self) -> MarketAuthority {
        self.authority
    }

    pub fn obligation(&self) -> Pubkey {
        self.obligation
    }

    pub fn reserve(&self, asset: &str) -> Option<&ReserveContext> {
        self.reserve_key(asset).ok().and_then(|key| self.reserves.get(&key))
    }

    pub fn portfolio(&self) -> &PortfolioTracker {
        &self.portfolio
    }

    /// Airdrops the configured amount to the owner
    pub async fn fund_owner(&self) -> Result<u64> {
        fund_payer(&self.ledger, &self.owner, self.config.payer_airdrop_lamports).await
    }

    pub async fn init_market(&mut self) -> Result<Signature> {
        log::info!("🏦 Creating lending market {}", self.market);
        self.execute(Action::InitMarket).await
    }

    /// Creates the asset's mint and token accounts, then its reserve.
    ///
    /// `mint_amount` tokens are minted to the owner, `initial_deposit` of
    /// which seed the reserve. If a previous call created the accounts but
    /// its InitReserve was rejected, those accounts are reused and
    /// `mint_amount` is ignored.
    pub async fn init_reserve(&mut self, asset: &str, mint_amount: u64, initial_deposit: u64) -> Result<Signature> {
        self.require_market()?;
        let spec = self
            .config
            .asset(asset)
            .cloned()
            .ok_or_else(|| LendingClientError::UnknownAsset(asset.to_string()))?;
        if self.reserves.contains_key(&spec.symbol) {
            return Err(LendingClientError::DuplicateReserve(spec.symbol));
        }

        let mut staged = match self.staged.remove(&spec.symbol) {
            Some(staged) => {
                log::info!("Resuming {} reserve {} with its existing accounts", spec.symbol, staged.reserve.reserve);
                staged
            }
            None => {
                let accounts = self.provision_asset(&spec, mint_amount).await?;
                StagedReserve {
                    reserve: ReserveContext::allocate(&spec, accounts, &mut self.keyring),
                    prefix_landed: false,
                }
            }
        };
        log::info!("🏦 Creating {} reserve {}", spec.symbol, staged.reserve.reserve);

        match self.submit_reserve_setup(&mut staged, initial_deposit).await {
            Ok(signature) => {
                self.reserves.insert(spec.symbol, staged.reserve);
                Ok(signature)
            }
            Err(e) => {
                let r = &staged.reserve;
                log::warn!(
                    "⚠️ {} reserve setup failed, keeping mint {} and user account {} for a retry",
                    r.symbol,
                    r.liquidity_mint,
                    r.user_liquidity
                );
                if staged.prefix_landed {
                    log::warn!(
                        "   Created but not yet owned by a reserve: supply {}, fee receiver {}, collateral mint {}, user collateral {}, collateral supply {}",
                        r.liquidity_supply,
                        r.fee_receiver,
                        r.collateral_mint,
                        r.user_collateral,
                        r.collateral_supply
                    );
                }
                self.staged.insert(spec.symbol, staged);
                Err(e)
            }
        }
    }

    /// Accounts of a reserve whose setup was started but has not landed
    pub fn staged_reserve(&self, asset: &str) -> Option<&ReserveContext> {
        self.config
            .asset(asset)
            .and_then(|spec| self.staged.get(&spec.symbol))
            .map(|staged| &staged.reserve)
    }

    /// Mint, user and host token accounts, with `mint_amount` minted to the user
    async fn provision_asset(&mut self, spec: &AssetSpec, mint_amount: u64) -> Result<AssetAccounts> {
        let rent = self.rent().await?;

        log::info!("Preparing {} accounts ({} minted)", spec.symbol, mint_amount);
        let accounts = AssetAccounts {
            mint: self.keyring.generate(),
            user: self.keyring.generate(),
            host: self.keyring.generate(),
        };
        let mut setup = create_mint_instructions(&self.owner, &accounts.mint, &self.owner, spec.decimals, rent.mint)?;
        setup.extend(create_token_account_instructions(
            &self.owner,
            &accounts.user,
            &accounts.mint,
            &self.owner,
            rent.token_account,
        )?);
        setup.extend(create_token_account_instructions(
            &self.owner,
            &accounts.host,
            &accounts.mint,
            &self.owner,
            rent.token_account,
        )?);
        setup.push(mint_to_instruction(&accounts.mint, &accounts.user, &self.owner, mint_amount)?);
        self.send_instructions(&setup).await?;
        Ok(accounts)
    }

    /// Submits the reserve table, skipping the account prefix if it already landed
    async fn submit_reserve_setup(&mut self, staged: &mut StagedReserve, initial_deposit: u64) -> Result<Signature> {
        let action = Action::InitReserve {
            reserve: staged.reserve.clone(),
            initial_deposit,
        };
        let mut bundle = self.prepare(&action).await?;
        if staged.prefix_landed || !self.config.single_bundle_reserve_setup {
            if let Some(tail) = bundle.split_off(Step::CreateReserveAccount) {
                if !staged.prefix_landed {
                    self.submit(&bundle).await?;
                    staged.prefix_landed = true;
                }
                bundle = tail;
            }
        }
        self.submit(&bundle).await
    }

    pub async fn init_obligation(&mut self) -> Result<Signature> {
        log::info!("Creating obligation {}", self.obligation);
        self.execute(Action::InitObligation).await
    }

    pub async fn deposit_liquidity(&mut self, asset: &str, amount: u64) -> Result<Signature> {
        let asset = self.reserve_key(asset)?;
        log::info!("Depositing {} {} liquidity", amount, asset);
        self.execute(Action::DepositLiquidity { asset, amount }).await
    }

    pub async fn redeem_collateral(&mut self, asset: &str, amount: u64) -> Result<Signature> {
        let asset = self.reserve_key(asset)?;
        log::info!("Redeeming {} {} collateral", amount, asset);
        self.execute(Action::RedeemCollateral { asset, amount }).await
    }

    pub async fn deposit_obligation_collateral(&mut self, asset: &str, amount: u64) -> Result<Signature> {
        let asset = self.reserve_key(asset)?;
        log::info!("Depositing {} {} collateral into obligation", amount, asset);
        self.execute(Action::DepositObligationCollateral { asset, amount }).await
    }

    pub async fn withdraw_obligation_collateral(&mut self, asset: &str, amount: u64) -> Result<Signature> {
        let asset = self.reserve_key(asset)?;
        log::info!("Withdrawing {} {} collateral from obligation", amount, asset);
        self.execute(Action::WithdrawObligationCollateral { asset, amount }).await
    }

    pub async fn borrow_liquidity(
        &mut self,
        liquidity_asset: &str,
        collateral_asset: &str,
        amount: u64,
    ) -> Result<Signature> {
        let (liquidity_asset, collateral_asset) = self.pair_keys(liquidity_asset, collateral_asset)?;
        log::info!("Borrowing {} {} against {} collateral", amount, liquidity_asset, collateral_asset);
        self.execute(Action::BorrowObligationLiquidity {
            liquidity_asset,
            collateral_asset,
            amount,
        })
        .await
    }

    pub async fn repay_liquidity(
        &mut self,
        liquidity_asset: &str,
        collateral_asset: &str,
        amount: u64,
    ) -> Result<Signature> {
        let (liquidity_asset, collateral_asset) = self.pair_keys(liquidity_asset, collateral_asset)?;
        log::info!("Repaying {} {} borrowed liquidity", amount, liquidity_asset);
        self.execute(Action::RepayObligationLiquidity {
            liquidity_asset,
            collateral_asset,
            amount,
        })
        .await
    }

    pub async fn liquidate(&mut self, liquidity_asset: &str, collateral_asset: &str, amount: u64) -> Result<Signature> {
        let (liquidity_asset, collateral_asset) = self.pair_keys(liquidity_asset, collateral_asset)?;
        log::info!("Liquidating {} {} position against {}", amount, liquidity_asset, collateral_asset);
        self.execute(Action::LiquidateObligation {
            liquidity_asset,
            collateral_asset,
            amount,
        })
        .await
    }

    /// Borrows and returns `amount` within a single bundle
    pub async fn borrow_flash_loan(&mut self, asset: &str, amount: u64) -> Result<Signature> {
        let asset = self.reserve_key(asset)?;
        log::info!("⚡ Flash loan of {} {}", amount, asset);
        self.execute(Action::FlashLoan { asset, amount }).await
    }

    /// Refreshes every known reserve and then the obligation
    pub async fn refresh_obligation(&mut self) -> Result<Signature> {
        self.require_obligation()?;
        let snapshot = self.portfolio.sync(&self.ledger, &self.obligation).await?;

        let mut reserves: Vec<&ReserveContext> = self.reserves.values().collect();
        reserves.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        let plan = RefreshPlan::with_obligation(self.config.lending_program_id, reserves, snapshot);

        self.portfolio.invalidate();
        self.send_instructions(plan.instructions()).await
    }

    /// Builds the bundle for `action` without submitting it
    pub async fn preview(&mut self, action: &Action) -> Result<OperationBundle> {
        self.prepare(action).await
    }

    /// Builds and dry-runs `action`; nothing is committed
    pub async fn simulate(&mut self, action: &Action) -> Result<SimulationOutcome> {
        let bundle = self.prepare(action).await?;
        let signers = self.keyring.resolve(&self.signers_for(&bundle))?;
        let outcome = self
            .ledger
            .simulate_bundle(&bundle.instructions(), &self.owner, &signers)
            .await?;

        match &outcome.err {
            None => log::info!("🧪 {:?} would succeed ({:?} CU)", bundle.action, outcome.units_consumed),
            Some(err) => log::warn!("🧪 {:?} would fail: {}", bundle.action, err),
        }
        Ok(outcome)
    }

    /// Submits a prepared bundle as one transaction.
    ///
    /// Bundles built from a portfolio snapshot are refused once the tracker
    /// has moved on.
    pub async fn submit(&mut self, bundle: &OperationBundle) -> Result<Signature> {
        if let Some(sequence) = bundle.portfolio_sequence {
            self.portfolio.ensure_current(sequence)?;
        }
        bundle.check_refresh_order()?;

        let signers = self.keyring.resolve(&self.signers_for(bundle))?;
        if bundle.action.requires_portfolio() {
            self.portfolio.invalidate();
        }

        log::debug!("Submitting {:?}: {:?}", bundle.action, bundle.steps());
        let signature = self
            .ledger
            .send_bundle(&bundle.instructions(), &self.owner, &signers)
            .await?;
        log::info!("✅ {:?} confirmed: {}", bundle.action, signature);

        match bundle.action {
            ActionKind::InitMarket => self.market_initialized = true,
            ActionKind::InitObligation => self.obligation_initialized = true,
            _ => {}
        }
        Ok(signature)
    }

    /// Reads balances and reserve state for one asset
    pub async fn metrics(&self, asset: &str) -> Result<AssetMetrics> {
        let key = self.reserve_key(asset)?;
        let ctx = self
            .reserves
            .get(&key)
            .ok_or_else(|| LendingClientError::UnknownAsset(key.clone()))?;
        AssetMetrics::read(&self.ledger, ctx).await
    }

    /// Reads every asset's metrics and the obligation, if initialized
    pub async fn portfolio_metrics(&self) -> Result<PortfolioMetrics> {
        let mut contexts: Vec<&ReserveContext> = self.reserves.values().collect();
        contexts.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut assets = Vec::with_capacity(contexts.len());
        for ctx in contexts {
            assets.push(AssetMetrics::read(&self.ledger, ctx).await?);
        }
        let obligation = if self.obligation_initialized {
            Some(read_state(&self.ledger, &self.obligation, "obligation").await?)
        } else {
            None
        };
        Ok(PortfolioMetrics { obligation, assets })
    }

    async fn execute(&mut self, action: Action) -> Result<Signature> {
        let bundle = self.prepare(&action).await?;
        self.submit(&bundle).await
    }

    /// Syncs the portfolio when the action needs it and builds the bundle
    async fn prepare(&mut self, action: &Action) -> Result<OperationBundle> {
        let kind = action.kind();
        if kind != ActionKind::InitMarket {
            self.require_market()?;
        }
        if kind.requires_portfolio() {
            self.require_obligation()?;
            self.portfolio.sync(&self.ledger, &self.obligation).await?;
        }
        let rent = self.rent().await?;
        let quote = quote_currency(&self.config.quote_currency)
            .map_err(|_| LendingClientError::InvalidQuoteCurrency(self.config.quote_currency.clone()))?;

        let ctx = BundleContext {
            program_id: self.config.lending_program_id,
            oracle_program_id: self.config.oracle_program_id,
            flash_loan_receiver_program_id: self.config.flash_loan_receiver_program_id,
            quote_currency: quote,
            reserve_config: self.config.reserve_config,
            owner: self.owner,
            market: self.market,
            authority: self.authority,
            obligation: self.obligation,
            reserves: &self.reserves,
            rent,
            portfolio: self.portfolio.snapshot(),
        };
        BundleBuilder::new(ctx).build(action)
    }

    /// Submits plain instructions signed by whichever held keys they name
    async fn send_instructions(&self, instructions: &[Instruction]) -> Result<Signature> {
        let mut required = vec![self.owner];
        for meta in instructions.iter().flat_map(|ix| ix.accounts.iter()) {
            if meta.is_signer && !required.contains(&meta.pubkey) {
                required.push(meta.pubkey);
            }
        }
        let signers = self.keyring.resolve(&required)?;
        let signature = self.ledger.send_bundle(instructions, &self.owner, &signers).await?;
        log::debug!("Setup transaction confirmed: {}", signature);
        Ok(signature)
    }

    /// Payer first, then the bundle's signers
    fn signers_for(&self, bundle: &OperationBundle) -> Vec<Pubkey> {
        let mut signers = vec![self.owner];
        signers.extend(bundle.required_signers().into_iter().filter(|s| *s != self.owner));
        signers
    }

    async fn rent(&mut self) -> Result<RentSchedule> {
        if let Some(rent) = self.rent {
            return Ok(rent);
        }
        let rent = RentSchedule::fetch(&self.ledger).await?;
        self.rent = Some(rent);
        Ok(rent)
    }

    fn require_market(&self) -> Result<()> {
        if self.market_initialized {
            Ok(())
        } else {
            Err(LendingClientError::MarketNotInitialized)
        }
    }

    fn require_obligation(&self) -> Result<()> {
        self.require_market()?;
        if self.obligation_initialized {
            Ok(())
        } else {
            Err(LendingClientError::ObligationNotInitialized)
        }
    }

    /// Canonical symbol of a reserve this client created
    fn reserve_key(&self, asset: &str) -> Result<String> {
        self.reserves
            .keys()
            .find(|symbol| symbol.eq_ignore_ascii_case(asset))
            .cloned()
            .ok_or_else(|| LendingClientError::UnknownAsset(asset.to_string()))
    }

    fn pair_keys(&self, liquidity_asset: &str, collateral_asset: &str) -> Result<(String, String)> {
        Ok((self.reserve_key(liquidity_asset)?, self.reserve_key(collateral_asset)?))
    }
}

impl<L: LedgerClient> std::fmt::Debug for LendingClient<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LendingClient")
            .field("owner", &self.owner)
            .field("market", &self.market)
            .field("obligation", &self.obligation)
            .field("reserves", &self.reserves.keys().collect::<Vec<_>>())
            .finish()
    }
}
