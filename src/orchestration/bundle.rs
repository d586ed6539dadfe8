//! Turns one logical action into the ordered, atomically submitted set of
//! instructions that carries it out.
//!
//! Which primitive operations an action needs, and in what order, is fixed by
//! [`ActionKind::steps`]. The builder only maps each step to the instruction
//! constructor for that step, so no action can be assembled without its
//! refreshes.

use solana_program::program_pack::Pack;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_token::state::{Account as TokenAccount, Mint};
use std::collections::HashMap;

use crate::error::{LendingClientError, Result};
use crate::orchestration::authority::MarketAuthority;
use crate::orchestration::portfolio::PortfolioSnapshot;
use crate::orchestration::provision::{create_raw_account, RentSchedule};
use crate::orchestration::refresh::{obligation_refresh, reserve_refresh};
use crate::orchestration::reserve::ReserveContext;
use crate::protocol::{instruction, LendingMarket, Obligation, Reserve, ReserveConfig};

/// Which of an action's reserves a refresh targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReserveRole {
    /// The only reserve of a single-asset action
    Primary,
    /// Reserve liquidity is borrowed from, repaid to or liquidated against
    Liquidity,
    /// Reserve holding the collateral
    Collateral,
    /// Reserve already in the obligation but not named by the action
    Tracked,
}

/// One primitive operation class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CreateMarketAccount,
    InitMarket,
    CreateLiquiditySupply,
    CreateFeeReceiver,
    CreateCollateralMint,
    CreateUserCollateral,
    CreateCollateralSupply,
    CreateReserveAccount,
    InitReserve,
    CreateObligationAccount,
    InitObligation,
    /// Client-side: re-read the obligation before building; emits no instruction
    SyncPortfolio,
    RefreshReserve(ReserveRole),
    RefreshObligation,
    DepositLiquidity,
    RedeemCollateral,
    DepositObligationCollateral,
    WithdrawObligationCollateral,
    BorrowObligationLiquidity,
    RepayObligationLiquidity,
    LiquidateObligation,
    FlashLoan,
}

impl Step {
    pub fn is_client_side(&self) -> bool {
        matches!(self, Step::SyncPortfolio)
    }

    pub fn is_refresh(&self) -> bool {
        matches!(self, Step::RefreshReserve(_) | Step::RefreshObligation)
    }

    /// Steps whose outcome depends on refreshed valuations
    pub fn reads_valuations(&self) -> bool {
        matches!(
            self,
            Step::DepositLiquidity
                | Step::RedeemCollateral
                | Step::DepositObligationCollateral
                | Step::WithdrawObligationCollateral
                | Step::BorrowObligationLiquidity
                | Step::RepayObligationLiquidity
                | Step::LiquidateObligation
                | Step::FlashLoan
        )
    }
}

/// Every action the lifecycle manager can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    InitMarket,
    InitReserve,
    InitObligation,
    DepositLiquidity,
    RedeemCollateral,
    DepositObligationCollateral,
    WithdrawObligationCollateral,
    BorrowObligationLiquidity,
    RepayObligationLiquidity,
    LiquidateObligation,
    FlashLoan,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::InitMarket,
        ActionKind::InitReserve,
        ActionKind::InitObligation,
        ActionKind::DepositLiquidity,
        ActionKind::RedeemCollateral,
        ActionKind::DepositObligationCollateral,
        ActionKind::WithdrawObligationCollateral,
        ActionKind::BorrowObligationLiquidity,
        ActionKind::RepayObligationLiquidity,
        ActionKind::LiquidateObligation,
        ActionKind::FlashLoan,
    ];

    /// Ordered operation classes that make up the action
    pub fn steps(&self) -> &'static [Step] {
        use ReserveRole::*;
        use Step::*;

        match self {
            ActionKind::InitMarket => &[CreateMarketAccount, InitMarket],
            ActionKind::InitReserve => &[
                CreateLiquiditySupply,
                CreateFeeReceiver,
                CreateCollateralMint,
                CreateUserCollateral,
                CreateCollateralSupply,
                CreateReserveAccount,
                Step::InitReserve,
            ],
            ActionKind::InitObligation => &[CreateObligationAccount, Step::InitObligation],
            ActionKind::DepositLiquidity => &[RefreshReserve(Primary), Step::DepositLiquidity],
            ActionKind::RedeemCollateral => &[RefreshReserve(Primary), Step::RedeemCollateral],
            ActionKind::DepositObligationCollateral => &[
                SyncPortfolio,
                RefreshReserve(Collateral),
                RefreshObligation,
                Step::DepositObligationCollateral,
            ],
            ActionKind::WithdrawObligationCollateral => &[
                SyncPortfolio,
                RefreshReserve(Collateral),
                RefreshObligation,
                Step::WithdrawObligationCollateral,
            ],
            ActionKind::BorrowObligationLiquidity => &[
                SyncPortfolio,
                RefreshReserve(Liquidity),
                RefreshReserve(Collateral),
                RefreshObligation,
                Step::BorrowObligationLiquidity,
            ],
            ActionKind::RepayObligationLiquidity => &[
                SyncPortfolio,
                RefreshReserve(Liquidity),
                RefreshReserve(Collateral),
                RefreshObligation,
                Step::RepayObligationLiquidity,
            ],
            ActionKind::LiquidateObligation => &[
                SyncPortfolio,
                RefreshReserve(Liquidity),
                RefreshReserve(Collateral),
                RefreshObligation,
                Step::LiquidateObligation,
            ],
            ActionKind::FlashLoan => &[RefreshReserve(Primary), Step::FlashLoan],
        }
    }

    pub fn requires_portfolio(&self) -> bool {
        self.steps().contains(&Step::SyncPortfolio)
    }
}

/// A fully parameterized action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InitMarket,
    InitReserve {
        reserve: ReserveContext,
        initial_deposit: u64,
    },
    InitObligation,
    DepositLiquidity {
        asset: String,
        amount: u64,
    },
    RedeemCollateral {
        asset: String,
        amount: u64,
    },
    DepositObligationCollateral {
        asset: String,
        amount: u64,
    },
    WithdrawObligationCollateral {
        asset: String,
        amount: u64,
    },
    BorrowObligationLiquidity {
        liquidity_asset: String,
        collateral_asset: String,
        amount: u64,
    },
    RepayObligationLiquidity {
        liquidity_asset: String,
        collateral_asset: String,
        amount: u64,
    },
    LiquidateObligation {
        liquidity_asset: String,
        collateral_asset: String,
        amount: u64,
    },
    FlashLoan {
        asset: String,
        amount: u64,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::InitMarket => ActionKind::InitMarket,
            Action::InitReserve { .. } => ActionKind::InitReserve,
            Action::InitObligation => ActionKind::InitObligation,
            Action::DepositLiquidity { .. } => ActionKind::DepositLiquidity,
            Action::RedeemCollateral { .. } => ActionKind::RedeemCollateral,
            Action::DepositObligationCollateral { .. } => ActionKind::DepositObligationCollateral,
            Action::WithdrawObligationCollateral { .. } => ActionKind::WithdrawObligationCollateral,
            Action::BorrowObligationLiquidity { .. } => ActionKind::BorrowObligationLiquidity,
            Action::RepayObligationLiquidity { .. } => ActionKind::RepayObligationLiquidity,
            Action::LiquidateObligation { .. } => ActionKind::LiquidateObligation,
            Action::FlashLoan { .. } => ActionKind::FlashLoan,
        }
    }

    /// Token amount the mutating step moves, zero for account setup
    pub fn amount(&self) -> u64 {
        match self {
            Action::InitMarket | Action::InitObligation => 0,
            Action::InitReserve { initial_deposit, .. } => *initial_deposit,
            Action::DepositLiquidity { amount, .. }
            | Action::RedeemCollateral { amount, .. }
            | Action::DepositObligationCollateral { amount, .. }
            | Action::WithdrawObligationCollateral { amount, .. }
            | Action::BorrowObligationLiquidity { amount, .. }
            | Action::RepayObligationLiquidity { amount, .. }
            | Action::LiquidateObligation { amount, .. }
            | Action::FlashLoan { amount, .. } => *amount,
        }
    }

    /// Asset symbol playing `role` in this action
    fn asset(&self, role: ReserveRole) -> Option<&str> {
        match (self, role) {
            (Action::DepositLiquidity { asset, .. }, ReserveRole::Primary)
            | (Action::RedeemCollateral { asset, .. }, ReserveRole::Primary)
            | (Action::FlashLoan { asset, .. }, ReserveRole::Primary)
            | (Action::DepositObligationCollateral { asset, .. }, ReserveRole::Collateral)
            | (Action::WithdrawObligationCollateral { asset, .. }, ReserveRole::Collateral) => {
                Some(asset)
            }
            (Action::BorrowObligationLiquidity { liquidity_asset, .. }, ReserveRole::Liquidity)
            | (Action::RepayObligationLiquidity { liquidity_asset, .. }, ReserveRole::Liquidity)
            | (Action::LiquidateObligation { liquidity_asset, .. }, ReserveRole::Liquidity) => {
                Some(liquidity_asset)
            }
            (Action::BorrowObligationLiquidity { collateral_asset, .. }, ReserveRole::Collateral)
            | (Action::RepayObligationLiquidity { collateral_asset, .. }, ReserveRole::Collateral)
            | (Action::LiquidateObligation { collateral_asset, .. }, ReserveRole::Collateral) => {
                Some(collateral_asset)
            }
            (Action::InitReserve { reserve, .. }, ReserveRole::Primary) => Some(&reserve.symbol),
            _ => None,
        }
    }
}

/// One instruction tagged with the operation class that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub step: Step,
    pub instruction: Instruction,
}

/// Ordered operations submitted as one atomic unit
#[derive(Debug, Clone, PartialEq)]
pub struct OperationBundle {
    pub action: ActionKind,
    pub operations: Vec<Operation>,
    /// Portfolio snapshot the bundle was built from, for obligation actions
    pub portfolio_sequence: Option<u64>,
}

impl OperationBundle {
    pub fn steps(&self) -> Vec<Step> {
        self.operations.iter().map(|op| op.step).collect()
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        self.operations.iter().map(|op| op.instruction.clone()).collect()
    }

    pub fn position(&self, step: Step) -> Option<usize> {
        self.operations.iter().position(|op| op.step == step)
    }

    /// Distinct signer addresses in first-seen order
    pub fn required_signers(&self) -> Vec<Pubkey> {
        let mut signers: Vec<Pubkey> = Vec::new();
        for meta in self
            .operations
            .iter()
            .flat_map(|op| op.instruction.accounts.iter())
            .filter(|meta| meta.is_signer)
        {
            if !signers.contains(&meta.pubkey) {
                signers.push(meta.pubkey);
            }
        }
        signers
    }

    /// Checks that reserve refreshes precede the obligation refresh and that
    /// all refreshes precede every step reading valuations.
    pub fn check_refresh_order(&self) -> Result<()> {
        let obligation_refresh = self.position(Step::RefreshObligation);
        let first_reader = self
            .operations
            .iter()
            .position(|op| op.step.reads_valuations());

        if self.action.requires_portfolio() && obligation_refresh.is_none() {
            return Err(self.order_violation(Step::RefreshObligation, self.operations.len()));
        }

        for (position, op) in self.operations.iter().enumerate() {
            let before_obligation = match (op.step, obligation_refresh) {
                (Step::RefreshReserve(_), Some(obligation)) => position < obligation,
                _ => true,
            };
            let before_reader = match first_reader {
                Some(reader) if op.step.is_refresh() => position < reader,
                _ => true,
            };
            if !before_obligation || !before_reader {
                return Err(self.order_violation(op.step, position));
            }
        }
        Ok(())
    }

    fn order_violation(&self, step: Step, position: usize) -> LendingClientError {
        LendingClientError::RefreshOrder {
            action: self.action,
            step,
            position,
        }
    }

    /// Splits off the operations from `step` onwards into a second bundle,
    /// the way `Vec::split_off` does. Returns `None` if `step` is absent.
    pub fn split_off(&mut self, step: Step) -> Option<OperationBundle> {
        let at = self.position(step)?;
        Some(OperationBundle {
            action: self.action,
            operations: self.operations.split_off(at),
            portfolio_sequence: self.portfolio_sequence,
        })
    }
}

/// Everything the builder needs to know about the market being operated on
#[derive(Debug, Clone, Copy)]
pub struct BundleContext<'a> {
    pub program_id: Pubkey,
    pub oracle_program_id: Pubkey,
    pub flash_loan_receiver_program_id: Pubkey,
    pub quote_currency: [u8; 32],
    pub reserve_config: ReserveConfig,
    /// Market owner; also pays for and authorizes every operation
    pub owner: Pubkey,
    pub market: Pubkey,
    pub authority: MarketAuthority,
    pub obligation: Pubkey,
    pub reserves: &'a HashMap<String, ReserveContext>,
    pub rent: RentSchedule,
    pub portfolio: Option<&'a PortfolioSnapshot>,
}

/// Maps actions to bundles through [`ActionKind::steps`]
pub struct BundleBuilder<'a> {
    ctx: BundleContext<'a>,
}

impl<'a> BundleBuilder<'a> {
    pub fn new(ctx: BundleContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn build(&self, action: &Action) -> Result<OperationBundle> {
        let kind = action.kind();
        let portfolio = if kind.requires_portfolio() {
            let snapshot = self
                .ctx
                .portfolio
                .ok_or(LendingClientError::MissingPortfolio { action: kind })?;
            Some(snapshot)
        } else {
            None
        };

        let mut operations: Vec<Operation> = Vec::with_capacity(kind.steps().len());
        for step in kind.steps() {
            if let (Step::RefreshObligation, Some(snapshot)) = (*step, portfolio) {
                self.refresh_tracked(snapshot, &mut operations)?;
            }
            if let Some(instruction) = self.instruction_for(*step, action, portfolio)? {
                operations.push(Operation {
                    step: *step,
                    instruction,
                });
            }
        }

        let bundle = OperationBundle {
            action: kind,
            operations,
            portfolio_sequence: portfolio.map(|snapshot| snapshot.sequence),
        };
        bundle.check_refresh_order()?;

        log::debug!("Built {:?} bundle: {:?}", kind, bundle.steps());
        Ok(bundle)
    }

    /// Refreshes every reserve the obligation references that no earlier
    /// operation in the bundle has refreshed yet
    fn refresh_tracked(&self, snapshot: &PortfolioSnapshot, operations: &mut Vec<Operation>) -> Result<()> {
        for key in snapshot.refresh_reserves() {
            let refreshed = operations.iter().any(|op| {
                matches!(op.step, Step::RefreshReserve(_))
                    && op.instruction.accounts.first().map(|m| m.pubkey) == Some(key)
            });
            if refreshed {
                continue;
            }
            let reserve = self
                .ctx
                .reserves
                .values()
                .find(|r| r.reserve == key)
                .ok_or(LendingClientError::UntrackedReserve(key))?;
            operations.push(Operation {
                step: Step::RefreshReserve(ReserveRole::Tracked),
                instruction: reserve_refresh(self.ctx.program_id, reserve),
            });
        }
        Ok(())
    }

    fn reserve<'b>(&'b self, action: &'b Action, role: ReserveRole) -> Result<&'b ReserveContext> {
        if let Action::InitReserve { reserve, .. } = action {
            return Ok(reserve);
        }
        let symbol = action
            .asset(role)
            .ok_or_else(|| LendingClientError::UnknownAsset(format!("<{:?} asset>", role)))?;
        self.ctx
            .reserves
            .get(symbol)
            .ok_or_else(|| LendingClientError::UnknownAsset(symbol.to_string()))
    }

    fn instruction_for(
        &self,
        step: Step,
        action: &Action,
        portfolio: Option<&PortfolioSnapshot>,
    ) -> Result<Option<Instruction>> {
        let ctx = &self.ctx;
        let program_id = ctx.program_id;
        let amount = action.amount();
        let token_account = |address: &Pubkey| {
            create_raw_account(&ctx.owner, address, ctx.rent.token_account, TokenAccount::LEN, &spl_token::id())
        };

        let ix = match step {
            Step::SyncPortfolio => return Ok(None),
            Step::CreateMarketAccount => create_raw_account(
                &ctx.owner,
                &ctx.market,
                ctx.rent.market,
                LendingMarket::LEN,
                &program_id,
            ),
            Step::InitMarket => instruction::init_lending_market(
                program_id,
                ctx.owner,
                ctx.quote_currency,
                ctx.market,
                ctx.oracle_program_id,
            ),
            Step::CreateLiquiditySupply => {
                token_account(&self.reserve(action, ReserveRole::Primary)?.liquidity_supply)
            }
            Step::CreateFeeReceiver => token_account(&self.reserve(action, ReserveRole::Primary)?.fee_receiver),
            Step::CreateCollateralMint => create_raw_account(
                &ctx.owner,
                &self.reserve(action, ReserveRole::Primary)?.collateral_mint,
                ctx.rent.mint,
                Mint::LEN,
                &spl_token::id(),
            ),
            Step::CreateUserCollateral => {
                token_account(&self.reserve(action, ReserveRole::Primary)?.user_collateral)
            }
            Step::CreateCollateralSupply => {
                token_account(&self.reserve(action, ReserveRole::Primary)?.collateral_supply)
            }
            Step::CreateReserveAccount => create_raw_account(
                &ctx.owner,
                &self.reserve(action, ReserveRole::Primary)?.reserve,
                ctx.rent.reserve,
                Reserve::LEN,
                &program_id,
            ),
            Step::InitReserve => {
                let r = self.reserve(action, ReserveRole::Primary)?;
                instruction::init_reserve(
                    program_id,
                    amount,
                    ctx.reserve_config,
                    r.user_liquidity,
                    r.user_collateral,
                    r.reserve,
                    r.liquidity_mint,
                    r.liquidity_supply,
                    r.fee_receiver,
                    r.price_product,
                    r.price,
                    r.collateral_mint,
                    r.collateral_supply,
                    ctx.market,
                    ctx.authority.address,
                    ctx.owner,
                    ctx.owner,
                )
            }
            Step::CreateObligationAccount => create_raw_account(
                &ctx.owner,
                &ctx.obligation,
                ctx.rent.obligation,
                Obligation::LEN,
                &program_id,
            ),
            Step::InitObligation => instruction::init_obligation(program_id, ctx.obligation, ctx.market, ctx.owner),
            Step::RefreshReserve(role) => reserve_refresh(program_id, self.reserve(action, role)?),
            Step::RefreshObligation => {
                let snapshot = portfolio.ok_or(LendingClientError::MissingPortfolio { action: action.kind() })?;
                obligation_refresh(program_id, snapshot)
            }
            Step::DepositLiquidity => {
                let r = self.reserve(action, ReserveRole::Primary)?;
                instruction::deposit_reserve_liquidity(
                    program_id,
                    amount,
                    r.user_liquidity,
                    r.user_collateral,
                    r.reserve,
                    r.liquidity_supply,
                    r.collateral_mint,
                    ctx.market,
                    ctx.authority.address,
                    ctx.owner,
                )
            }
            Step::RedeemCollateral => {
                let r = self.reserve(action, ReserveRole::Primary)?;
                instruction::redeem_reserve_collateral(
                    program_id,
                    amount,
                    r.user_collateral,
                    r.user_liquidity,
                    r.reserve,
                    r.collateral_mint,
                    r.liquidity_supply,
                    ctx.market,
                    ctx.authority.address,
                    ctx.owner,
                )
            }
            Step::DepositObligationCollateral => {
                let r = self.reserve(action, ReserveRole::Collateral)?;
                instruction::deposit_obligation_collateral(
                    program_id,
                    amount,
                    r.user_collateral,
                    r.collateral_supply,
                    r.reserve,
                    ctx.obligation,
                    ctx.market,
                    ctx.owner,
                    ctx.owner,
                )
            }
            Step::WithdrawObligationCollateral => {
                let r = self.reserve(action, ReserveRole::Collateral)?;
                instruction::withdraw_obligation_collateral(
                    program_id,
                    amount,
                    r.collateral_supply,
                    r.user_collateral,
                    r.reserve,
                    ctx.obligation,
                    ctx.market,
                    ctx.authority.address,
                    ctx.owner,
                )
            }
            Step::BorrowObligationLiquidity => {
                let liquidity = self.reserve(action, ReserveRole::Liquidity)?;
                instruction::borrow_obligation_liquidity(
                    program_id,
                    amount,
                    liquidity.liquidity_supply,
                    liquidity.user_liquidity,
                    liquidity.reserve,
                    liquidity.fee_receiver,
                    ctx.obligation,
                    ctx.market,
                    ctx.authority.address,
                    ctx.owner,
                    Some(liquidity.host_fee_receiver),
                )
            }
            Step::RepayObligationLiquidity => {
                let liquidity = self.reserve(action, ReserveRole::Liquidity)?;
                instruction::repay_obligation_liquidity(
                    program_id,
                    amount,
                    liquidity.user_liquidity,
                    liquidity.liquidity_supply,
                    liquidity.reserve,
                    ctx.obligation,
                    ctx.market,
                    ctx.owner,
                )
            }
            Step::LiquidateObligation => {
                let liquidity = self.reserve(action, ReserveRole::Liquidity)?;
                let collateral = self.reserve(action, ReserveRole::Collateral)?;
                instruction::liquidate_obligation(
                    program_id,
                    amount,
                    liquidity.user_liquidity,
                    collateral.user_collateral,
                    liquidity.reserve,
                    liquidity.liquidity_supply,
                    collateral.reserve,
                    collateral.collateral_supply,
                    ctx.obligation,
                    ctx.market,
                    ctx.authority.address,
                    ctx.owner,
                )
            }
            Step::FlashLoan => {
                let r = self.reserve(action, ReserveRole::Primary)?;
                instruction::flash_loan(
                    program_id,
                    amount,
                    r.liquidity_supply,
                    r.user_liquidity,
                    r.reserve,
                    r.fee_receiver,
                    r.host_fee_receiver,
                    ctx.market,
                    ctx.authority.address,
                    ctx.flash_loan_receiver_program_id,
                    ctx.owner,
                    Vec::new(),
                )
            }
        };
        Ok(Some(ix))
    }
}
