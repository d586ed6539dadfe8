//! In-memory ledger for driving `LendingClient` without a cluster.
//!
//! Bundles are applied to a copy of the state and committed only if every
//! instruction succeeds. The lending program is emulated closely enough to
//! enforce what the client has to get right: reserves refreshed earlier in
//! the same bundle, obligation refreshes listing exactly the recorded reserves,
//! and signatures from every signer account.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_lending_sdk::{
    derive_market_authority,
    execution::{LedgerClient, SimulationOutcome},
    protocol::{
        Decimal, LastUpdate, LendingInstruction, LendingMarket, Obligation, ObligationCollateral,
        ObligationLiquidity, Reserve, ReserveCollateral, ReserveLiquidity, FLASH_LOAN_RECEIVER_PROGRAM_ID,
        LENDING_PROGRAM_ID, WAD,
    },
    ClientConfig, LedgerError, LendingClient,
};
use solana_program::{
    program_option::COption,
    program_pack::{IsInitialized, Pack},
};
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    system_program,
};
use spl_token::{
    instruction::TokenInstruction,
    state::{Account as TokenAccount, AccountState, Mint},
};
use std::collections::{HashMap, HashSet};

const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

/// Default price of every reserve, one quote unit per token
fn unit_price() -> Decimal {
    Decimal::from_integer(1)
}

type Outcome = std::result::Result<(), String>;

#[derive(Debug, Clone)]
struct AccountEntry {
    owner: Pubkey,
    lamports: u64,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, AccountEntry>,
    slot: u64,
}

/// Accounts refreshed so far in the bundle being applied
#[derive(Default)]
struct BundleScope {
    refreshed: HashSet<Pubkey>,
}

pub struct FakeLedger {
    state: Mutex<LedgerState>,
    history: Mutex<Vec<Vec<Instruction>>>,
    /// Oracle prices by reserve, read on RefreshReserve
    prices: Mutex<HashMap<Pubkey, Decimal>>,
    program_id: Pubkey,
    receiver_program_id: Pubkey,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            history: Mutex::new(Vec::new()),
            prices: Mutex::new(HashMap::new()),
            program_id: LENDING_PROGRAM_ID,
            receiver_program_id: FLASH_LOAN_RECEIVER_PROGRAM_ID,
        }
    }

    /// Committed bundles, oldest first
    pub fn history(&self) -> Vec<Vec<Instruction>> {
        self.history.lock().clone()
    }

    pub fn bundle_count(&self) -> usize {
        self.history.lock().len()
    }

    pub fn reserve(&self, address: &Pubkey) -> Reserve {
        let state = self.state.lock();
        Reserve::unpack(&state.accounts[address].data).unwrap()
    }

    pub fn obligation(&self, address: &Pubkey) -> Obligation {
        let state = self.state.lock();
        Obligation::unpack(&state.accounts[address].data).unwrap()
    }

    pub fn token_amount(&self, address: &Pubkey) -> u64 {
        let state = self.state.lock();
        TokenAccount::unpack(&state.accounts[address].data).unwrap().amount
    }

    /// Prices `reserve` at `price` from its next refresh on
    pub fn set_price(&self, reserve: &Pubkey, price: Decimal) {
        self.prices.lock().insert(*reserve, price);
    }

    /// Overwrites raw account data, for corrupting state in tests
    pub fn set_account_data(&self, address: &Pubkey, data: Vec<u8>) {
        let mut state = self.state.lock();
        if let Some(entry) = state.accounts.get_mut(address) {
            entry.data = data;
        }
    }

    fn check_signatures(instructions: &[Instruction], payer: &Pubkey, signers: &[&Keypair]) -> Outcome {
        let signed: HashSet<Pubkey> = signers.iter().map(|k| k.pubkey()).collect();
        if !signed.contains(payer) {
            return Err(format!("payer {} did not sign", payer));
        }
        for meta in instructions.iter().flat_map(|ix| ix.accounts.iter()) {
            if meta.is_signer && !signed.contains(&meta.pubkey) {
                return Err(format!("missing signature for {}", meta.pubkey));
            }
        }
        Ok(())
    }

    /// Applies the bundle to a copy of the state and returns it on success
    fn apply(&self, instructions: &[Instruction]) -> std::result::Result<LedgerState, String> {
        let mut state = self.state.lock().clone();
        state.slot += 1;

        let mut runtime = Runtime {
            state,
            scope: BundleScope::default(),
            prices: self.prices.lock().clone(),
            program_id: self.program_id,
            receiver_program_id: self.receiver_program_id,
        };
        for (index, ix) in instructions.iter().enumerate() {
            runtime
                .process(ix)
                .map_err(|e| format!("instruction {} failed: {}", index, e))?;
        }
        Ok(runtime.state)
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn send_bundle(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<Signature, LedgerError> {
        Self::check_signatures(instructions, payer, signers).map_err(LedgerError::Rejected)?;
        let next = self.apply(instructions).map_err(LedgerError::Rejected)?;

        *self.state.lock() = next;
        self.history.lock().push(instructions.to_vec());
        Ok(Signature::new_unique())
    }

    async fn simulate_bundle(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> Result<SimulationOutcome, LedgerError> {
        let logs = instructions
            .iter()
            .map(|ix| format!("Program {} invoke [1]", ix.program_id))
            .collect();
        let err = Self::check_signatures(instructions, payer, signers)
            .and_then(|_| self.apply(instructions).map(|_| ()))
            .err();
        Ok(SimulationOutcome {
            err,
            logs,
            units_consumed: Some(instructions.len() as u64 * 5_000),
        })
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError> {
        self.state
            .lock()
            .accounts
            .get(address)
            .map(|entry| entry.data.clone())
            .ok_or(LedgerError::AccountNotFound(*address))
    }

    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64, LedgerError> {
        let data = self.account_data(token_account).await?;
        TokenAccount::unpack(&data)
            .map(|account| account.amount)
            .map_err(|_| LedgerError::InvalidTokenAccount(*token_account))
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError> {
        Ok((data_len as u64 + ACCOUNT_STORAGE_OVERHEAD) * LAMPORTS_PER_BYTE_YEAR * 2)
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        Ok(self
            .state
            .lock()
            .accounts
            .get(address)
            .map(|entry| entry.lamports)
            .unwrap_or(0))
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature, LedgerError> {
        let mut state = self.state.lock();
        let entry = state.accounts.entry(*address).or_insert_with(|| AccountEntry {
            owner: system_program::id(),
            lamports: 0,
            data: Vec::new(),
        });
        entry.lamports += lamports;
        Ok(Signature::new_unique())
    }
}

struct Runtime {
    state: LedgerState,
    scope: BundleScope,
    prices: HashMap<Pubkey, Decimal>,
    program_id: Pubkey,
    receiver_program_id: Pubkey,
}

impl Runtime {
    fn process(&mut self, ix: &Instruction) -> Outcome {
        if ix.program_id == system_program::id() {
            self.process_system(ix)
        } else if ix.program_id == spl_token::id() {
            self.process_token(ix)
        } else if ix.program_id == self.program_id {
            self.process_lending(ix)
        } else {
            Err(format!("unknown program {}", ix.program_id))
        }
    }

    fn key(ix: &Instruction, index: usize) -> std::result::Result<Pubkey, String> {
        ix.accounts
            .get(index)
            .map(|meta| meta.pubkey)
            .ok_or_else(|| format!("missing account #{}", index))
    }

    // ---------------------------------------------------------------- system

    fn process_system(&mut self, ix: &Instruction) -> Outcome {
        let data = &ix.data;
        if data.len() < 52 || data[0..4] != [0, 0, 0, 0] {
            return Err("only CreateAccount is supported".to_string());
        }
        let lamports = u64::from_le_bytes(data[4..12].try_into().unwrap());
        let space = u64::from_le_bytes(data[12..20].try_into().unwrap()) as usize;
        let owner = Pubkey::new_from_array(data[20..52].try_into().unwrap());
        let new_account = Self::key(ix, 1)?;

        if self.state.accounts.contains_key(&new_account) {
            return Err(format!("account {} already in use", new_account));
        }
        self.state.accounts.insert(
            new_account,
            AccountEntry {
                owner,
                lamports,
                data: vec![0; space],
            },
        );
        Ok(())
    }

    // ----------------------------------------------------------------- token

    fn raw(&self, key: &Pubkey, owner: &Pubkey) -> std::result::Result<&AccountEntry, String> {
        let entry = self
            .state
            .accounts
            .get(key)
            .ok_or_else(|| format!("account {} not found", key))?;
        if entry.owner != *owner {
            return Err(format!("account {} has wrong owner", key));
        }
        Ok(entry)
    }

    fn token_account(&self, key: &Pubkey) -> std::result::Result<TokenAccount, String> {
        let entry = self.raw(key, &spl_token::id())?;
        TokenAccount::unpack(&entry.data).map_err(|e| format!("token account {}: {}", key, e))
    }

    fn mint(&self, key: &Pubkey) -> std::result::Result<Mint, String> {
        let entry = self.raw(key, &spl_token::id())?;
        Mint::unpack(&entry.data).map_err(|e| format!("mint {}: {}", key, e))
    }

    fn write<T: Pack>(&mut self, key: &Pubkey, value: T) -> Outcome {
        let entry = self
            .state
            .accounts
            .get_mut(key)
            .ok_or_else(|| format!("account {} not found", key))?;
        T::pack(value, &mut entry.data).map_err(|e| format!("pack {}: {}", key, e))
    }

    fn init_mint(&mut self, key: &Pubkey, authority: Pubkey, decimals: u8) -> Outcome {
        let entry = self.raw(key, &spl_token::id())?;
        if entry.data.len() != Mint::LEN || Mint::unpack_unchecked(&entry.data).map(|m| m.is_initialized()).unwrap_or(true) {
            return Err(format!("mint {} not allocatable", key));
        }
        self.write(
            key,
            Mint {
                mint_authority: COption::Some(authority),
                supply: 0,
                decimals,
                is_initialized: true,
                freeze_authority: COption::None,
            },
        )
    }

    fn init_token_account(&mut self, key: &Pubkey, mint: Pubkey, owner: Pubkey) -> Outcome {
        self.mint(&mint)?;
        let entry = self.raw(key, &spl_token::id())?;
        if entry.data.len() != TokenAccount::LEN
            || TokenAccount::unpack_unchecked(&entry.data)
                .map(|a| a.is_initialized())
                .unwrap_or(true)
        {
            return Err(format!("token account {} not allocatable", key));
        }
        self.write(
            key,
            TokenAccount {
                mint,
                owner,
                amount: 0,
                state: AccountState::Initialized,
                ..TokenAccount::default()
            },
        )
    }

    fn mint_tokens(&mut self, mint_key: &Pubkey, destination: &Pubkey, amount: u64) -> Outcome {
        let mut mint = self.mint(mint_key)?;
        let mut account = self.token_account(destination)?;
        if account.mint != *mint_key {
            return Err(format!("{} does not hold mint {}", destination, mint_key));
        }
        mint.supply += amount;
        account.amount += amount;
        self.write(mint_key, mint)?;
        self.write(destination, account)
    }

    fn burn_tokens(&mut self, mint_key: &Pubkey, source: &Pubkey, amount: u64, authority: &Pubkey) -> Outcome {
        let mut mint = self.mint(mint_key)?;
        let mut account = self.token_account(source)?;
        if account.owner != *authority {
            return Err(format!("{} is not the owner of {}", authority, source));
        }
        if account.amount < amount {
            return Err(format!("insufficient funds in {}", source));
        }
        mint.supply -= amount;
        account.amount -= amount;
        self.write(mint_key, mint)?;
        self.write(source, account)
    }

    /// Moves tokens; `authority` is checked against the source owner when given
    fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64, authority: Option<&Pubkey>) -> Outcome {
        let mut source = self.token_account(from)?;
        let mut destination = self.token_account(to)?;
        if let Some(authority) = authority {
            if source.owner != *authority {
                return Err(format!("{} is not the owner of {}", authority, from));
            }
        }
        if source.mint != destination.mint {
            return Err(format!("mint mismatch between {} and {}", from, to));
        }
        if source.amount < amount {
            return Err(format!("insufficient funds in {}", from));
        }
        if from == to {
            return Ok(());
        }
        source.amount -= amount;
        destination.amount += amount;
        self.write(from, source)?;
        self.write(to, destination)
    }

    fn process_token(&mut self, ix: &Instruction) -> Outcome {
        match TokenInstruction::unpack(&ix.data).map_err(|e| e.to_string())? {
            TokenInstruction::InitializeMint {
                decimals,
                mint_authority,
                ..
            } => self.init_mint(&Self::key(ix, 0)?, mint_authority, decimals),
            TokenInstruction::InitializeAccount => {
                self.init_token_account(&Self::key(ix, 0)?, Self::key(ix, 1)?, Self::key(ix, 2)?)
            }
            TokenInstruction::MintTo { amount } => {
                let mint_key = Self::key(ix, 0)?;
                let authority = Self::key(ix, 2)?;
                if self.mint(&mint_key)?.mint_authority != COption::Some(authority) {
                    return Err("wrong mint authority".to_string());
                }
                self.mint_tokens(&mint_key, &Self::key(ix, 1)?, amount)
            }
            other => Err(format!("unsupported token instruction {:?}", other)),
        }
    }

    // --------------------------------------------------------------- lending

    fn load<T: Pack + IsInitialized>(&self, key: &Pubkey, kind: &str) -> std::result::Result<T, String> {
        let entry = self.raw(key, &self.program_id)?;
        T::unpack(&entry.data).map_err(|e| format!("{} {}: {}", kind, key, e))
    }

    fn allocate<T: Pack + IsInitialized>(&self, key: &Pubkey, kind: &str) -> Outcome {
        let entry = self.raw(key, &self.program_id)?;
        if entry.data.len() != T::LEN {
            return Err(format!("{} {} has wrong size", kind, key));
        }
        match T::unpack_unchecked(&entry.data) {
            Ok(existing) if !existing.is_initialized() => Ok(()),
            _ => Err(format!("{} {} already initialized", kind, key)),
        }
    }

    fn require_refreshed(&self, key: &Pubkey, kind: &str) -> Outcome {
        if self.scope.refreshed.contains(key) {
            Ok(())
        } else {
            Err(format!("{} {} is stale", kind, key))
        }
    }

    fn market(&self, key: &Pubkey) -> std::result::Result<LendingMarket, String> {
        self.load(key, "lending market")
    }

    fn check_authority(&self, market: &Pubkey, authority: &Pubkey) -> Outcome {
        let derived = derive_market_authority(market, &self.program_id).map_err(|e| e.to_string())?;
        if derived.address != *authority {
            return Err("invalid market authority".to_string());
        }
        Ok(())
    }

    /// Fee and host share for `amount` at `fee_wad`, rounded like the program does
    fn fees(amount: u64, fee_wad: u64, host_fee_percentage: u8) -> (u64, u64) {
        if fee_wad == 0 || amount == 0 {
            return (0, 0);
        }
        let minimum_fee = if host_fee_percentage > 0 { 2 } else { 1 };
        let scaled = amount as u128 * fee_wad as u128;
        let fee = ((scaled + WAD as u128 / 2) / WAD as u128) as u64;
        let fee = fee.max(minimum_fee);
        let host_fee = if host_fee_percentage > 0 {
            ((fee as u128 * host_fee_percentage as u128 + 50) / 100).max(1) as u64
        } else {
            0
        };
        (fee, host_fee)
    }

    fn process_lending(&mut self, ix: &Instruction) -> Outcome {
        let instruction = LendingInstruction::unpack(&ix.data).map_err(|e| e.to_string())?;
        match instruction {
            LendingInstruction::InitLendingMarket { owner, quote_currency } => {
                let market = Self::key(ix, 0)?;
                self.allocate::<LendingMarket>(&market, "lending market")?;
                let authority = derive_market_authority(&market, &self.program_id).map_err(|e| e.to_string())?;
                self.write(
                    &market,
                    LendingMarket {
                        version: 1,
                        bump_seed: authority.bump_seed,
                        owner,
                        quote_currency,
                        token_program_id: spl_token::id(),
                        oracle_program_id: Self::key(ix, 3)?,
                    },
                )
            }
            LendingInstruction::InitReserve {
                liquidity_amount,
                config,
            } => self.init_reserve(ix, liquidity_amount, config),
            LendingInstruction::RefreshReserve => {
                let key = Self::key(ix, 0)?;
                let mut reserve: Reserve = self.load(&key, "reserve")?;
                if reserve.liquidity.oracle_pubkey != Self::key(ix, 1)? {
                    return Err("invalid price account".to_string());
                }
                reserve.last_update = LastUpdate {
                    slot: self.state.slot,
                    stale: false,
                };
                reserve.liquidity.market_price = self.prices.get(&key).copied().unwrap_or_else(unit_price);
                self.write(&key, reserve)?;
                self.scope.refreshed.insert(key);
                Ok(())
            }
            LendingInstruction::DepositReserveLiquidity { liquidity_amount } => {
                let (source, destination, key) = (Self::key(ix, 0)?, Self::key(ix, 1)?, Self::key(ix, 2)?);
                self.require_refreshed(&key, "reserve")?;
                self.check_authority(&Self::key(ix, 5)?, &Self::key(ix, 6)?)?;
                let mut reserve: Reserve = self.load(&key, "reserve")?;
                if reserve.liquidity.supply_pubkey != Self::key(ix, 3)?
                    || reserve.collateral.mint_pubkey != Self::key(ix, 4)?
                {
                    return Err("reserve accounts mismatch".to_string());
                }
                self.transfer(&source, &reserve.liquidity.supply_pubkey, liquidity_amount, Some(&Self::key(ix, 7)?))?;
                self.mint_tokens(&reserve.collateral.mint_pubkey, &destination, liquidity_amount)?;
                reserve.liquidity.available_amount += liquidity_amount;
                reserve.collateral.mint_total_supply += liquidity_amount;
                reserve.last_update.stale = true;
                self.write(&key, reserve)
            }
            LendingInstruction::RedeemReserveCollateral { collateral_amount } => {
                let (source, destination, key) = (Self::key(ix, 0)?, Self::key(ix, 1)?, Self::key(ix, 2)?);
                self.require_refreshed(&key, "reserve")?;
                self.check_authority(&Self::key(ix, 5)?, &Self::key(ix, 6)?)?;
                let mut reserve: Reserve = self.load(&key, "reserve")?;
                if reserve.liquidity.available_amount < collateral_amount {
                    return Err("insufficient liquidity".to_string());
                }
                self.burn_tokens(
                    &reserve.collateral.mint_pubkey,
                    &source,
                    collateral_amount,
                    &Self::key(ix, 7)?,
                )?;
                self.transfer(&reserve.liquidity.supply_pubkey, &destination, collateral_amount, None)?;
                reserve.liquidity.available_amount -= collateral_amount;
                reserve.collateral.mint_total_supply -= collateral_amount;
                reserve.last_update.stale = true;
                self.write(&key, reserve)
            }
            LendingInstruction::InitObligation => {
                let key = Self::key(ix, 0)?;
                let market = Self::key(ix, 1)?;
                self.market(&market)?;
                self.allocate::<Obligation>(&key, "obligation")?;
                self.write(
                    &key,
                    Obligation {
                        version: 1,
                        last_update: LastUpdate {
                            slot: self.state.slot,
                            stale: true,
                        },
                        lending_market: market,
                        owner: Self::key(ix, 2)?,
                        ..Obligation::default()
                    },
                )
            }
            LendingInstruction::RefreshObligation => self.refresh_obligation(ix),
            LendingInstruction::DepositObligationCollateral { collateral_amount } => {
                let (source, destination, key, obligation_key) =
                    (Self::key(ix, 0)?, Self::key(ix, 1)?, Self::key(ix, 2)?, Self::key(ix, 3)?);
                self.require_refreshed(&key, "reserve")?;
                self.require_refreshed(&obligation_key, "obligation")?;
                let reserve: Reserve = self.load(&key, "reserve")?;
                if reserve.collateral.supply_pubkey != destination {
                    return Err("collateral supply mismatch".to_string());
                }
                let mut obligation: Obligation = self.load(&obligation_key, "obligation")?;
                self.transfer(&source, &destination, collateral_amount, Some(&Self::key(ix, 6)?))?;

                match obligation.deposits.iter_mut().find(|d| d.deposit_reserve == key) {
                    Some(deposit) => deposit.deposited_amount += collateral_amount,
                    None => {
                        if obligation.deposits.len() + obligation.borrows.len() >= 10 {
                            return Err("obligation reserve limit".to_string());
                        }
                        obligation.deposits.push(ObligationCollateral {
                            deposit_reserve: key,
                            deposited_amount: collateral_amount,
                            market_value: Decimal::zero(),
                        });
                    }
                }
                obligation.last_update.stale = true;
                self.write(&obligation_key, obligation)
            }
            LendingInstruction::WithdrawObligationCollateral { collateral_amount } => {
                let (source, destination, key, obligation_key) =
                    (Self::key(ix, 0)?, Self::key(ix, 1)?, Self::key(ix, 2)?, Self::key(ix, 3)?);
                self.require_refreshed(&key, "reserve")?;
                self.require_refreshed(&obligation_key, "obligation")?;
                self.check_authority(&Self::key(ix, 4)?, &Self::key(ix, 5)?)?;
                let mut obligation: Obligation = self.load(&obligation_key, "obligation")?;

                let index = obligation
                    .deposits
                    .iter()
                    .position(|d| d.deposit_reserve == key)
                    .ok_or("no deposit in this reserve")?;
                if obligation.deposits[index].deposited_amount < collateral_amount {
                    return Err("withdraw exceeds deposit".to_string());
                }
                let remaining_value = obligation
                    .deposited_value
                    .0
                    .saturating_sub(Decimal::from_integer(collateral_amount).0);
                let reserve: Reserve = self.load(&key, "reserve")?;
                let allowed = remaining_value * reserve.config.loan_to_value_ratio as u128 / 100;
                if obligation.borrowed_value.0 > allowed {
                    return Err("withdraw too large".to_string());
                }

                self.transfer(&source, &destination, collateral_amount, None)?;
                obligation.deposits[index].deposited_amount -= collateral_amount;
                if obligation.deposits[index].deposited_amount == 0 {
                    obligation.deposits.remove(index);
                }
                obligation.last_update.stale = true;
                self.write(&obligation_key, obligation)
            }
            LendingInstruction::BorrowObligationLiquidity { liquidity_amount } => self.borrow(ix, liquidity_amount),
            LendingInstruction::RepayObligationLiquidity { liquidity_amount } => self.repay(ix, liquidity_amount),
            LendingInstruction::LiquidateObligation { liquidity_amount } => self.liquidate(ix, liquidity_amount),
            LendingInstruction::FlashLoan { amount } => self.flash_loan(ix, amount),
        }
    }

    fn init_reserve(
        &mut self,
        ix: &Instruction,
        liquidity_amount: u64,
        config: solana_lending_sdk::protocol::ReserveConfig,
    ) -> Outcome {
        if liquidity_amount == 0 {
            return Err("initial liquidity must be positive".to_string());
        }
        let keys: Vec<Pubkey> = (0..14).map(|i| Self::key(ix, i)).collect::<std::result::Result<_, _>>()?;
        let [source, user_collateral, key, liquidity_mint, supply, fee_receiver, _product, price, collateral_mint, collateral_supply, market_key, authority, market_owner, transfer_authority] =
            <[Pubkey; 14]>::try_from(keys).map_err(|_| "account list".to_string())?;

        let market = self.market(&market_key)?;
        if market.owner != market_owner {
            return Err("market owner mismatch".to_string());
        }
        self.check_authority(&market_key, &authority)?;
        self.allocate::<Reserve>(&key, "reserve")?;
        let decimals = self.mint(&liquidity_mint)?.decimals;

        self.init_token_account(&supply, liquidity_mint, authority)?;
        self.init_token_account(&fee_receiver, liquidity_mint, authority)?;
        self.init_mint(&collateral_mint, authority, decimals)?;
        self.init_token_account(&collateral_supply, collateral_mint, authority)?;
        self.init_token_account(&user_collateral, collateral_mint, market_owner)?;

        self.transfer(&source, &supply, liquidity_amount, Some(&transfer_authority))?;
        self.mint_tokens(&collateral_mint, &user_collateral, liquidity_amount)?;

        self.write(
            &key,
            Reserve {
                version: 1,
                last_update: LastUpdate {
                    slot: self.state.slot,
                    stale: true,
                },
                lending_market: market_key,
                liquidity: ReserveLiquidity {
                    mint_pubkey: liquidity_mint,
                    mint_decimals: decimals,
                    supply_pubkey: supply,
                    oracle_pubkey: price,
                    fee_receiver,
                    available_amount: liquidity_amount,
                    borrowed_amount_wads: Decimal::zero(),
                    cumulative_borrow_rate_wads: Decimal::from_integer(1),
                    market_price: unit_price(),
                },
                collateral: ReserveCollateral {
                    mint_pubkey: collateral_mint,
                    mint_total_supply: liquidity_amount,
                    supply_pubkey: collateral_supply,
                },
                config,
            },
        )
    }

    fn refresh_obligation(&mut self, ix: &Instruction) -> Outcome {
        let key = Self::key(ix, 0)?;
        let mut obligation: Obligation = self.load(&key, "obligation")?;
        let listed: Vec<Pubkey> = ix.accounts.iter().skip(2).map(|m| m.pubkey).collect();
        let expected: Vec<Pubkey> = obligation.deposit_reserves().chain(obligation.borrow_reserves()).collect();
        if listed != expected {
            return Err(format!(
                "obligation reserve list mismatch: expected {:?}, got {:?}",
                expected, listed
            ));
        }

        let mut deposited_value = 0u128;
        let mut allowed_borrow_value = 0u128;
        let mut unhealthy_borrow_value = 0u128;
        for deposit in obligation.deposits.iter_mut() {
            self.require_refreshed(&deposit.deposit_reserve, "reserve")?;
            let reserve: Reserve = self.load(&deposit.deposit_reserve, "reserve")?;
            let value = Decimal::from_integer(deposit.deposited_amount).0 * reserve.liquidity.market_price.0 / WAD as u128;
            deposit.market_value = Decimal(value);
            deposited_value += value;
            allowed_borrow_value += value * reserve.config.loan_to_value_ratio as u128 / 100;
            unhealthy_borrow_value += value * reserve.config.liquidation_threshold as u128 / 100;
        }
        let mut borrowed_value = 0u128;
        for borrow in obligation.borrows.iter_mut() {
            self.require_refreshed(&borrow.borrow_reserve, "reserve")?;
            let reserve: Reserve = self.load(&borrow.borrow_reserve, "reserve")?;
            let value = borrow.borrowed_amount_wads.0 * reserve.liquidity.market_price.0 / WAD as u128;
            borrow.market_value = Decimal(value);
            borrowed_value += value;
        }

        obligation.deposited_value = Decimal(deposited_value);
        obligation.borrowed_value = Decimal(borrowed_value);
        obligation.allowed_borrow_value = Decimal(allowed_borrow_value);
        obligation.unhealthy_borrow_value = Decimal(unhealthy_borrow_value);
        obligation.last_update = LastUpdate {
            slot: self.state.slot,
            stale: false,
        };
        self.write(&key, obligation)?;
        self.scope.refreshed.insert(key);
        Ok(())
    }

    fn borrow(&mut self, ix: &Instruction, amount: u64) -> Outcome {
        let (source, destination, key, fee_receiver, obligation_key) =
            (Self::key(ix, 0)?, Self::key(ix, 1)?, Self::key(ix, 2)?, Self::key(ix, 3)?, Self::key(ix, 4)?);
        self.require_refreshed(&key, "reserve")?;
        self.require_refreshed(&obligation_key, "obligation")?;
        self.check_authority(&Self::key(ix, 5)?, &Self::key(ix, 6)?)?;

        let mut reserve: Reserve = self.load(&key, "reserve")?;
        let mut obligation: Obligation = self.load(&obligation_key, "obligation")?;
        if obligation.deposits.is_empty() {
            return Err("obligation has no deposits".to_string());
        }
        if source != reserve.liquidity.supply_pubkey || fee_receiver != reserve.liquidity.fee_receiver {
            return Err("reserve accounts mismatch".to_string());
        }

        let (fee, host_fee) = Self::fees(
            amount,
            reserve.config.fees.borrow_fee_wad,
            reserve.config.fees.host_fee_percentage,
        );
        let debt = amount + fee;
        let debt_wads = Decimal::from_integer(debt).0;
        if obligation.borrowed_value.0 + debt_wads > obligation.allowed_borrow_value.0 {
            return Err("borrow exceeds allowed value".to_string());
        }
        if reserve.liquidity.available_amount < debt {
            return Err("insufficient liquidity".to_string());
        }

        self.transfer(&source, &destination, amount, None)?;
        match ix.accounts.get(10).map(|m| m.pubkey) {
            Some(host) => {
                self.transfer(&source, &fee_receiver, fee - host_fee, None)?;
                self.transfer(&source, &host, host_fee, None)?;
            }
            None => self.transfer(&source, &fee_receiver, fee, None)?,
        }

        reserve.liquidity.available_amount -= debt;
        reserve.liquidity.borrowed_amount_wads = Decimal(reserve.liquidity.borrowed_amount_wads.0 + debt_wads);
        match obligation.borrows.iter_mut().find(|b| b.borrow_reserve == key) {
            Some(borrow) => borrow.borrowed_amount_wads = Decimal(borrow.borrowed_amount_wads.0 + debt_wads),
            None => {
                if obligation.deposits.len() + obligation.borrows.len() >= 10 {
                    return Err("obligation reserve limit".to_string());
                }
                obligation.borrows.push(ObligationLiquidity {
                    borrow_reserve: key,
                    cumulative_borrow_rate_wads: Decimal::from_integer(1),
                    borrowed_amount_wads: Decimal(debt_wads),
                    market_value: Decimal::zero(),
                });
            }
        }
        obligation.borrowed_value = Decimal(obligation.borrowed_value.0 + debt_wads);
        obligation.last_update.stale = true;
        self.write(&key, reserve)?;
        self.write(&obligation_key, obligation)
    }

    /// Pays down up to `amount` of the obligation's debt in `key`, returning what was repaid
    fn pay_down(
        &mut self,
        key: &Pubkey,
        obligation: &mut Obligation,
        source: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> std::result::Result<u64, String> {
        let mut reserve: Reserve = self.load(key, "reserve")?;
        let index = obligation
            .borrows
            .iter()
            .position(|b| b.borrow_reserve == *key)
            .ok_or("no borrow in this reserve")?;
        let owed_wads = obligation.borrows[index].borrowed_amount_wads.0;
        let owed = ((owed_wads + WAD as u128 - 1) / WAD as u128) as u64;
        let repaid = amount.min(owed);
        let repaid_wads = Decimal::from_integer(repaid).0.min(owed_wads);

        self.transfer(source, &reserve.liquidity.supply_pubkey, repaid, Some(authority))?;

        reserve.liquidity.available_amount += repaid;
        reserve.liquidity.borrowed_amount_wads =
            Decimal(reserve.liquidity.borrowed_amount_wads.0.saturating_sub(repaid_wads));
        obligation.borrows[index].borrowed_amount_wads = Decimal(owed_wads - repaid_wads);
        if obligation.borrows[index].borrowed_amount_wads.is_zero() {
            obligation.borrows.remove(index);
        }
        obligation.borrowed_value = Decimal(obligation.borrowed_value.0.saturating_sub(repaid_wads));
        obligation.last_update.stale = true;
        self.write(key, reserve)?;
        Ok(repaid)
    }

    fn repay(&mut self, ix: &Instruction, amount: u64) -> Outcome {
        let (source, destination, key, obligation_key) =
            (Self::key(ix, 0)?, Self::key(ix, 1)?, Self::key(ix, 2)?, Self::key(ix, 3)?);
        self.require_refreshed(&key, "reserve")?;
        self.require_refreshed(&obligation_key, "obligation")?;

        let reserve: Reserve = self.load(&key, "reserve")?;
        if destination != reserve.liquidity.supply_pubkey {
            return Err("reserve accounts mismatch".to_string());
        }
        let mut obligation: Obligation = self.load(&obligation_key, "obligation")?;
        self.pay_down(&key, &mut obligation, &source, &Self::key(ix, 5)?, amount)?;
        self.write(&obligation_key, obligation)
    }

    fn liquidate(&mut self, ix: &Instruction, amount: u64) -> Outcome {
        let keys: Vec<Pubkey> = (0..10).map(|i| Self::key(ix, i)).collect::<std::result::Result<_, _>>()?;
        let [source, destination, repay_key, _repay_supply, withdraw_key, withdraw_supply, obligation_key, market, authority, transfer_authority] =
            <[Pubkey; 10]>::try_from(keys).map_err(|_| "account list".to_string())?;
        self.require_refreshed(&repay_key, "reserve")?;
        self.require_refreshed(&withdraw_key, "reserve")?;
        self.require_refreshed(&obligation_key, "obligation")?;
        self.check_authority(&market, &authority)?;

        let mut obligation: Obligation = self.load(&obligation_key, "obligation")?;
        if obligation.borrowed_value.0 <= obligation.unhealthy_borrow_value.0 {
            return Err("obligation is healthy".to_string());
        }
        let withdraw_reserve: Reserve = self.load(&withdraw_key, "reserve")?;
        let repaid = self.pay_down(&repay_key, &mut obligation, &source, &transfer_authority, amount)?;

        let index = obligation
            .deposits
            .iter()
            .position(|d| d.deposit_reserve == withdraw_key)
            .ok_or("no collateral in withdraw reserve")?;
        let bonus = withdraw_reserve.config.liquidation_bonus as u64;
        let seized = (repaid * (100 + bonus) / 100).min(obligation.deposits[index].deposited_amount);
        self.transfer(&withdraw_supply, &destination, seized, None)?;
        obligation.deposits[index].deposited_amount -= seized;
        if obligation.deposits[index].deposited_amount == 0 {
            obligation.deposits.remove(index);
        }
        self.write(&obligation_key, obligation)
    }

    fn flash_loan(&mut self, ix: &Instruction, amount: u64) -> Outcome {
        let keys: Vec<Pubkey> = (0..10).map(|i| Self::key(ix, i)).collect::<std::result::Result<_, _>>()?;
        let [source, destination, key, fee_receiver, host, market, authority, _token_program, receiver, transfer_authority] =
            <[Pubkey; 10]>::try_from(keys).map_err(|_| "account list".to_string())?;
        self.require_refreshed(&key, "reserve")?;
        self.check_authority(&market, &authority)?;

        let reserve: Reserve = self.load(&key, "reserve")?;
        if source != reserve.liquidity.supply_pubkey || fee_receiver != reserve.liquidity.fee_receiver {
            return Err("reserve accounts mismatch".to_string());
        }
        if receiver != self.receiver_program_id {
            return Err(format!("flash loan receiver {} is not executable", receiver));
        }
        if amount > reserve.liquidity.available_amount {
            return Err("insufficient liquidity".to_string());
        }
        let (fee, host_fee) = Self::fees(
            amount,
            reserve.config.fees.flash_loan_fee_wad,
            reserve.config.fees.host_fee_percentage,
        );

        let supply_before = self.token_account(&source)?.amount;
        self.transfer(&source, &destination, amount, None)?;
        // receiver program: hand back principal plus fee
        self.transfer(&destination, &source, amount + fee, Some(&transfer_authority))?;
        if self.token_account(&source)?.amount < supply_before + fee {
            return Err("flash loan not repaid".to_string());
        }

        self.transfer(&source, &fee_receiver, fee - host_fee, None)?;
        self.transfer(&source, &host, host_fee, None)
    }
}

/// Client over a fresh fake ledger with the owner already funded
pub async fn funded_client() -> LendingClient<FakeLedger> {
    let client = LendingClient::new(FakeLedger::new(), ClientConfig::default(), Keypair::new()).unwrap();
    client.fund_owner().await.unwrap();
    client
}

/// Market plus an ETH reserve seeded the way the reference scenario does it
pub async fn eth_market(mint_amount: u64, initial_deposit: u64) -> LendingClient<FakeLedger> {
    let mut client = funded_client().await;
    client.init_market().await.unwrap();
    client.init_reserve("ETH", mint_amount, initial_deposit).await.unwrap();
    client.init_obligation().await.unwrap();
    client
}
