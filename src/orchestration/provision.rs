//! Funding and token-account setup for a fresh asset.
//!
//! None of this is part of an action bundle: it only produces the accounts
//! the reserve setup expects to already exist.

use solana_program::program_pack::Pack;
use solana_sdk::{
    instruction::Instruction, native_token::LAMPORTS_PER_SOL, pubkey::Pubkey, system_instruction,
};
use spl_token::state::{Account as TokenAccount, Mint};
use std::time::Duration;

use crate::error::{LendingClientError, Result};
use crate::execution::LedgerClient;
use crate::protocol::{LendingMarket, Obligation, Reserve};

/// Largest airdrop a devnet faucet hands out in one request
pub const MAX_AIRDROP_LAMPORTS: u64 = 5 * LAMPORTS_PER_SOL;

const AIRDROP_POLL_INTERVAL: Duration = Duration::from_millis(500);
const AIRDROP_POLL_ATTEMPTS: u32 = 30;

/// Rent-exempt minimums for every account kind the client creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentSchedule {
    pub token_account: u64,
    pub mint: u64,
    pub market: u64,
    pub reserve: u64,
    pub obligation: u64,
}

impl RentSchedule {
    pub async fn fetch<L: LedgerClient + ?Sized>(ledger: &L) -> Result<Self> {
        Ok(Self {
            token_account: ledger.minimum_balance_for_rent_exemption(TokenAccount::LEN).await?,
            mint: ledger.minimum_balance_for_rent_exemption(Mint::LEN).await?,
            market: ledger.minimum_balance_for_rent_exemption(LendingMarket::LEN).await?,
            reserve: ledger.minimum_balance_for_rent_exemption(Reserve::LEN).await?,
            obligation: ledger.minimum_balance_for_rent_exemption(Obligation::LEN).await?,
        })
    }
}

/// Airdrops `lamports` to `recipient` and waits until the balance reflects it.
///
/// Requests are split into chunks of at most [`MAX_AIRDROP_LAMPORTS`].
/// Returns the final balance.
pub async fn fund_payer<L: LedgerClient + ?Sized>(
    ledger: &L,
    recipient: &Pubkey,
    lamports: u64,
) -> Result<u64> {
    let starting = ledger.balance(recipient).await?;
    let target = starting.saturating_add(lamports);

    let mut remaining = lamports;
    while remaining > 0 {
        let chunk = remaining.min(MAX_AIRDROP_LAMPORTS);
        let signature = ledger.request_airdrop(recipient, chunk).await?;
        log::debug!("Requested airdrop of {} lamports to {} ({})", chunk, recipient, signature);
        remaining -= chunk;
    }

    for attempt in 1..=AIRDROP_POLL_ATTEMPTS {
        let balance = ledger.balance(recipient).await?;
        if balance >= target {
            log::info!("💰 Funded {} with {} SOL", recipient, lamports as f64 / LAMPORTS_PER_SOL as f64);
            return Ok(balance);
        }
        log::warn!(
            "Airdrop to {} not visible yet (attempt {}/{}, balance {})",
            recipient,
            attempt,
            AIRDROP_POLL_ATTEMPTS,
            balance
        );
        tokio::time::sleep(AIRDROP_POLL_INTERVAL).await;
    }

    Err(LendingClientError::AirdropFailed {
        recipient: *recipient,
        lamports,
    })
}

/// Creates and initializes a mint whose authority is `authority`
pub fn create_mint_instructions(
    payer: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
    decimals: u8,
    rent_lamports: u64,
) -> Result<Vec<Instruction>> {
    Ok(vec![
        system_instruction::create_account(payer, mint, rent_lamports, Mint::LEN as u64, &spl_token::id()),
        spl_token::instruction::initialize_mint(&spl_token::id(), mint, authority, None, decimals)?,
    ])
}

/// Creates and initializes a token account for `mint` owned by `owner`
pub fn create_token_account_instructions(
    payer: &Pubkey,
    account: &Pubkey,
    mint: &Pubkey,
    owner: &Pubkey,
    rent_lamports: u64,
) -> Result<Vec<Instruction>> {
    Ok(vec![
        system_instruction::create_account(
            payer,
            account,
            rent_lamports,
            TokenAccount::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_account(&spl_token::id(), account, mint, owner)?,
    ])
}

pub fn mint_to_instruction(
    mint: &Pubkey,
    account: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<Instruction> {
    Ok(spl_token::instruction::mint_to(
        &spl_token::id(),
        mint,
        account,
        authority,
        &[],
        amount,
    )?)
}

/// Allocates an uninitialized account owned by `program_id`; the program fills it in
pub fn create_raw_account(
    payer: &Pubkey,
    account: &Pubkey,
    rent_lamports: u64,
    space: usize,
    program_id: &Pubkey,
) -> Instruction {
    system_instruction::create_account(payer, account, rent_lamports, space as u64, program_id)
}
