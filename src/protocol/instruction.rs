use serde::{Deserialize, Serialize};
use solana_program::program_error::ProgramError;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::{Pubkey, PUBKEY_BYTES},
    sysvar,
};
use std::convert::TryInto;
use std::mem::size_of;

use super::WAD;

/// Fees charged by a reserve, expressed the way the lending program stores them
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveFees {
    /// Fee assessed on borrow, WAD-scaled fraction of the borrowed amount
    pub borrow_fee_wad: u64,
    /// Fee assessed on flash loans, WAD-scaled fraction of the loan
    pub flash_loan_fee_wad: u64,
    /// Share of the fees that goes to the host fee receiver (0-100)
    pub host_fee_percentage: u8,
}

/// Risk parameters handed to the lending program when a reserve is created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub optimal_utilization_rate: u8,
    pub loan_to_value_ratio: u8,
    pub liquidation_bonus: u8,
    pub liquidation_threshold: u8,
    pub min_borrow_rate: u8,
    pub optimal_borrow_rate: u8,
    pub max_borrow_rate: u8,
    pub fees: ReserveFees,
}

impl ReserveConfig {
    /// Configuration used for every reserve this client creates unless overridden.
    ///
    /// Borrow and flash loan fees are both `WAD / 20`, 20% of each to the host.
    pub fn standard() -> Self {
        Self {
            optimal_utilization_rate: 80,
            loan_to_value_ratio: 50,
            liquidation_bonus: 3,
            liquidation_threshold: 80,
            min_borrow_rate: 2,
            optimal_borrow_rate: 8,
            max_borrow_rate: 15,
            fees: ReserveFees {
                borrow_fee_wad: WAD / 20,
                flash_loan_fee_wad: WAD / 20,
                host_fee_percentage: 20,
            },
        }
    }

    pub(crate) const PACKED_LEN: usize = 7 + 8 + 8 + 1;

    pub(crate) fn pack_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[
            self.optimal_utilization_rate,
            self.loan_to_value_ratio,
            self.liquidation_bonus,
            self.liquidation_threshold,
            self.min_borrow_rate,
            self.optimal_borrow_rate,
            self.max_borrow_rate,
        ]);
        buf.extend_from_slice(&self.fees.borrow_fee_wad.to_le_bytes());
        buf.extend_from_slice(&self.fees.flash_loan_fee_wad.to_le_bytes());
        buf.push(self.fees.host_fee_percentage);
    }

    fn unpack(input: &[u8]) -> Result<(Self, &[u8]), ProgramError> {
        let (rates, rest) = unpack_bytes::<7>(input)?;
        let (borrow_fee_wad, rest) = unpack_u64(rest)?;
        let (flash_loan_fee_wad, rest) = unpack_u64(rest)?;
        let (host_fee_percentage, rest) = unpack_u8(rest)?;
        Ok((
            Self {
                optimal_utilization_rate: rates[0],
                loan_to_value_ratio: rates[1],
                liquidation_bonus: rates[2],
                liquidation_threshold: rates[3],
                min_borrow_rate: rates[4],
                optimal_borrow_rate: rates[5],
                max_borrow_rate: rates[6],
                fees: ReserveFees {
                    borrow_fee_wad,
                    flash_loan_fee_wad,
                    host_fee_percentage,
                },
            },
            rest,
        ))
    }
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Instructions of the token lending program that this client composes
#[repr(C)]
#[derive(Clone, Debug, PartialEq)]
pub enum LendingInstruction {
    /// Initializes a new lending market.
    ///
    ///   0. `[writable]` Lending market account - uninitialized.
    ///   1. `[]` Rent sysvar.
    ///   2. `[]` Token program id.
    ///   3. `[]` Oracle program id.
    InitLendingMarket {
        owner: Pubkey,
        quote_currency: [u8; 32],
    },

    /// Initializes a reserve and deposits its first liquidity.
    ///
    ///   0. `[writable]` Source liquidity token account.
    ///   1. `[writable]` Destination collateral token account - uninitialized.
    ///   2. `[writable]` Reserve account - uninitialized.
    ///   3. `[]` Reserve liquidity mint.
    ///   4. `[writable]` Reserve liquidity supply - uninitialized.
    ///   5. `[writable]` Reserve liquidity fee receiver - uninitialized.
    ///   6. `[]` Price product account.
    ///   7. `[]` Price account.
    ///   8. `[writable]` Reserve collateral mint - uninitialized.
    ///   9. `[writable]` Reserve collateral supply - uninitialized.
    ///   10 `[writable]` Lending market account.
    ///   11 `[]` Derived lending market authority.
    ///   12 `[signer]` Lending market owner.
    ///   13 `[signer]` User transfer authority.
    ///   14 `[]` Clock sysvar.
    ///   15 `[]` Rent sysvar.
    ///   16 `[]` Token program id.
    InitReserve {
        liquidity_amount: u64,
        config: ReserveConfig,
    },

    /// Accrues interest and updates the market price of a reserve.
    ///
    ///   0. `[writable]` Reserve account.
    ///   1. `[]` Reserve liquidity oracle account.
    ///   2. `[]` Clock sysvar.
    RefreshReserve,

    /// Deposits liquidity in exchange for collateral tokens.
    ///
    ///   0. `[writable]` Source liquidity token account.
    ///   1. `[writable]` Destination collateral token account.
    ///   2. `[writable]` Reserve account.
    ///   3. `[writable]` Reserve liquidity supply.
    ///   4. `[writable]` Reserve collateral mint.
    ///   5. `[]` Lending market account.
    ///   6. `[]` Derived lending market authority.
    ///   7. `[signer]` User transfer authority.
    ///   8. `[]` Clock sysvar.
    ///   9. `[]` Token program id.
    DepositReserveLiquidity { liquidity_amount: u64 },

    /// Burns collateral tokens and returns the underlying liquidity.
    ///
    ///   0. `[writable]` Source collateral token account.
    ///   1. `[writable]` Destination liquidity token account.
    ///   2. `[writable]` Reserve account.
    ///   3. `[writable]` Reserve collateral mint.
    ///   4. `[writable]` Reserve liquidity supply.
    ///   5. `[]` Lending market account.
    ///   6. `[]` Derived lending market authority.
    ///   7. `[signer]` User transfer authority.
    ///   8. `[]` Clock sysvar.
    ///   9. `[]` Token program id.
    RedeemReserveCollateral { collateral_amount: u64 },

    /// Initializes a new obligation.
    ///
    ///   0. `[writable]` Obligation account - uninitialized.
    ///   1. `[]` Lending market account.
    ///   2. `[signer]` Obligation owner.
    ///   3. `[]` Clock sysvar.
    ///   4. `[]` Rent sysvar.
    ///   5. `[]` Token program id.
    InitObligation,

    /// Recomputes obligation values from freshly refreshed reserves.
    ///
    ///   0. `[writable]` Obligation account.
    ///   1. `[]` Clock sysvar.
    ///   .. `[]` Deposit reserves in obligation order, then borrow reserves.
    RefreshObligation,

    /// Moves collateral tokens into an obligation.
    ///
    ///   0. `[writable]` Source collateral token account.
    ///   1. `[writable]` Destination deposit reserve collateral supply.
    ///   2. `[]` Deposit reserve account - refreshed.
    ///   3. `[writable]` Obligation account.
    ///   4. `[]` Lending market account.
    ///   5. `[signer]` Obligation owner.
    ///   6. `[signer]` User transfer authority.
    ///   7. `[]` Clock sysvar.
    ///   8. `[]` Token program id.
    DepositObligationCollateral { collateral_amount: u64 },

    /// Moves collateral tokens out of an obligation.
    ///
    ///   0. `[writable]` Source withdraw reserve collateral supply.
    ///   1. `[writable]` Destination collateral token account.
    ///   2. `[]` Withdraw reserve account - refreshed.
    ///   3. `[writable]` Obligation account - refreshed.
    ///   4. `[]` Lending market account.
    ///   5. `[]` Derived lending market authority.
    ///   6. `[signer]` Obligation owner.
    ///   7. `[]` Clock sysvar.
    ///   8. `[]` Token program id.
    WithdrawObligationCollateral { collateral_amount: u64 },

    /// Borrows liquidity against the obligation's collateral.
    ///
    ///   0. `[writable]` Source borrow reserve liquidity supply.
    ///   1. `[writable]` Destination liquidity token account.
    ///   2. `[writable]` Borrow reserve account - refreshed.
    ///   3. `[writable]` Borrow reserve liquidity fee receiver.
    ///   4. `[writable]` Obligation account - refreshed.
    ///   5. `[]` Lending market account.
    ///   6. `[]` Derived lending market authority.
    ///   7. `[signer]` Obligation owner.
    ///   8. `[]` Clock sysvar.
    ///   9. `[]` Token program id.
    ///   10 `[optional, writable]` Host fee receiver.
    BorrowObligationLiquidity { liquidity_amount: u64 },

    /// Repays borrowed liquidity.
    ///
    ///   0. `[writable]` Source liquidity token account.
    ///   1. `[writable]` Destination repay reserve liquidity supply.
    ///   2. `[writable]` Repay reserve account - refreshed.
    ///   3. `[writable]` Obligation account - refreshed.
    ///   4. `[]` Lending market account.
    ///   5. `[signer]` User transfer authority.
    ///   6. `[]` Clock sysvar.
    ///   7. `[]` Token program id.
    RepayObligationLiquidity { liquidity_amount: u64 },

    /// Repays borrowed liquidity of an unhealthy obligation in exchange for collateral.
    ///
    ///   0. `[writable]` Source liquidity token account.
    ///   1. `[writable]` Destination collateral token account.
    ///   2. `[writable]` Repay reserve account - refreshed.
    ///   3. `[writable]` Repay reserve liquidity supply.
    ///   4. `[]` Withdraw reserve account - refreshed.
    ///   5. `[writable]` Withdraw reserve collateral supply.
    ///   6. `[writable]` Obligation account - refreshed.
    ///   7. `[]` Lending market account.
    ///   8. `[]` Derived lending market authority.
    ///   9. `[signer]` User transfer authority.
    ///   10 `[]` Clock sysvar.
    ///   11 `[]` Token program id.
    LiquidateObligation { liquidity_amount: u64 },

    /// Lends reserve liquidity that must be returned, with fees, before the
    /// instruction finishes.
    ///
    ///   0. `[writable]` Source liquidity - reserve liquidity supply.
    ///   1. `[writable]` Destination liquidity token account.
    ///   2. `[writable]` Reserve account.
    ///   3. `[writable]` Flash loan fee receiver.
    ///   4. `[writable]` Host fee receiver.
    ///   5. `[]` Lending market account.
    ///   6. `[]` Derived lending market authority.
    ///   7. `[]` Token program id.
    ///   8. `[]` Flash loan receiver program id.
    ///   9. `[signer]` User transfer authority.
    ///   .. `[any]` Additional accounts expected by the receiver program.
    FlashLoan { amount: u64 },
}

impl LendingInstruction {
    /// Unpacks a byte buffer into a LendingInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (owner, rest) = unpack_pubkey(rest)?;
                let (quote_currency, _rest) = unpack_bytes::<32>(rest)?;
                Self::InitLendingMarket {
                    owner,
                    quote_currency,
                }
            }
            2 => {
                let (liquidity_amount, rest) = unpack_u64(rest)?;
                let (config, _rest) = ReserveConfig::unpack(rest)?;
                Self::InitReserve {
                    liquidity_amount,
                    config,
                }
            }
            3 => Self::RefreshReserve,
            4 => Self::DepositReserveLiquidity {
                liquidity_amount: unpack_u64(rest)?.0,
            },
            5 => Self::RedeemReserveCollateral {
                collateral_amount: unpack_u64(rest)?.0,
            },
            6 => Self::InitObligation,
            7 => Self::RefreshObligation,
            8 => Self::DepositObligationCollateral {
                collateral_amount: unpack_u64(rest)?.0,
            },
            9 => Self::WithdrawObligationCollateral {
                collateral_amount: unpack_u64(rest)?.0,
            },
            10 => Self::BorrowObligationLiquidity {
                liquidity_amount: unpack_u64(rest)?.0,
            },
            11 => Self::RepayObligationLiquidity {
                liquidity_amount: unpack_u64(rest)?.0,
            },
            12 => Self::LiquidateObligation {
                liquidity_amount: unpack_u64(rest)?.0,
            },
            13 => Self::FlashLoan {
                amount: unpack_u64(rest)?.0,
            },
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    /// Packs a LendingInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::InitLendingMarket {
                owner,
                quote_currency,
            } => {
                buf.push(0);
                buf.extend_from_slice(owner.as_ref());
                buf.extend_from_slice(quote_currency);
            }
            Self::InitReserve {
                liquidity_amount,
                config,
            } => {
                buf.reserve(8 + ReserveConfig::PACKED_LEN);
                buf.push(2);
                buf.extend_from_slice(&liquidity_amount.to_le_bytes());
                config.pack_into(&mut buf);
            }
            Self::RefreshReserve => buf.push(3),
            Self::DepositReserveLiquidity { liquidity_amount } => {
                buf.push(4);
                buf.extend_from_slice(&liquidity_amount.to_le_bytes());
            }
            Self::RedeemReserveCollateral { collateral_amount } => {
                buf.push(5);
                buf.extend_from_slice(&collateral_amount.to_le_bytes());
            }
            Self::InitObligation => buf.push(6),
            Self::RefreshObligation => buf.push(7),
            Self::DepositObligationCollateral { collateral_amount } => {
                buf.push(8);
                buf.extend_from_slice(&collateral_amount.to_le_bytes());
            }
            Self::WithdrawObligationCollateral { collateral_amount } => {
                buf.push(9);
                buf.extend_from_slice(&collateral_amount.to_le_bytes());
            }
            Self::BorrowObligationLiquidity { liquidity_amount } => {
                buf.push(10);
                buf.extend_from_slice(&liquidity_amount.to_le_bytes());
            }
            Self::RepayObligationLiquidity { liquidity_amount } => {
                buf.push(11);
                buf.extend_from_slice(&liquidity_amount.to_le_bytes());
            }
            Self::LiquidateObligation { liquidity_amount } => {
                buf.push(12);
                buf.extend_from_slice(&liquidity_amount.to_le_bytes());
            }
            Self::FlashLoan { amount } => {
                buf.push(13);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
        }
        buf
    }
}

fn unpack_u8(input: &[u8]) -> Result<(u8, &[u8]), ProgramError> {
    input
        .split_first()
        .map(|(&value, rest)| (value, rest))
        .ok_or(ProgramError::InvalidInstructionData)
}

fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
    let (bytes, rest) = unpack_bytes::<8>(input)?;
    Ok((u64::from_le_bytes(bytes), rest))
}

fn unpack_pubkey(input: &[u8]) -> Result<(Pubkey, &[u8]), ProgramError> {
    let (bytes, rest) = unpack_bytes::<PUBKEY_BYTES>(input)?;
    Ok((Pubkey::new_from_array(bytes), rest))
}

fn unpack_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
    if input.len() < N {
        return Err(ProgramError::InvalidInstructionData);
    }
    let (bytes, rest) = input.split_at(N);
    let bytes = bytes
        .try_into()
        .map_err(|_| ProgramError::InvalidInstructionData)?;
    Ok((bytes, rest))
}

/// Pads a currency label such as "USD" into the 32-byte quote currency field.
///
/// Labels longer than 32 bytes are rejected with `InvalidArgument`.
pub fn quote_currency(label: &str) -> Result<[u8; 32], ProgramError> {
    let bytes = label.as_bytes();
    if bytes.len() > 32 {
        return Err(ProgramError::InvalidArgument);
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

/// Creates an InitLendingMarket instruction
pub fn init_lending_market(
    program_id: Pubkey,
    owner: Pubkey,
    quote_currency: [u8; 32],
    lending_market: Pubkey,
    oracle_program_id: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(lending_market, false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(oracle_program_id, false),
        ],
        data: LendingInstruction::InitLendingMarket {
            owner,
            quote_currency,
        }
        .pack(),
    }
}

/// Creates an InitReserve instruction
#[allow(clippy::too_many_arguments)]
pub fn init_reserve(
    program_id: Pubkey,
    liquidity_amount: u64,
    config: ReserveConfig,
    source_liquidity: Pubkey,
    destination_collateral: Pubkey,
    reserve: Pubkey,
    reserve_liquidity_mint: Pubkey,
    reserve_liquidity_supply: Pubkey,
    reserve_liquidity_fee_receiver: Pubkey,
    price_product: Pubkey,
    price: Pubkey,
    reserve_collateral_mint: Pubkey,
    reserve_collateral_supply: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    lending_market_owner: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_liquidity, false),
            AccountMeta::new(destination_collateral, false),
            AccountMeta::new(reserve, false),
            AccountMeta::new_readonly(reserve_liquidity_mint, false),
            AccountMeta::new(reserve_liquidity_supply, false),
            AccountMeta::new(reserve_liquidity_fee_receiver, false),
            AccountMeta::new_readonly(price_product, false),
            AccountMeta::new_readonly(price, false),
            AccountMeta::new(reserve_collateral_mint, false),
            AccountMeta::new(reserve_collateral_supply, false),
            AccountMeta::new(lending_market, false),
            AccountMeta::new_readonly(lending_market_authority, false),
            AccountMeta::new_readonly(lending_market_owner, true),
            AccountMeta::new_readonly(user_transfer_authority, true),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::InitReserve {
            liquidity_amount,
            config,
        }
        .pack(),
    }
}

/// Creates a RefreshReserve instruction
pub fn refresh_reserve(program_id: Pubkey, reserve: Pubkey, reserve_liquidity_oracle: Pubkey) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(reserve, false),
            AccountMeta::new_readonly(reserve_liquidity_oracle, false),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
        ],
        data: LendingInstruction::RefreshReserve.pack(),
    }
}

/// Creates a DepositReserveLiquidity instruction
#[allow(clippy::too_many_arguments)]
pub fn deposit_reserve_liquidity(
    program_id: Pubkey,
    liquidity_amount: u64,
    source_liquidity: Pubkey,
    destination_collateral: Pubkey,
    reserve: Pubkey,
    reserve_liquidity_supply: Pubkey,
    reserve_collateral_mint: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_liquidity, false),
            AccountMeta::new(destination_collateral, false),
            AccountMeta::new(reserve, false),
            AccountMeta::new(reserve_liquidity_supply, false),
            AccountMeta::new(reserve_collateral_mint, false),
            AccountMeta::new_readonly(lending_market, false),
            AccountMeta::new_readonly(lending_market_authority, false),
            AccountMeta::new_readonly(user_transfer_authority, true),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::DepositReserveLiquidity { liquidity_amount }.pack(),
    }
}

/// Creates a RedeemReserveCollateral instruction
#[allow(clippy::too_many_arguments)]
pub fn redeem_reserve_collateral(
    program_id: Pubkey,
    collateral_amount: u64,
    source_collateral: Pubkey,
    destination_liquidity: Pubkey,
    reserve: Pubkey,
    reserve_collateral_mint: Pubkey,
    reserve_liquidity_supply: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_collateral, false),
            AccountMeta::new(destination_liquidity, false),
            AccountMeta::new(reserve, false),
            AccountMeta::new(reserve_collateral_mint, false),
            AccountMeta::new(reserve_liquidity_supply, false),
            AccountMeta::new_readonly(lending_market, false),
            AccountMeta::new_readonly(lending_market_authority, false),
            AccountMeta::new_readonly(user_transfer_authority, true),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::RedeemReserveCollateral { collateral_amount }.pack(),
    }
}

/// Creates an InitObligation instruction
pub fn init_obligation(
    program_id: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    obligation_owner: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(obligation, false),
            AccountMeta::new_readonly(lending_market, false),
            AccountMeta::new_readonly(obligation_owner, true),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::InitObligation.pack(),
    }
}

/// Creates a RefreshObligation instruction.
///
/// `reserves` must be the obligation's deposit reserves followed by its borrow
/// reserves, each in the order the obligation records them.
pub fn refresh_obligation<I>(program_id: Pubkey, obligation: Pubkey, reserves: I) -> Instruction
where
    I: IntoIterator<Item = Pubkey>,
{
    let mut accounts = vec![
        AccountMeta::new(obligation, false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
    ];
    accounts.extend(
        reserves
            .into_iter()
            .map(|reserve| AccountMeta::new_readonly(reserve, false)),
    );
    Instruction {
        program_id,
        accounts,
        data: LendingInstruction::RefreshObligation.pack(),
    }
}

/// Creates a DepositObligationCollateral instruction
#[allow(clippy::too_many_arguments)]
pub fn deposit_obligation_collateral(
    program_id: Pubkey,
    collateral_amount: u64,
    source_collateral: Pubkey,
    destination_collateral: Pubkey,
    deposit_reserve: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    obligation_owner: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_collateral, false),
            AccountMeta::new(destination_collateral, false),
            AccountMeta::new_readonly(deposit_reserve, false),
            AccountMeta::new(obligation, false),
            AccountMeta::new_readonly(lending_market, false),
            AccountMeta::new_readonly(obligation_owner, true),
            AccountMeta::new_readonly(user_transfer_authority, true),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::DepositObligationCollateral { collateral_amount }.pack(),
    }
}

/// Creates a WithdrawObligationCollateral instruction
#[allow(clippy::too_many_arguments)]
pub fn withdraw_obligation_collateral(
    program_id: Pubkey,
    collateral_amount: u64,
    source_collateral: Pubkey,
    destination_collateral: Pubkey,
    withdraw_reserve: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    obligation_owner: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_collateral, false),
            AccountMeta::new(destination_collateral, false),
            AccountMeta::new_readonly(withdraw_reserve, false),
            AccountMeta::new(obligation, false),
            AccountMeta::new_readonly(lending_market, false),
            AccountMeta::new_readonly(lending_market_authority, false),
            AccountMeta::new_readonly(obligation_owner, true),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::WithdrawObligationCollateral { collateral_amount }.pack(),
    }
}

/// Creates a BorrowObligationLiquidity instruction
#[allow(clippy::too_many_arguments)]
pub fn borrow_obligation_liquidity(
    program_id: Pubkey,
    liquidity_amount: u64,
    source_liquidity: Pubkey,
    destination_liquidity: Pubkey,
    borrow_reserve: Pubkey,
    borrow_reserve_liquidity_fee_receiver: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    obligation_owner: Pubkey,
    host_fee_receiver: Option<Pubkey>,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(source_liquidity, false),
        AccountMeta::new(destination_liquidity, false),
        AccountMeta::new(borrow_reserve, false),
        AccountMeta::new(borrow_reserve_liquidity_fee_receiver, false),
        AccountMeta::new(obligation, false),
        AccountMeta::new_readonly(lending_market, false),
        AccountMeta::new_readonly(lending_market_authority, false),
        AccountMeta::new_readonly(obligation_owner, true),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];

    if let Some(host_fee_receiver) = host_fee_receiver {
        accounts.push(AccountMeta::new(host_fee_receiver, false));
    }

    Instruction {
        program_id,
        accounts,
        data: LendingInstruction::BorrowObligationLiquidity { liquidity_amount }.pack(),
    }
}

/// Creates a RepayObligationLiquidity instruction
#[allow(clippy::too_many_arguments)]
pub fn repay_obligation_liquidity(
    program_id: Pubkey,
    liquidity_amount: u64,
    source_liquidity: Pubkey,
    destination_liquidity: Pubkey,
    repay_reserve: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_liquidity, false),
            AccountMeta::new(destination_liquidity, false),
            AccountMeta::new(repay_reserve, false),
            AccountMeta::new(obligation, false),
            AccountMeta::new_readonly(lending_market, false),
            AccountMeta::new_readonly(user_transfer_authority, true),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::RepayObligationLiquidity { liquidity_amount }.pack(),
    }
}

/// Creates a LiquidateObligation instruction
#[allow(clippy::too_many_arguments)]
pub fn liquidate_obligation(
    program_id: Pubkey,
    liquidity_amount: u64,
    source_liquidity: Pubkey,
    destination_collateral: Pubkey,
    repay_reserve: Pubkey,
    repay_reserve_liquidity_supply: Pubkey,
    withdraw_reserve: Pubkey,
    withdraw_reserve_collateral_supply: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_liquidity, false),
            AccountMeta::new(destination_collateral, false),
            AccountMeta::new(repay_reserve, false),
            AccountMeta::new(repay_reserve_liquidity_supply, false),
            AccountMeta::new_readonly(withdraw_reserve, false),
            AccountMeta::new(withdraw_reserve_collateral_supply, false),
            AccountMeta::new(obligation, false),
            AccountMeta::new_readonly(lending_market, false),
            AccountMeta::new_readonly(lending_market_authority, false),
            AccountMeta::new_readonly(user_transfer_authority, true),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::LiquidateObligation { liquidity_amount }.pack(),
    }
}

/// Creates a FlashLoan instruction
#[allow(clippy::too_many_arguments)]
pub fn flash_loan(
    program_id: Pubkey,
    amount: u64,
    source_liquidity: Pubkey,
    destination_liquidity: Pubkey,
    reserve: Pubkey,
    flash_loan_fee_receiver: Pubkey,
    host_fee_receiver: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    flash_loan_receiver_program: Pubkey,
    user_transfer_authority: Pubkey,
    receiver_program_accounts: Vec<AccountMeta>,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(source_liquidity, false),
        AccountMeta::new(destination_liquidity, false),
        AccountMeta::new(reserve, false),
        AccountMeta::new(flash_loan_fee_receiver, false),
        AccountMeta::new(host_fee_receiver, false),
        AccountMeta::new_readonly(lending_market, false),
        AccountMeta::new_readonly(lending_market_authority, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(flash_loan_receiver_program, false),
        AccountMeta::new_readonly(user_transfer_authority, true),
    ];

    accounts.extend(receiver_program_accounts);

    Instruction {
        program_id,
        accounts,
        data: LendingInstruction::FlashLoan { amount }.pack(),
    }
}
