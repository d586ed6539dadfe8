use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
};
use solana_sdk::pubkey::{Pubkey, PUBKEY_BYTES};

use super::instruction::{ReserveConfig, ReserveFees};
use super::WAD;

/// Maximum number of distinct reserves an obligation can reference
pub const MAX_OBLIGATION_RESERVES: usize = 10;

/// WAD-scaled fixed point value as stored by the lending program
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(pub u128);

impl Decimal {
    pub fn zero() -> Self {
        Self(0)
    }

    /// Whole-unit value scaled up to a WAD
    pub fn from_integer(value: u64) -> Self {
        Self(value as u128 * WAD as u128)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Lossy conversion for reporting only
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / WAD as f64
    }
}

/// Slot of the last refresh and whether the account has been marked stale since
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LastUpdate {
    pub slot: u64,
    pub stale: bool,
}

/// Lending market state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LendingMarket {
    /// Version of the struct
    pub version: u8,
    /// Bump seed for derived authority address
    pub bump_seed: u8,
    /// Owner authority which can add new reserves
    pub owner: Pubkey,
    /// Currency market prices are quoted in
    pub quote_currency: [u8; 32],
    /// Token program id
    pub token_program_id: Pubkey,
    /// Oracle program id
    pub oracle_program_id: Pubkey,
}

impl Sealed for LendingMarket {}

impl IsInitialized for LendingMarket {
    fn is_initialized(&self) -> bool {
        self.version != 0
    }
}

const LENDING_MARKET_LEN: usize = 258; // 1 + 1 + 32 + 32 + 32 + 32 + 128

impl Pack for LendingMarket {
    const LEN: usize = LENDING_MARKET_LEN;

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let output = array_mut_ref![dst, 0, LENDING_MARKET_LEN];
        let (version, bump_seed, owner, quote_currency, token_program_id, oracle_program_id, _padding) =
            mut_array_refs![output, 1, 1, PUBKEY_BYTES, 32, PUBKEY_BYTES, PUBKEY_BYTES, 128];

        version[0] = self.version;
        bump_seed[0] = self.bump_seed;
        owner.copy_from_slice(self.owner.as_ref());
        quote_currency.copy_from_slice(&self.quote_currency);
        token_program_id.copy_from_slice(self.token_program_id.as_ref());
        oracle_program_id.copy_from_slice(self.oracle_program_id.as_ref());
    }

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let input = array_ref![src, 0, LENDING_MARKET_LEN];
        let (version, bump_seed, owner, quote_currency, token_program_id, oracle_program_id, _padding) =
            array_refs![input, 1, 1, PUBKEY_BYTES, 32, PUBKEY_BYTES, PUBKEY_BYTES, 128];

        Ok(Self {
            version: version[0],
            bump_seed: bump_seed[0],
            owner: Pubkey::new_from_array(*owner),
            quote_currency: *quote_currency,
            token_program_id: Pubkey::new_from_array(*token_program_id),
            oracle_program_id: Pubkey::new_from_array(*oracle_program_id),
        })
    }
}

/// Reserve state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reserve {
    /// Version of the struct
    pub version: u8,
    /// Last slot when supply and rates updated
    pub last_update: LastUpdate,
    /// Lending market address
    pub lending_market: Pubkey,
    /// Reserve liquidity
    pub liquidity: ReserveLiquidity,
    /// Reserve collateral
    pub collateral: ReserveCollateral,
    /// Reserve configuration values
    pub config: ReserveConfig,
}

/// Reserve liquidity
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReserveLiquidity {
    /// Reserve liquidity mint address
    pub mint_pubkey: Pubkey,
    /// Reserve liquidity mint decimals
    pub mint_decimals: u8,
    /// Reserve liquidity supply address
    pub supply_pubkey: Pubkey,
    /// Reserve liquidity oracle (price account)
    pub oracle_pubkey: Pubkey,
    /// Reserve liquidity fee receiver address
    pub fee_receiver: Pubkey,
    /// Reserve liquidity available
    pub available_amount: u64,
    /// Reserve liquidity borrowed
    pub borrowed_amount_wads: Decimal,
    /// Reserve liquidity cumulative borrow rate
    pub cumulative_borrow_rate_wads: Decimal,
    /// Reserve liquidity market price in quote currency
    pub market_price: Decimal,
}

/// Reserve collateral
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReserveCollateral {
    /// Reserve collateral mint address
    pub mint_pubkey: Pubkey,
    /// Reserve collateral mint supply
    pub mint_total_supply: u64,
    /// Reserve collateral supply address
    pub supply_pubkey: Pubkey,
}

impl Sealed for Reserve {}

impl IsInitialized for Reserve {
    fn is_initialized(&self) -> bool {
        self.version != 0
    }
}

const RESERVE_LEN: usize = 571;

impl Pack for Reserve {
    const LEN: usize = RESERVE_LEN;

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let output = array_mut_ref![dst, 0, RESERVE_LEN];
        let (
            version,
            last_update_slot,
            last_update_stale,
            lending_market,
            liquidity_mint_pubkey,
            liquidity_mint_decimals,
            liquidity_supply_pubkey,
            liquidity_oracle_pubkey,
            liquidity_fee_receiver,
            liquidity_available_amount,
            liquidity_borrowed_amount_wads,
            liquidity_cumulative_borrow_rate_wads,
            liquidity_market_price,
            collateral_mint_pubkey,
            collateral_mint_total_supply,
            collateral_supply_pubkey,
            config_rates,
            config_borrow_fee_wad,
            config_flash_loan_fee_wad,
            config_host_fee_percentage,
            _padding,
        ) = mut_array_refs![
            output,
            1,
            8,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            8,
            16,
            16,
            16,
            PUBKEY_BYTES,
            8,
            PUBKEY_BYTES,
            7,
            8,
            8,
            1,
            248
        ];

        version[0] = self.version;
        *last_update_slot = self.last_update.slot.to_le_bytes();
        last_update_stale[0] = self.last_update.stale as u8;
        lending_market.copy_from_slice(self.lending_market.as_ref());

        liquidity_mint_pubkey.copy_from_slice(self.liquidity.mint_pubkey.as_ref());
        liquidity_mint_decimals[0] = self.liquidity.mint_decimals;
        liquidity_supply_pubkey.copy_from_slice(self.liquidity.supply_pubkey.as_ref());
        liquidity_oracle_pubkey.copy_from_slice(self.liquidity.oracle_pubkey.as_ref());
        liquidity_fee_receiver.copy_from_slice(self.liquidity.fee_receiver.as_ref());
        *liquidity_available_amount = self.liquidity.available_amount.to_le_bytes();
        *liquidity_borrowed_amount_wads = self.liquidity.borrowed_amount_wads.0.to_le_bytes();
        *liquidity_cumulative_borrow_rate_wads =
            self.liquidity.cumulative_borrow_rate_wads.0.to_le_bytes();
        *liquidity_market_price = self.liquidity.market_price.0.to_le_bytes();

        collateral_mint_pubkey.copy_from_slice(self.collateral.mint_pubkey.as_ref());
        *collateral_mint_total_supply = self.collateral.mint_total_supply.to_le_bytes();
        collateral_supply_pubkey.copy_from_slice(self.collateral.supply_pubkey.as_ref());

        *config_rates = [
            self.config.optimal_utilization_rate,
            self.config.loan_to_value_ratio,
            self.config.liquidation_bonus,
            self.config.liquidation_threshold,
            self.config.min_borrow_rate,
            self.config.optimal_borrow_rate,
            self.config.max_borrow_rate,
        ];
        *config_borrow_fee_wad = self.config.fees.borrow_fee_wad.to_le_bytes();
        *config_flash_loan_fee_wad = self.config.fees.flash_loan_fee_wad.to_le_bytes();
        config_host_fee_percentage[0] = self.config.fees.host_fee_percentage;
    }

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let input = array_ref![src, 0, RESERVE_LEN];
        let (
            version,
            last_update_slot,
            last_update_stale,
            lending_market,
            liquidity_mint_pubkey,
            liquidity_mint_decimals,
            liquidity_supply_pubkey,
            liquidity_oracle_pubkey,
            liquidity_fee_receiver,
            liquidity_available_amount,
            liquidity_borrowed_amount_wads,
            liquidity_cumulative_borrow_rate_wads,
            liquidity_market_price,
            collateral_mint_pubkey,
            collateral_mint_total_supply,
            collateral_supply_pubkey,
            config_rates,
            config_borrow_fee_wad,
            config_flash_loan_fee_wad,
            config_host_fee_percentage,
            _padding,
        ) = array_refs![
            input,
            1,
            8,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            8,
            16,
            16,
            16,
            PUBKEY_BYTES,
            8,
            PUBKEY_BYTES,
            7,
            8,
            8,
            1,
            248
        ];

        Ok(Self {
            version: version[0],
            last_update: LastUpdate {
                slot: u64::from_le_bytes(*last_update_slot),
                stale: unpack_bool(last_update_stale)?,
            },
            lending_market: Pubkey::new_from_array(*lending_market),
            liquidity: ReserveLiquidity {
                mint_pubkey: Pubkey::new_from_array(*liquidity_mint_pubkey),
                mint_decimals: liquidity_mint_decimals[0],
                supply_pubkey: Pubkey::new_from_array(*liquidity_supply_pubkey),
                oracle_pubkey: Pubkey::new_from_array(*liquidity_oracle_pubkey),
                fee_receiver: Pubkey::new_from_array(*liquidity_fee_receiver),
                available_amount: u64::from_le_bytes(*liquidity_available_amount),
                borrowed_amount_wads: Decimal(u128::from_le_bytes(*liquidity_borrowed_amount_wads)),
                cumulative_borrow_rate_wads: Decimal(u128::from_le_bytes(
                    *liquidity_cumulative_borrow_rate_wads,
                )),
                market_price: Decimal(u128::from_le_bytes(*liquidity_market_price)),
            },
            collateral: ReserveCollateral {
                mint_pubkey: Pubkey::new_from_array(*collateral_mint_pubkey),
                mint_total_supply: u64::from_le_bytes(*collateral_mint_total_supply),
                supply_pubkey: Pubkey::new_from_array(*collateral_supply_pubkey),
            },
            config: ReserveConfig {
                optimal_utilization_rate: config_rates[0],
                loan_to_value_ratio: config_rates[1],
                liquidation_bonus: config_rates[2],
                liquidation_threshold: config_rates[3],
                min_borrow_rate: config_rates[4],
                optimal_borrow_rate: config_rates[5],
                max_borrow_rate: config_rates[6],
                fees: ReserveFees {
                    borrow_fee_wad: u64::from_le_bytes(*config_borrow_fee_wad),
                    flash_loan_fee_wad: u64::from_le_bytes(*config_flash_loan_fee_wad),
                    host_fee_percentage: config_host_fee_percentage[0],
                },
            },
        })
    }
}

/// Collateral deposited into an obligation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObligationCollateral {
    /// Reserve collateral is deposited to
    pub deposit_reserve: Pubkey,
    /// Amount of collateral deposited
    pub deposited_amount: u64,
    /// Collateral market value in quote currency
    pub market_value: Decimal,
}

/// Liquidity borrowed by an obligation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObligationLiquidity {
    /// Reserve liquidity is borrowed from
    pub borrow_reserve: Pubkey,
    /// Borrow rate used for calculating interest
    pub cumulative_borrow_rate_wads: Decimal,
    /// Amount of liquidity borrowed plus interest
    pub borrowed_amount_wads: Decimal,
    /// Liquidity market value in quote currency
    pub market_value: Decimal,
}

/// Obligation state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Obligation {
    /// Version of the struct
    pub version: u8,
    /// Last update to collateral, liquidity, or their market values
    pub last_update: LastUpdate,
    /// Lending market address
    pub lending_market: Pubkey,
    /// Owner authority which can borrow liquidity
    pub owner: Pubkey,
    /// Deposited collateral, in the order the program recorded it
    pub deposits: Vec<ObligationCollateral>,
    /// Borrowed liquidity, in the order the program recorded it
    pub borrows: Vec<ObligationLiquidity>,
    /// Market value of deposits
    pub deposited_value: Decimal,
    /// Market value of borrows
    pub borrowed_value: Decimal,
    /// The maximum borrow value at the weighted average loan to value ratio
    pub allowed_borrow_value: Decimal,
    /// The dangerous borrow value at the weighted average liquidation threshold
    pub unhealthy_borrow_value: Decimal,
}

impl Obligation {
    /// Reserves the obligation has collateral in, in recorded order
    pub fn deposit_reserves(&self) -> impl Iterator<Item = Pubkey> + '_ {
        self.deposits.iter().map(|d| d.deposit_reserve)
    }

    /// Reserves the obligation has borrowed from, in recorded order
    pub fn borrow_reserves(&self) -> impl Iterator<Item = Pubkey> + '_ {
        self.borrows.iter().map(|b| b.borrow_reserve)
    }
}

impl Sealed for Obligation {}

impl IsInitialized for Obligation {
    fn is_initialized(&self) -> bool {
        self.version != 0
    }
}

const OBLIGATION_COLLATERAL_LEN: usize = 56; // 32 + 8 + 16
const OBLIGATION_LIQUIDITY_LEN: usize = 80; // 32 + 16 + 16 + 16
const OBLIGATION_DATA_FLAT_LEN: usize =
    OBLIGATION_COLLATERAL_LEN + OBLIGATION_LIQUIDITY_LEN * (MAX_OBLIGATION_RESERVES - 1);
const OBLIGATION_LEN: usize = 916; // 1 + 8 + 1 + 32 + 32 + 16 * 4 + 1 + 1 + 776

impl Pack for Obligation {
    const LEN: usize = OBLIGATION_LEN;

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let output = array_mut_ref![dst, 0, OBLIGATION_LEN];
        let (
            version,
            last_update_slot,
            last_update_stale,
            lending_market,
            owner,
            deposited_value,
            borrowed_value,
            allowed_borrow_value,
            unhealthy_borrow_value,
            deposits_len,
            borrows_len,
            data_flat,
        ) = mut_array_refs![
            output,
            1,
            8,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            16,
            16,
            16,
            16,
            1,
            1,
            OBLIGATION_DATA_FLAT_LEN
        ];

        version[0] = self.version;
        *last_update_slot = self.last_update.slot.to_le_bytes();
        last_update_stale[0] = self.last_update.stale as u8;
        lending_market.copy_from_slice(self.lending_market.as_ref());
        owner.copy_from_slice(self.owner.as_ref());
        *deposited_value = self.deposited_value.0.to_le_bytes();
        *borrowed_value = self.borrowed_value.0.to_le_bytes();
        *allowed_borrow_value = self.allowed_borrow_value.0.to_le_bytes();
        *unhealthy_borrow_value = self.unhealthy_borrow_value.0.to_le_bytes();
        deposits_len[0] = self.deposits.len() as u8;
        borrows_len[0] = self.borrows.len() as u8;

        data_flat.fill(0);
        let mut offset = 0;
        for collateral in &self.deposits {
            let flat = array_mut_ref![data_flat, offset, OBLIGATION_COLLATERAL_LEN];
            let (deposit_reserve, deposited_amount, market_value) =
                mut_array_refs![flat, PUBKEY_BYTES, 8, 16];
            deposit_reserve.copy_from_slice(collateral.deposit_reserve.as_ref());
            *deposited_amount = collateral.deposited_amount.to_le_bytes();
            *market_value = collateral.market_value.0.to_le_bytes();
            offset += OBLIGATION_COLLATERAL_LEN;
        }
        for liquidity in &self.borrows {
            let flat = array_mut_ref![data_flat, offset, OBLIGATION_LIQUIDITY_LEN];
            let (borrow_reserve, cumulative_borrow_rate_wads, borrowed_amount_wads, market_value) =
                mut_array_refs![flat, PUBKEY_BYTES, 16, 16, 16];
            borrow_reserve.copy_from_slice(liquidity.borrow_reserve.as_ref());
            *cumulative_borrow_rate_wads = liquidity.cumulative_borrow_rate_wads.0.to_le_bytes();
            *borrowed_amount_wads = liquidity.borrowed_amount_wads.0.to_le_bytes();
            *market_value = liquidity.market_value.0.to_le_bytes();
            offset += OBLIGATION_LIQUIDITY_LEN;
        }
    }

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let input = array_ref![src, 0, OBLIGATION_LEN];
        let (
            version,
            last_update_slot,
            last_update_stale,
            lending_market,
            owner,
            deposited_value,
            borrowed_value,
            allowed_borrow_value,
            unhealthy_borrow_value,
            deposits_len,
            borrows_len,
            data_flat,
        ) = array_refs![
            input,
            1,
            8,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            16,
            16,
            16,
            16,
            1,
            1,
            OBLIGATION_DATA_FLAT_LEN
        ];

        let deposits_len = deposits_len[0] as usize;
        let borrows_len = borrows_len[0] as usize;
        if deposits_len + borrows_len > MAX_OBLIGATION_RESERVES {
            return Err(ProgramError::InvalidAccountData);
        }
        // The flat buffer only fits one deposit plus nine borrows.
        let used = deposits_len * OBLIGATION_COLLATERAL_LEN + borrows_len * OBLIGATION_LIQUIDITY_LEN;
        if used > OBLIGATION_DATA_FLAT_LEN {
            return Err(ProgramError::InvalidAccountData);
        }

        let mut offset = 0;
        let mut deposits = Vec::with_capacity(deposits_len);
        for _ in 0..deposits_len {
            let flat = array_ref![data_flat, offset, OBLIGATION_COLLATERAL_LEN];
            let (deposit_reserve, deposited_amount, market_value) =
                array_refs![flat, PUBKEY_BYTES, 8, 16];
            deposits.push(ObligationCollateral {
                deposit_reserve: Pubkey::new_from_array(*deposit_reserve),
                deposited_amount: u64::from_le_bytes(*deposited_amount),
                market_value: Decimal(u128::from_le_bytes(*market_value)),
            });
            offset += OBLIGATION_COLLATERAL_LEN;
        }

        let mut borrows = Vec::with_capacity(borrows_len);
        for _ in 0..borrows_len {
            let flat = array_ref![data_flat, offset, OBLIGATION_LIQUIDITY_LEN];
            let (borrow_reserve, cumulative_borrow_rate_wads, borrowed_amount_wads, market_value) =
                array_refs![flat, PUBKEY_BYTES, 16, 16, 16];
            borrows.push(ObligationLiquidity {
                borrow_reserve: Pubkey::new_from_array(*borrow_reserve),
                cumulative_borrow_rate_wads: Decimal(u128::from_le_bytes(*cumulative_borrow_rate_wads)),
                borrowed_amount_wads: Decimal(u128::from_le_bytes(*borrowed_amount_wads)),
                market_value: Decimal(u128::from_le_bytes(*market_value)),
            });
            offset += OBLIGATION_LIQUIDITY_LEN;
        }

        Ok(Self {
            version: version[0],
            last_update: LastUpdate {
                slot: u64::from_le_bytes(*last_update_slot),
                stale: unpack_bool(last_update_stale)?,
            },
            lending_market: Pubkey::new_from_array(*lending_market),
            owner: Pubkey::new_from_array(*owner),
            deposits,
            borrows,
            deposited_value: Decimal(u128::from_le_bytes(*deposited_value)),
            borrowed_value: Decimal(u128::from_le_bytes(*borrowed_value)),
            allowed_borrow_value: Decimal(u128::from_le_bytes(*allowed_borrow_value)),
            unhealthy_borrow_value: Decimal(u128::from_le_bytes(*unhealthy_borrow_value)),
        })
    }
}

fn unpack_bool(src: &[u8; 1]) -> Result<bool, ProgramError> {
    match src[0] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ProgramError::InvalidAccountData),
    }
}
