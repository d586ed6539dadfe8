//! Wire contract of the external token-lending program
//!
//! Nothing in here talks to a cluster: these are the instruction encoders and
//! the read-only account views the orchestration layer composes and parses.

pub mod instruction;
pub mod state;

use solana_sdk::pubkey::Pubkey;

pub use instruction::{LendingInstruction, ReserveConfig, ReserveFees};
pub use state::{
    Decimal, LastUpdate, LendingMarket, Obligation, ObligationCollateral, ObligationLiquidity,
    Reserve, ReserveCollateral, ReserveLiquidity,
};

/// Token-lending program deployed on devnet
pub const LENDING_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("8qdJZwaeDUPFGdbriVhhHhyNPFvE8tYjvYL7pBWS9pmM");

/// Oracle program the lending market is bound to at initialization
pub const ORACLE_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("gSbePebfvPy7tRqimPoVecS2UsBvYv46ynrzWocc92s");

/// Program invoked by the lending program to receive and return a flash loan
pub const FLASH_LOAN_RECEIVER_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("4Hz4EjqhCeeHdx2u36NnuWC83tXidzrrwr1858VFJN8s");

/// Scale of the fixed-point values stored by the lending program (1e18)
pub const WAD: u64 = 1_000_000_000_000_000_000;
