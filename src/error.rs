use solana_client::client_error::ClientError;
use solana_program::program_error::ProgramError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::orchestration::bundle::{ActionKind, Step};

/// Errors returned at the ledger boundary
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transport or RPC-level failure, including transactions the cluster refused
    #[error(transparent)]
    Rpc(#[from] Box<ClientError>),

    /// Bundle rejected by the program or the runtime, reported as text
    #[error("bundle rejected: {0}")]
    Rejected(String),

    /// Requested account does not exist
    #[error("account {0} not found")]
    AccountNotFound(Pubkey),

    /// Account exists but is not an initialized token account
    #[error("account {0} is not a token account")]
    InvalidTokenAccount(Pubkey),
}

impl From<ClientError> for LedgerError {
    fn from(e: ClientError) -> Self {
        LedgerError::Rpc(Box::new(e))
    }
}

/// Errors produced by the lending orchestration layer
#[derive(Debug, Error)]
pub enum LendingClientError {
    /// No bump seed yields an off-curve authority for the market
    #[error("unable to derive lending market authority for {market}")]
    Derivation { market: Pubkey },

    /// Remote state could not be read
    #[error("failed to read account {address}")]
    StateRead {
        address: Pubkey,
        #[source]
        source: LedgerError,
    },

    /// Remote state was read but does not parse as the expected account
    #[error("account {address} is not a valid {kind}: {source}")]
    UnparseableAccount {
        address: Pubkey,
        kind: &'static str,
        #[source]
        source: ProgramError,
    },

    /// Submission failed; the bundle had no effect
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// An obligation action was built without a portfolio snapshot
    #[error("{action:?} requires a synced portfolio before building")]
    MissingPortfolio { action: ActionKind },

    /// The bundle was built from a snapshot that is no longer the latest
    #[error("portfolio snapshot #{snapshot} is stale, tracker is at #{current}")]
    StalePortfolio { snapshot: u64, current: u64 },

    /// A bundle's operations violate the refresh-before-act ordering
    #[error("{action:?}: {step:?} at position {position} is out of refresh order")]
    RefreshOrder {
        action: ActionKind,
        step: Step,
        position: usize,
    },

    /// Asset has no reserve configured in this client
    #[error("unknown asset {0}")]
    UnknownAsset(String),

    /// Asset already has a reserve in this market
    #[error("asset {0} already has a reserve")]
    DuplicateReserve(String),

    /// The obligation references a reserve this client cannot refresh
    #[error("obligation references reserve {0} which this client does not manage")]
    UntrackedReserve(Pubkey),

    /// Action needs a market that has not been initialized yet
    #[error("lending market has not been initialized")]
    MarketNotInitialized,

    /// Action needs an obligation that has not been initialized yet
    #[error("obligation has not been initialized")]
    ObligationNotInitialized,

    /// Configured quote currency label does not fit the market's 32-byte field
    #[error("quote currency {0:?} is longer than 32 bytes")]
    InvalidQuoteCurrency(String),

    /// A required signer is not held by the client
    #[error("no keypair available for signer {0}")]
    MissingSigner(Pubkey),

    /// Airdrop never showed up in the payer balance
    #[error("airdrop of {lamports} lamports to {recipient} did not land")]
    AirdropFailed { recipient: Pubkey, lamports: u64 },

    /// Building a token-program instruction failed
    #[error("failed to build instruction: {0}")]
    Instruction(#[from] ProgramError),
}

pub type Result<T> = std::result::Result<T, LendingClientError>;
