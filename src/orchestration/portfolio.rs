use solana_sdk::pubkey::Pubkey;

use super::read_state;
use crate::error::{LendingClientError, Result};
use crate::execution::LedgerClient;
use crate::protocol::Obligation;

/// The obligation's deposit and borrow reserves as of one sync
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    /// Increases by one on every sync; bundles remember the sequence they were built from
    pub sequence: u64,
    pub obligation: Pubkey,
    /// Collateral reserves in the order the obligation records them
    pub deposits: Vec<Pubkey>,
    /// Liquidity reserves in the order the obligation records them
    pub borrows: Vec<Pubkey>,
    pub state: Obligation,
}

impl PortfolioSnapshot {
    /// Reserve list for RefreshObligation: deposits first, then borrows
    pub fn refresh_reserves(&self) -> impl Iterator<Item = Pubkey> + '_ {
        self.deposits.iter().chain(self.borrows.iter()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty() && self.borrows.is_empty()
    }
}

/// Tracks which reserves an obligation references.
///
/// The snapshot is replaced wholesale on every sync and dropped as soon as a
/// sync fails, so nothing is ever built from a partial or unknown portfolio.
#[derive(Debug, Default)]
pub struct PortfolioTracker {
    sequence: u64,
    snapshot: Option<PortfolioSnapshot>,
}

impl PortfolioTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the obligation and replaces the snapshot
    pub async fn sync<L>(&mut self, ledger: &L, obligation: &Pubkey) -> Result<&PortfolioSnapshot>
    where
        L: LedgerClient + ?Sized,
    {
        self.snapshot = None;

        let state: Obligation = read_state(ledger, obligation, "obligation").await?;

        let snapshot = self.record(*obligation, state);
        log::debug!(
            "Portfolio #{} for {}: {} deposits, {} borrows",
            snapshot.sequence,
            obligation,
            snapshot.deposits.len(),
            snapshot.borrows.len()
        );
        Ok(snapshot)
    }

    fn record(&mut self, obligation: Pubkey, state: Obligation) -> &PortfolioSnapshot {
        self.sequence += 1;
        self.snapshot.insert(PortfolioSnapshot {
            sequence: self.sequence,
            obligation,
            deposits: state.deposit_reserves().collect(),
            borrows: state.borrow_reserves().collect(),
            state,
        })
    }

    pub fn snapshot(&self) -> Option<&PortfolioSnapshot> {
        self.snapshot.as_ref()
    }

    /// Sequence of the latest sync, 0 before the first one
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Fails if a bundle built from `sequence` would be submitted against a newer view
    pub fn ensure_current(&self, sequence: u64) -> Result<()> {
        match &self.snapshot {
            Some(snapshot) if snapshot.sequence == sequence => Ok(()),
            _ => Err(LendingClientError::StalePortfolio {
                snapshot: sequence,
                current: self.sequence,
            }),
        }
    }

    /// Forgets the snapshot once the obligation has been mutated
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }
}
