//! Snapshot Store
//!
//! The persistence boundary. The engine hands complete snapshots over and
//! reads them back; how they are kept is the store's business.
//!
//! - `memory`: in-process reference store (bincode-encoded records)

pub mod memory;

pub use memory::MemoryStore;

use crate::core::ids::{MatchId, TournamentId};
use crate::scoring::state::{Match, Stage};
use crate::tournament::model::Tournament;

/// Store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend did not answer in time.
    #[error("store operation timed out")]
    Timeout,

    /// Backend aborted the transaction.
    #[error("store transaction aborted")]
    Aborted,

    /// Matches already exist for the stage.
    #[error("matches already exist for stage {0:?}")]
    StageExists(Stage),

    /// Record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout | StoreError::Aborted)
    }
}

/// Result of a snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Snapshot stored.
    Written,
    /// Identical snapshot already stored; nothing written.
    Unchanged,
}

/// Key/record store for tournaments and match snapshots.
///
/// Reads of unknown ids return `Ok(None)`, not an error.
pub trait SnapshotStore: Send + Sync {
    /// Load a tournament record.
    fn load_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, StoreError>;

    /// Insert or replace a tournament record.
    fn save_tournament(&self, tournament: &Tournament) -> Result<(), StoreError>;

    /// Load a match snapshot.
    fn load_match(&self, id: &MatchId) -> Result<Option<Match>, StoreError>;

    /// Insert or replace a match snapshot.
    ///
    /// Writing a snapshot identical to the stored one is a no-op, so
    /// at-least-once delivery is safe.
    fn save_match(&self, snapshot: &Match) -> Result<SaveOutcome, StoreError>;

    /// Matches of one tournament stage, ordered by slot.
    fn stage_matches(&self, tournament_id: &TournamentId, stage: Stage) -> Result<Vec<Match>, StoreError>;

    /// Create all matches of a stage in one step.
    ///
    /// Fails with `StageExists` and writes nothing if any match already
    /// exists for `(tournament_id, stage)`.
    fn create_stage_matches(
        &self,
        tournament_id: &TournamentId,
        stage: Stage,
        matches: &[Match],
    ) -> Result<(), StoreError>;
}
