//! Match Session
//!
//! Single writer for one match. Applies reducers to the in-memory snapshot,
//! broadcasts the resulting events and persists the new snapshot with
//! retry. A failed write leaves the session dirty; the next mutation or an
//! explicit `flush` tries again.

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::TEAMS_PER_MATCH;
use crate::core::ids::{MatchId, PlayerId, TeamId};
use crate::scoring::engine::{EngineError, LoggedAction, MatchAction, can_record, reduce};
use crate::scoring::events::MatchEvent;
use crate::scoring::rules::ScoringRules;
use crate::scoring::state::{BallInput, Match};
use crate::service::retry::{RetryPolicy, retry_transient};
use crate::store::{SnapshotStore, StoreError};
use crate::tournament::bracket::BracketError;

/// Event channel capacity per session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Service-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Rejected by the state machine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Store failure after retries.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stage generation failure.
    #[error(transparent)]
    Bracket(#[from] BracketError),

    /// No stored match with this id.
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
}

/// A live scoring session for one match.
pub struct MatchSession {
    snapshot: Match,
    /// Actions applied since the session opened
    log: Vec<LoggedAction>,
    rules: Arc<ScoringRules>,
    store: Arc<dyn SnapshotStore>,
    retry: RetryPolicy,
    event_tx: broadcast::Sender<MatchEvent>,
    /// Snapshot changed but not yet persisted
    dirty: bool,
}

impl MatchSession {
    /// Wrap an already loaded snapshot.
    pub fn new(snapshot: Match, rules: Arc<ScoringRules>, store: Arc<dyn SnapshotStore>, retry: RetryPolicy) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            snapshot,
            log: Vec::new(),
            rules,
            store,
            retry,
            event_tx,
            dirty: false,
        }
    }

    /// Load a match from the store and open a session on it.
    pub async fn load(
        match_id: MatchId,
        rules: Arc<ScoringRules>,
        store: Arc<dyn SnapshotStore>,
        retry: RetryPolicy,
    ) -> Result<Self, SessionError> {
        let loaded = retry_transient(&retry, "load match", || {
            let store = Arc::clone(&store);
            async move { store.load_match(&match_id) }
        })
        .await?;

        let snapshot = loaded.ok_or(SessionError::MatchNotFound(match_id))?;
        Ok(Self::new(snapshot, rules, store, retry))
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> &Match {
        &self.snapshot
    }

    /// Actions applied in this session.
    pub fn log(&self) -> &[LoggedAction] {
        &self.log
    }

    /// Subscribe to events from future mutations.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.event_tx.subscribe()
    }

    /// Whether a ball can be recorded right now.
    pub fn can_record(&self) -> bool {
        can_record(&self.snapshot, &self.rules)
    }

    /// Snapshot has changes the store has not accepted yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply an action, notify subscribers and persist.
    ///
    /// The snapshot only changes if the reducer accepts the action. If the
    /// write then fails the new snapshot is kept and the error returned.
    #[instrument(skip_all, fields(match_id = %self.snapshot.id.short(), action = action.name()))]
    pub async fn apply(&mut self, action: MatchAction) -> Result<Vec<MatchEvent>, SessionError> {
        let at = Utc::now();
        let transition = reduce(&self.snapshot, &action, &self.rules, at)?;
        let completed = transition.completed_match();

        self.snapshot = transition.snapshot;
        self.log.push(LoggedAction { at, action });
        self.dirty = true;

        for event in &transition.events {
            // No subscribers is fine
            let _ = self.event_tx.send(event.clone());
        }
        debug!(events = transition.events.len(), "action applied");

        self.flush().await?;

        if completed {
            info!(
                winner = %self.snapshot.team_at_rank(1).map(|t| t.short()).unwrap_or_default(),
                "match result persisted"
            );
        }
        Ok(transition.events)
    }

    /// Persist the snapshot if it has unsaved changes.
    pub async fn flush(&mut self) -> Result<(), SessionError> {
        if !self.dirty {
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        let snapshot = &self.snapshot;
        retry_transient(&self.retry, "save match", || {
            let store = Arc::clone(&store);
            async move { store.save_match(snapshot) }
        })
        .await?;

        self.dirty = false;
        Ok(())
    }

    /// Confirm lineups.
    pub async fn mark_ready(&mut self, lineups: BTreeMap<TeamId, Vec<PlayerId>>) -> Result<Vec<MatchEvent>, SessionError> {
        self.apply(MatchAction::MarkReady { lineups }).await
    }

    /// Fix the batting order.
    pub async fn toss(&mut self, batting_order: [TeamId; TEAMS_PER_MATCH]) -> Result<Vec<MatchEvent>, SessionError> {
        self.apply(MatchAction::Toss { batting_order }).await
    }

    /// Start the first innings.
    pub async fn start(&mut self) -> Result<Vec<MatchEvent>, SessionError> {
        self.apply(MatchAction::Start).await
    }

    /// Choose the powerplay over of the current innings.
    pub async fn select_powerplay(&mut self, over: u8) -> Result<Vec<MatchEvent>, SessionError> {
        self.apply(MatchAction::SelectPowerplay { over }).await
    }

    /// Record a ball.
    pub async fn record_ball(&mut self, input: BallInput) -> Result<Vec<MatchEvent>, SessionError> {
        self.apply(MatchAction::RecordBall(input)).await
    }

    /// Remove the last ball of the current over.
    pub async fn undo_last_ball(&mut self) -> Result<Vec<MatchEvent>, SessionError> {
        self.apply(MatchAction::UndoLastBall).await
    }

    /// Grant a reball.
    pub async fn use_reball(&mut self) -> Result<Vec<MatchEvent>, SessionError> {
        self.apply(MatchAction::UseReball).await
    }

    /// Freeze the result.
    pub async fn lock(&mut self) -> Result<Vec<MatchEvent>, SessionError> {
        self.apply(MatchAction::Lock).await
    }
}
