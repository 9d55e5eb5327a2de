//! Session Manager
//!
//! Owns open match sessions and serializes tournament-level operations.
//! Matches are independent; stage generation and league scheduling for a
//! tournament run one at a time.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument};

use crate::TEAMS_PER_MATCH;
use crate::core::ids::{MatchId, TeamId, TournamentId};
use crate::scoring::rules::ScoringRules;
use crate::scoring::state::Match;
use crate::service::retry::{RetryPolicy, retry_transient};
use crate::service::session::{MatchSession, SessionError};
use crate::store::SnapshotStore;
use crate::tournament::model::Tournament;
use crate::tournament::progression::{self, TournamentStatus};
use crate::tournament::standings::StandingsEntry;

/// Shared handle to an open session.
pub type SessionHandle = Arc<RwLock<MatchSession>>;

/// Manages all open sessions.
pub struct SessionManager {
    store: Arc<dyn SnapshotStore>,
    rules: Arc<ScoringRules>,
    retry: RetryPolicy,
    /// Open sessions by match.
    sessions: RwLock<BTreeMap<MatchId, SessionHandle>>,
    /// One lock per tournament for generation and scheduling.
    tournament_locks: Mutex<BTreeMap<TournamentId, Arc<Mutex<()>>>>,
}

impl SessionManager {
    /// Create a manager over a store.
    pub fn new(store: Arc<dyn SnapshotStore>, rules: ScoringRules, retry: RetryPolicy) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
            retry,
            sessions: RwLock::new(BTreeMap::new()),
            tournament_locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Active scoring rules.
    pub fn rules(&self) -> &Arc<ScoringRules> {
        &self.rules
    }

    /// Open (or return the already open) session for a match.
    pub async fn open_session(&self, match_id: MatchId) -> Result<SessionHandle, SessionError> {
        if let Some(existing) = self.get_session(&match_id).await {
            return Ok(existing);
        }

        let session = MatchSession::load(
            match_id,
            Arc::clone(&self.rules),
            Arc::clone(&self.store),
            self.retry.clone(),
        )
        .await?;

        let mut sessions = self.sessions.write().await;
        // Another caller may have opened it while we were loading
        let handle = sessions
            .entry(match_id)
            .or_insert_with(|| Arc::new(RwLock::new(session)))
            .clone();
        Ok(handle)
    }

    /// Get an open session.
    pub async fn get_session(&self, match_id: &MatchId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(match_id).cloned()
    }

    /// Flush and close a session.
    pub async fn close_session(&self, match_id: &MatchId) -> Result<(), SessionError> {
        let Some(handle) = self.get_session(match_id).await else {
            return Ok(());
        };
        handle.write().await.flush().await?;

        let mut sessions = self.sessions.write().await;
        sessions.remove(match_id);
        Ok(())
    }

    /// Number of open sessions.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Drop sessions whose match has finished and been persisted.
    pub async fn cleanup(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut to_remove = Vec::new();

        for (id, handle) in sessions.iter() {
            let session = handle.read().await;
            if session.snapshot().is_finished() && !session.is_dirty() {
                to_remove.push(*id);
            }
        }

        for id in &to_remove {
            sessions.remove(id);
        }
        to_remove.len()
    }

    async fn tournament_lock(&self, tournament_id: &TournamentId) -> Arc<Mutex<()>> {
        let mut locks = self.tournament_locks.lock().await;
        Arc::clone(locks.entry(*tournament_id).or_default())
    }

    /// Validate and store a tournament.
    #[instrument(skip_all, fields(tournament = %tournament.id.short()))]
    pub async fn register_tournament(&self, tournament: Tournament) -> Result<(), SessionError> {
        tournament.validate()?;
        let store = Arc::clone(&self.store);
        let record = &tournament;
        retry_transient(&self.retry, "save tournament", || {
            let store = Arc::clone(&store);
            async move { store.save_tournament(record) }
        })
        .await?;

        info!(name = %tournament.name, teams = tournament.teams.len(), "tournament registered");
        Ok(())
    }

    /// Load a tournament record.
    pub async fn tournament(&self, tournament_id: &TournamentId) -> Result<Option<Tournament>, SessionError> {
        let store = Arc::clone(&self.store);
        let id = *tournament_id;
        let found = retry_transient(&self.retry, "load tournament", || {
            let store = Arc::clone(&store);
            async move { store.load_tournament(&id) }
        })
        .await?;
        Ok(found)
    }

    /// Schedule a league match.
    #[instrument(skip_all, fields(tournament = %tournament_id.short()))]
    pub async fn schedule_league_match(
        &self,
        tournament_id: &TournamentId,
        team_ids: [TeamId; TEAMS_PER_MATCH],
    ) -> Result<Match, SessionError> {
        let lock = self.tournament_lock(tournament_id).await;
        let _guard = lock.lock().await;

        let store = Arc::clone(&self.store);
        let scheduled = retry_transient(&self.retry, "schedule league match", || {
            let store = Arc::clone(&store);
            async move { progression::schedule_league_match(store.as_ref(), tournament_id, team_ids) }
        })
        .await?;
        Ok(scheduled)
    }

    /// Stage counts and next-stage readiness.
    pub async fn tournament_status(&self, tournament_id: &TournamentId) -> Result<TournamentStatus, SessionError> {
        Ok(progression::get_status(self.store.as_ref(), tournament_id)?)
    }

    /// League table.
    pub async fn league_standings(&self, tournament_id: &TournamentId) -> Result<Vec<StandingsEntry>, SessionError> {
        Ok(progression::league_standings(self.store.as_ref(), tournament_id)?)
    }

    /// Group tables.
    pub async fn group_standings(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<BTreeMap<String, Vec<StandingsEntry>>, SessionError> {
        Ok(progression::group_standings(self.store.as_ref(), tournament_id)?)
    }

    /// Generate the next stage. Serialized per tournament; transient store
    /// failures are retried.
    #[instrument(skip_all, fields(tournament = %tournament_id.short()))]
    pub async fn generate_next_stage(&self, tournament_id: &TournamentId) -> Result<Vec<Match>, SessionError> {
        let lock = self.tournament_lock(tournament_id).await;
        let _guard = lock.lock().await;

        let store = Arc::clone(&self.store);
        let created = retry_transient(&self.retry, "generate stage", || {
            let store = Arc::clone(&store);
            async move { progression::generate_next_stage(store.as_ref(), tournament_id) }
        })
        .await?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::PlayerId;
    use crate::scoring::state::{MatchPhase, MatchRanking, Stage};
    use crate::store::MemoryStore;
    use crate::tournament::bracket::BracketError;
    use crate::tournament::model::{BracketFormat, Team};

    fn manager() -> (Arc<MemoryStore>, SessionManager) {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn SnapshotStore> = store.clone();
        (store, SessionManager::new(dyn_store, ScoringRules::default(), RetryPolicy::immediate(3)))
    }

    fn tournament(teams: u8) -> Tournament {
        let mut t = Tournament::new(TournamentId::new([8; 16]), "Manager Cup", BracketFormat::RankBased);
        for n in 1..=teams {
            t = t.with_team(Team::new(
                TeamId::new([n; 16]),
                format!("Team {n}"),
                vec![PlayerId::new([n; 16]), PlayerId::new([n + 50; 16])],
            ));
        }
        t
    }

    #[tokio::test]
    async fn test_register_rejects_too_few_teams() {
        let (_, manager) = manager();
        let err = manager.register_tournament(tournament(3)).await.unwrap_err();
        assert!(matches!(err, SessionError::Bracket(BracketError::InvalidSchedule(_))));
    }

    #[tokio::test]
    async fn test_open_session_is_shared() {
        let (_, manager) = manager();
        let t = tournament(4);
        let tid = t.id;
        manager.register_tournament(t).await.unwrap();
        let teams = [1u8, 2, 3, 4].map(|n| TeamId::new([n; 16]));
        let m = manager.schedule_league_match(&tid, teams).await.unwrap();

        let a = manager.open_session(m.id).await.unwrap();
        let b = manager.open_session(m.id).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.session_count().await, 1);

        manager.close_session(&m.id).await.unwrap();
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_open_unknown_match() {
        let (_, manager) = manager();
        let result = manager.open_session(MatchId::new([77; 16])).await;
        assert!(matches!(result, Err(SessionError::MatchNotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_generation_creates_stage_once() {
        let (store, manager) = manager();
        let t = tournament(12);
        let tid = t.id;
        manager.register_tournament(t).await.unwrap();

        for chunk in [[1u8, 2, 3, 4], [5, 6, 7, 8], [9, 10, 11, 12]] {
            let m = manager.schedule_league_match(&tid, chunk.map(|n| TeamId::new([n; 16]))).await.unwrap();
            let mut done = m.clone();
            done.state = MatchPhase::Completed;
            for (i, team) in m.team_ids.iter().enumerate() {
                done.rankings.push(MatchRanking {
                    team_id: *team,
                    rank: (i + 1) as u8,
                    points: [5, 3, 1, 0][i],
                    total_runs: 0,
                    final_score: 0,
                    dismissals: 0,
                });
            }
            store.save_match(&done).unwrap();
        }

        let manager = Arc::new(manager);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.generate_next_stage(&tid).await })
            })
            .collect();

        let mut created = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(matches) => created += matches.len(),
                // Later callers see the quarterfinals and move on to the semifinals
                Err(SessionError::Bracket(
                    BracketError::StageAlreadyExists(Stage::Quarterfinal)
                    | BracketError::PrerequisiteIncomplete { stage: Stage::Semifinal, .. },
                )) => already += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(created, 2);
        assert_eq!(already, 3);
    }
}
