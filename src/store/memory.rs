//! In-Memory Store
//!
//! Keeps bincode-encoded records in BTreeMaps behind a single lock.
//! Supports injected transient failures for retry tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use tracing::trace;

use crate::core::hash::SnapshotHash;
use crate::core::ids::{MatchId, TournamentId};
use crate::scoring::state::{Match, Stage};
use crate::store::{SaveOutcome, SnapshotStore, StoreError};
use crate::tournament::model::Tournament;

struct StoredMatch {
    bytes: Vec<u8>,
    hash: SnapshotHash,
}

#[derive(Default)]
struct Inner {
    tournaments: BTreeMap<TournamentId, Vec<u8>>,
    matches: BTreeMap<MatchId, StoredMatch>,
    /// (tournament, stage) -> match ids
    stages: BTreeMap<(TournamentId, Stage), BTreeSet<MatchId>>,
    writes: u64,
    failing_writes: u32,
}

impl Inner {
    fn take_failure(&mut self) -> Result<(), StoreError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(StoreError::Timeout);
        }
        Ok(())
    }

    fn put_match(&mut self, snapshot: &Match) -> Result<SaveOutcome, StoreError> {
        let hash = snapshot.compute_hash();
        if self.matches.get(&snapshot.id).is_some_and(|m| m.hash == hash) {
            return Ok(SaveOutcome::Unchanged);
        }

        let bytes = encode(snapshot)?;
        self.matches.insert(snapshot.id, StoredMatch { bytes, hash });
        if let Some(tournament_id) = snapshot.tournament_id {
            self.stages
                .entry((tournament_id, snapshot.stage))
                .or_default()
                .insert(snapshot.id);
        }
        self.writes += 1;
        Ok(SaveOutcome::Written)
    }
}

/// Reference `SnapshotStore` held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with `StoreError::Timeout`.
    pub fn fail_next_writes(&self, count: u32) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failing_writes = count;
        }
    }

    /// Number of records actually written.
    pub fn write_count(&self) -> u64 {
        self.inner.read().map(|i| i.writes).unwrap_or(0)
    }

    /// Number of stored matches.
    pub fn match_count(&self) -> usize {
        self.inner.read().map(|i| i.matches.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }
}

impl SnapshotStore for MemoryStore {
    fn load_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, StoreError> {
        let inner = self.read()?;
        inner.tournaments.get(id).map(|bytes| decode(bytes)).transpose()
    }

    fn save_tournament(&self, tournament: &Tournament) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.take_failure()?;
        let bytes = encode(tournament)?;
        inner.tournaments.insert(tournament.id, bytes);
        inner.writes += 1;
        Ok(())
    }

    fn load_match(&self, id: &MatchId) -> Result<Option<Match>, StoreError> {
        let inner = self.read()?;
        inner.matches.get(id).map(|m| decode(&m.bytes)).transpose()
    }

    fn save_match(&self, snapshot: &Match) -> Result<SaveOutcome, StoreError> {
        let mut inner = self.write()?;
        inner.take_failure()?;
        let outcome = inner.put_match(snapshot)?;
        trace!(match_id = %snapshot.id.short(), ?outcome, "match saved");
        Ok(outcome)
    }

    fn stage_matches(&self, tournament_id: &TournamentId, stage: Stage) -> Result<Vec<Match>, StoreError> {
        let inner = self.read()?;
        let Some(ids) = inner.stages.get(&(*tournament_id, stage)) else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(stored) = inner.matches.get(id) {
                matches.push(decode::<Match>(&stored.bytes)?);
            }
        }
        matches.sort_by_key(|m| (m.slot, m.id));
        Ok(matches)
    }

    fn create_stage_matches(
        &self,
        tournament_id: &TournamentId,
        stage: Stage,
        matches: &[Match],
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.take_failure()?;

        // Check and insert under one write lock
        if inner.stages.get(&(*tournament_id, stage)).is_some_and(|ids| !ids.is_empty()) {
            return Err(StoreError::StageExists(stage));
        }
        if matches.iter().any(|m| m.tournament_id != Some(*tournament_id) || m.stage != stage) {
            return Err(StoreError::Backend("match does not belong to the stage being created".into()));
        }

        let mut encoded: Vec<(MatchId, Vec<u8>, SnapshotHash)> = Vec::with_capacity(matches.len());
        for m in matches {
            encoded.push((m.id, encode(m)?, m.compute_hash()));
        }

        let index = inner.stages.entry((*tournament_id, stage)).or_default();
        for (id, _, _) in &encoded {
            index.insert(*id);
        }
        for (id, bytes, hash) in encoded {
            inner.matches.insert(id, StoredMatch { bytes, hash });
            inner.writes += 1;
        }
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::TeamId;

    fn teams() -> [TeamId; 4] {
        [1u8, 2, 3, 4].map(|n| TeamId::new([n; 16]))
    }

    fn stage_match(tid: TournamentId, stage: Stage, slot: u8) -> Match {
        Match::new(MatchId::new([slot + 10; 16]), teams(), stage).in_tournament(tid, slot, None)
    }

    #[test]
    fn test_missing_records_are_none() {
        let store = MemoryStore::new();
        assert_eq!(store.load_match(&MatchId::new([1; 16])).unwrap(), None);
        assert!(store.load_tournament(&TournamentId::new([1; 16])).unwrap().is_none());
        assert!(store.stage_matches(&TournamentId::new([1; 16]), Stage::Final).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_match() {
        let store = MemoryStore::new();
        let m = Match::new(MatchId::new([1; 16]), teams(), Stage::League);

        assert_eq!(store.save_match(&m).unwrap(), SaveOutcome::Written);
        assert_eq!(store.load_match(&m.id).unwrap(), Some(m.clone()));
    }

    #[test]
    fn test_identical_save_is_skipped() {
        let store = MemoryStore::new();
        let m = Match::new(MatchId::new([1; 16]), teams(), Stage::League);

        store.save_match(&m).unwrap();
        assert_eq!(store.save_match(&m).unwrap(), SaveOutcome::Unchanged);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_create_stage_is_atomic() {
        let store = MemoryStore::new();
        let tid = TournamentId::new([5; 16]);
        let semis = vec![stage_match(tid, Stage::Semifinal, 0), stage_match(tid, Stage::Semifinal, 1)];

        store.create_stage_matches(&tid, Stage::Semifinal, &semis).unwrap();
        assert_eq!(store.stage_matches(&tid, Stage::Semifinal).unwrap().len(), 2);

        let again = vec![stage_match(tid, Stage::Semifinal, 2)];
        assert_eq!(
            store.create_stage_matches(&tid, Stage::Semifinal, &again),
            Err(StoreError::StageExists(Stage::Semifinal))
        );
        assert_eq!(store.match_count(), 2);
    }

    #[test]
    fn test_stage_matches_ordered_by_slot() {
        let store = MemoryStore::new();
        let tid = TournamentId::new([5; 16]);
        store.save_match(&stage_match(tid, Stage::League, 3)).unwrap();
        store.save_match(&stage_match(tid, Stage::League, 1)).unwrap();

        let slots: Vec<u8> = store.stage_matches(&tid, Stage::League).unwrap().iter().map(|m| m.slot).collect();
        assert_eq!(slots, vec![1, 3]);
    }

    #[test]
    fn test_injected_failures_are_transient() {
        let store = MemoryStore::new();
        let m = Match::new(MatchId::new([1; 16]), teams(), Stage::League);
        store.fail_next_writes(2);

        let err = store.save_match(&m).unwrap_err();
        assert!(err.is_transient());
        assert!(store.save_match(&m).is_err());
        assert_eq!(store.save_match(&m).unwrap(), SaveOutcome::Written);
        assert!(!StoreError::StageExists(Stage::Final).is_transient());
    }
}
