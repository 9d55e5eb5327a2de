//! Core deterministic primitives.
//!
//! Typed ids, snapshot hashing and a seeded RNG. Nothing here knows about
//! cricket rules.

pub mod ids;
pub mod hash;
pub mod rng;

// Re-export core types
pub use ids::{TeamId, PlayerId, MatchId, InningsId, TournamentId, derive_id};
pub use hash::{SnapshotHash, SnapshotHasher, compute_snapshot_hash};
pub use rng::DeterministicRng;
