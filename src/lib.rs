//! # Quad Cricket
//!
//! Scoring engine and tournament bracket for four-team cricket: four teams
//! bat in turn within one match, each innings bowled by the other three.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       QUAD CRICKET                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── ids.rs      - Typed 16-byte identifiers                 │
//! │  ├── hash.rs     - Snapshot hashing                          │
//! │  └── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │                                                              │
//! │  scoring/        - Single match (pure, deterministic)        │
//! │  ├── state.rs    - Ball / over / innings / match records     │
//! │  ├── rules.rs    - Effective runs, third-ball rule, totals   │
//! │  ├── rotation.rs - Bowling rotation                          │
//! │  ├── engine.rs   - Lifecycle reducers and replay             │
//! │  ├── ranking.rs  - Match ranks and points                    │
//! │  ├── events.rs   - Transition events                         │
//! │  └── sim.rs      - Seeded match simulation                   │
//! │                                                              │
//! │  tournament/     - Standings and bracket (pure over store)   │
//! │  ├── model.rs    - Tournament, teams, bracket format         │
//! │  ├── standings.rs- Standings tables                          │
//! │  ├── bracket.rs  - Knockout slotting                         │
//! │  └── progression.rs - Stage status and generation            │
//! │                                                              │
//! │  store/          - Snapshot persistence boundary             │
//! │  service/        - Sessions, retry, event broadcast (async)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `scoring/` and `tournament/` never read the clock or a random source:
//! - Timestamps are passed in by the caller
//! - BTreeMap everywhere for sorted iteration
//! - Totals are recomputed from the full ball sequence on every mutation
//! - Bracket match ids are derived from (tournament, stage, slot)
//!
//! Replaying an action log from the same initial snapshot reproduces the
//! same snapshot hash.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod scoring;
pub mod tournament;
pub mod store;
pub mod service;

// Re-export commonly used types
pub use core::ids::{InningsId, MatchId, PlayerId, TeamId, TournamentId};
pub use core::rng::DeterministicRng;
pub use scoring::{
    BallInput, EngineError, Match, MatchAction, MatchPhase, RulesConfig, ScoringRules, Stage,
    WicketType,
};
pub use tournament::{BracketError, BracketFormat, StandingsEntry, Team, Tournament};
pub use store::{MemoryStore, SnapshotStore, StoreError};
pub use service::{MatchSession, RetryPolicy, SessionError, SessionManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Teams in every match
pub const TEAMS_PER_MATCH: usize = 4;

/// Overs in every innings
pub const OVERS_PER_INNINGS: usize = 3;

/// Place points by rank (1st..4th)
pub const POINTS_BY_RANK: [u8; TEAMS_PER_MATCH] = [5, 3, 1, 0];
