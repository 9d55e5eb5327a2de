//! Scoring Module
//!
//! Everything that happens inside a single match. Pure and deterministic:
//! reducers take a snapshot and return the next one.
//!
//! ## Module Structure
//!
//! - `state`: Ball, over, innings and match records
//! - `rules`: Effective runs, third-ball hook, totals recomputation
//! - `rotation`: Which team bowls which over
//! - `ranking`: Match ranks and place points
//! - `engine`: Lifecycle state machine and action replay
//! - `events`: Events emitted by transitions
//! - `sim`: Seeded match simulation

pub mod state;
pub mod rules;
pub mod rotation;
pub mod ranking;
pub mod engine;
pub mod events;
pub mod sim;

// Re-export key types
pub use state::{
    Ball, BallInput, CreditTarget, Innings, InningsState, InningsTotals, Match, MatchPhase,
    MatchRanking, Over, Stage, WicketType,
};
pub use rules::{RulesConfig, ScoringRules, ThirdBallRule, NoThirdBallRule};
pub use engine::{EngineError, LoggedAction, MatchAction, Transition, reduce, replay};
pub use events::{MatchEvent, MatchEventData};
pub use sim::{Simulator, SimulatedMatch, simulate_match};
