//! Tournament Module
//!
//! Everything above a single match: standings, bracket slotting and stage
//! generation.
//!
//! ## Module Structure
//!
//! - `model`: Tournament, team and bracket format records
//! - `standings`: Standings tables rebuilt from finished matches
//! - `bracket`: Pure slotting of teams into knockout matches
//! - `progression`: Stage status, generation and league scheduling

pub mod model;
pub mod standings;
pub mod bracket;
pub mod progression;

pub use model::{BracketFormat, Team, Tournament};
pub use standings::{StandingsEntry, compute_standings};
pub use bracket::{BracketError, PlannedMatch};
pub use progression::{
    StageProgress, TournamentStatus, generate_next_stage, generate_stage, get_status,
    group_standings, league_standings, schedule_league_match,
};
