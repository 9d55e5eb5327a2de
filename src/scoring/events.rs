//! Match Events
//!
//! Emitted by every state transition, for subscribers and audit logs.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::ids::{MatchId, TeamId};
use crate::scoring::state::{MatchRanking, WicketType};

/// Event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchEventData {
    /// Lineups confirmed
    Ready,

    /// Batting order fixed and innings created
    TossCompleted {
        /// Teams in batting order
        batting_order: Vec<TeamId>,
    },

    /// First innings under way
    MatchStarted,

    /// An innings moved to in progress
    InningsStarted {
        /// Innings index, from 0
        innings: u8,
        /// Batting team
        team_id: TeamId,
    },

    /// Bowler/keeper changed for an over
    OverCrewAssigned {
        /// Innings index, from 0
        innings: u8,
        /// Over index within the innings, from 0
        over: u8,
    },

    /// Powerplay over chosen
    PowerplaySelected {
        /// Innings index, from 0
        innings: u8,
        /// Over index within the innings, from 0
        over: u8,
    },

    /// Ball appended
    BallRecorded {
        /// Innings index, from 0
        innings: u8,
        /// Over index within the innings, from 0
        over: u8,
        /// Effective runs of the ball
        effective_runs: i32,
        /// Dismissal, if the ball took a wicket
        wicket: Option<WicketType>,
        /// Innings runs after the change
        total_runs: i32,
        /// Innings score including any no-wicket bonus
        final_score: i32,
    },

    /// Third-ball rule forced the ball into a wicket
    ThirdBallViolation {
        /// Innings index, from 0
        innings: u8,
        /// Over index within the innings, from 0
        over: u8,
        /// Effective runs charged for the violation
        penalty: i32,
    },

    /// Last ball removed
    BallUndone {
        /// Innings index, from 0
        innings: u8,
        /// Over index within the innings, from 0
        over: u8,
        /// Effective runs of the ball
        effective_runs: i32,
        /// Innings runs after the change
        total_runs: i32,
    },

    /// Extra delivery granted
    ReballGranted {
        /// Innings index, from 0
        innings: u8,
        /// Reballs left in the innings
        remaining: u8,
    },

    /// Over reached its cap
    OverCompleted {
        /// Innings index, from 0
        innings: u8,
        /// Over index within the innings, from 0
        over: u8,
        /// Effective runs scored in the over
        runs: i32,
    },

    /// Innings finished
    InningsCompleted {
        /// Innings index, from 0
        innings: u8,
        /// Batting team
        team_id: TeamId,
        /// Innings score including any no-wicket bonus
        final_score: i32,
    },

    /// All innings finished and rankings attached
    MatchCompleted {
        /// Final ranking, best first
        rankings: Vec<MatchRanking>,
    },

    /// Results frozen
    MatchLocked,
}

/// A match event with timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Match the event belongs to
    pub match_id: MatchId,
    /// When the transition was applied
    pub at: DateTime<Utc>,
    /// What happened
    pub data: MatchEventData,
}

impl MatchEvent {
    /// Create a new event.
    pub fn new(match_id: MatchId, at: DateTime<Utc>, data: MatchEventData) -> Self {
        Self { match_id, at, data }
    }

    /// Whether this event ends the match.
    pub fn is_match_completed(&self) -> bool {
        matches!(self.data, MatchEventData::MatchCompleted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = MatchEvent::new(
            MatchId::new([1; 16]),
            Utc::now(),
            MatchEventData::PowerplaySelected { innings: 0, over: 2 },
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("PowerplaySelected"));

        let back: MatchEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert!(!back.is_match_completed());
    }
}
