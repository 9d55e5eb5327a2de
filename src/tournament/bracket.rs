//! Bracket Planning
//!
//! Pure functions deciding which four teams meet in each knockout match.
//! Slotting depends only on standings and prior-stage rankings.
//!
//! Rank-based:
//! ```text
//! QF1 = L5  L6  L11 L12        SF1 = L1 L4 QF1#1 QF2#2
//! QF2 = L7  L8  L9  L10        SF2 = L2 L3 QF2#1 QF1#2
//! ```
//!
//! Group-based (groups A-D in label order):
//! ```text
//! SF1 = A1 B2 C1 D2
//! SF2 = B1 A2 D1 C2
//! ```
//!
//! Final = top two of each semifinal.

use std::collections::BTreeMap;

use crate::TEAMS_PER_MATCH;
use crate::core::ids::{MatchId, TeamId, TournamentId};
use crate::scoring::state::{Match, Stage};
use crate::store::StoreError;
use crate::tournament::model::{GROUP_COUNT, QUALIFIERS_PER_GROUP, RANK_BASED_MIN_TEAMS};
use crate::tournament::standings::{StandingsEntry, team_at};

/// Stage generation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BracketError {
    /// Matches already exist for the stage.
    #[error("{0:?} matches already exist")]
    StageAlreadyExists(Stage),

    /// Prior stage has unfinished matches.
    #[error("{stage:?} needs {prerequisite:?} complete ({completed}/{expected} finished)")]
    PrerequisiteIncomplete {
        /// Stage being generated
        stage: Stage,
        /// Stage that must finish first
        prerequisite: Stage,
        /// Finished matches in the prerequisite
        completed: usize,
        /// Matches the prerequisite needs
        expected: usize,
    },

    /// Not enough teams qualified.
    #[error("{stage:?} needs {required} qualified teams, found {found}")]
    InsufficientTeams {
        /// Stage being generated
        stage: Stage,
        /// Teams required
        required: usize,
        /// Teams available
        found: usize,
    },

    /// No tournament with this id.
    #[error("tournament {0} not found")]
    TournamentNotFound(TournamentId),

    /// Stage is not used by the tournament's format.
    #[error("{0:?} is not a generated stage of this tournament")]
    StageNotInFormat(Stage),

    /// Bad team list, group layout or league fixture.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A finished match has no rankings.
    #[error("match {0} has no rankings")]
    MissingRanking(MatchId),

    /// The final is complete.
    #[error("tournament is finished")]
    TournamentFinished,

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Teams for one match of a stage about to be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedMatch {
    /// Stage of the match
    pub stage: Stage,
    /// Position within the stage, from 0
    pub slot: u8,
    /// Teams in seeding order
    pub team_ids: [TeamId; TEAMS_PER_MATCH],
}

impl PlannedMatch {
    fn new(stage: Stage, slot: u8, team_ids: [TeamId; TEAMS_PER_MATCH]) -> Self {
        Self { stage, slot, team_ids }
    }
}

fn seed(table: &[StandingsEntry], rank: u32, stage: Stage, required: usize) -> Result<TeamId, BracketError> {
    team_at(table, rank).ok_or(BracketError::InsufficientTeams {
        stage,
        required,
        found: table.len(),
    })
}

/// First and second place of a finished match.
pub fn top_two(m: &Match) -> Result<(TeamId, TeamId), BracketError> {
    match (m.team_at_rank(1), m.team_at_rank(2)) {
        (Some(first), Some(second)) if m.is_finished() => Ok((first, second)),
        _ => Err(BracketError::MissingRanking(m.id)),
    }
}

fn by_slot(matches: &[Match], prerequisite: Stage, stage: Stage) -> Result<[&Match; 2], BracketError> {
    let mut ordered: Vec<&Match> = matches.iter().filter(|m| m.stage == prerequisite).collect();
    ordered.sort_by_key(|m| m.slot);
    match ordered.as_slice() {
        [first, second] => Ok([*first, *second]),
        _ => Err(BracketError::PrerequisiteIncomplete {
            stage,
            prerequisite,
            completed: ordered.iter().filter(|m| m.is_finished()).count(),
            expected: 2,
        }),
    }
}

/// Quarterfinals from the league table: ranks 5, 6, 11, 12 and 7, 8, 9, 10.
pub fn plan_quarterfinals(league: &[StandingsEntry]) -> Result<Vec<PlannedMatch>, BracketError> {
    let stage = Stage::Quarterfinal;
    if league.len() < RANK_BASED_MIN_TEAMS {
        return Err(BracketError::InsufficientTeams {
            stage,
            required: RANK_BASED_MIN_TEAMS,
            found: league.len(),
        });
    }

    let pick = |ranks: [u32; 4]| -> Result<[TeamId; 4], BracketError> {
        Ok([
            seed(league, ranks[0], stage, RANK_BASED_MIN_TEAMS)?,
            seed(league, ranks[1], stage, RANK_BASED_MIN_TEAMS)?,
            seed(league, ranks[2], stage, RANK_BASED_MIN_TEAMS)?,
            seed(league, ranks[3], stage, RANK_BASED_MIN_TEAMS)?,
        ])
    };

    Ok(vec![
        PlannedMatch::new(stage, 0, pick([5, 6, 11, 12])?),
        PlannedMatch::new(stage, 1, pick([7, 8, 9, 10])?),
    ])
}

/// Semifinals for the rank-based format.
pub fn plan_rank_based_semifinals(
    league: &[StandingsEntry],
    quarterfinals: &[Match],
) -> Result<Vec<PlannedMatch>, BracketError> {
    let stage = Stage::Semifinal;
    let [qf1, qf2] = by_slot(quarterfinals, Stage::Quarterfinal, stage)?;
    let (qf1_first, qf1_second) = top_two(qf1)?;
    let (qf2_first, qf2_second) = top_two(qf2)?;

    let r = |rank| seed(league, rank, stage, RANK_BASED_MIN_TEAMS);

    Ok(vec![
        PlannedMatch::new(stage, 0, [r(1)?, r(4)?, qf1_first, qf2_second]),
        PlannedMatch::new(stage, 1, [r(2)?, r(3)?, qf2_first, qf1_second]),
    ])
}

/// Semifinals for the group-based format.
///
/// `groups` maps each group label to its standings table. Labels are taken
/// in sorted order as groups A, B, C, D.
pub fn plan_group_semifinals(
    groups: &BTreeMap<String, Vec<StandingsEntry>>,
) -> Result<Vec<PlannedMatch>, BracketError> {
    let stage = Stage::Semifinal;
    let required = GROUP_COUNT * QUALIFIERS_PER_GROUP;

    let qualified: Vec<(TeamId, TeamId)> = groups
        .values()
        .filter_map(|table| Some((team_at(table, 1)?, team_at(table, 2)?)))
        .collect();

    if groups.len() != GROUP_COUNT || qualified.len() != GROUP_COUNT {
        return Err(BracketError::InsufficientTeams {
            stage,
            required,
            found: qualified.len() * QUALIFIERS_PER_GROUP,
        });
    }

    let (a1, a2) = qualified[0];
    let (b1, b2) = qualified[1];
    let (c1, c2) = qualified[2];
    let (d1, d2) = qualified[3];

    Ok(vec![
        PlannedMatch::new(stage, 0, [a1, b2, c1, d2]),
        PlannedMatch::new(stage, 1, [b1, a2, d1, c2]),
    ])
}

/// Final from the two semifinals.
pub fn plan_final(semifinals: &[Match]) -> Result<Vec<PlannedMatch>, BracketError> {
    let [sf1, sf2] = by_slot(semifinals, Stage::Semifinal, Stage::Final)?;
    let (sf1_first, sf1_second) = top_two(sf1)?;
    let (sf2_first, sf2_second) = top_two(sf2)?;

    Ok(vec![PlannedMatch::new(
        Stage::Final,
        0,
        [sf1_first, sf1_second, sf2_first, sf2_second],
    )])
}
