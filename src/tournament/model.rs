//! Tournament Records
//!
//! Teams, rosters and the bracket format chosen for a tournament.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};

use crate::TEAMS_PER_MATCH;
use crate::core::ids::{PlayerId, TeamId, TournamentId};
use crate::scoring::state::Stage;
use crate::tournament::bracket::BracketError;

/// Number of groups in a group-based tournament.
pub const GROUP_COUNT: usize = 4;

/// Teams advancing from each group.
pub const QUALIFIERS_PER_GROUP: usize = 2;

/// League ranks needed to fill both quarterfinals (5 through 12).
pub const RANK_BASED_MIN_TEAMS: usize = 12;

/// A team and its roster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team id
    pub id: TeamId,
    /// Display name
    pub name: String,
    /// Registered players, in batting preference order
    pub players: Vec<PlayerId>,
}

impl Team {
    /// Create a team.
    pub fn new(id: TeamId, name: impl Into<String>, players: Vec<PlayerId>) -> Self {
        Self { id, name: name.into(), players }
    }
}

/// How teams progress out of the league.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BracketFormat {
    /// League ranks 1-4 go straight to the semifinals; ranks 5-12 play two
    /// quarterfinals for the remaining four places.
    RankBased,
    /// Top two of each of four groups meet in two semifinals.
    GroupBased {
        /// Group label -> member teams. Labels sort into bracket order.
        groups: BTreeMap<String, Vec<TeamId>>,
    },
}

impl BracketFormat {
    /// Stages in play order.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            BracketFormat::RankBased => &[Stage::League, Stage::Quarterfinal, Stage::Semifinal, Stage::Final],
            BracketFormat::GroupBased { .. } => &[Stage::League, Stage::Semifinal, Stage::Final],
        }
    }

    /// Whether `stage` is part of this format.
    pub fn has_stage(&self, stage: Stage) -> bool {
        self.stages().contains(&stage)
    }

    /// Stage that must be complete before `stage` can be generated.
    pub fn prerequisite(&self, stage: Stage) -> Option<Stage> {
        let stages = self.stages();
        let idx = stages.iter().position(|s| *s == stage)?;
        idx.checked_sub(1).map(|i| stages[i])
    }

    /// Stage following `stage`.
    pub fn successor(&self, stage: Stage) -> Option<Stage> {
        let stages = self.stages();
        let idx = stages.iter().position(|s| *s == stage)?;
        stages.get(idx + 1).copied()
    }

    /// Fixed match count of a bracket stage. `None` for the league, whose
    /// size is whatever was scheduled.
    pub fn expected_matches(&self, stage: Stage) -> Option<usize> {
        match stage {
            Stage::League => None,
            Stage::Quarterfinal | Stage::Semifinal => Some(2),
            Stage::Final => Some(1),
        }
    }
}

/// A tournament and its registered teams.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    /// Tournament id
    pub id: TournamentId,
    /// Display name
    pub name: String,
    /// Registered teams by id
    pub teams: BTreeMap<TeamId, Team>,
    /// Knockout layout after the league
    pub format: BracketFormat,
}

impl Tournament {
    /// Create a tournament with no teams.
    pub fn new(id: TournamentId, name: impl Into<String>, format: BracketFormat) -> Self {
        Self {
            id,
            name: name.into(),
            teams: BTreeMap::new(),
            format,
        }
    }

    /// Register a team.
    pub fn with_team(mut self, team: Team) -> Self {
        self.teams.insert(team.id, team);
        self
    }

    /// Team display name, or its short id if unknown.
    pub fn team_name(&self, id: &TeamId) -> String {
        self.teams
            .get(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| id.short())
    }

    /// Group containing `team`, for group-based formats.
    pub fn group_of(&self, team: &TeamId) -> Option<&str> {
        match &self.format {
            BracketFormat::GroupBased { groups } => groups
                .iter()
                .find(|(_, members)| members.contains(team))
                .map(|(label, _)| label.as_str()),
            BracketFormat::RankBased => None,
        }
    }

    /// Lineups for a match, taken from the registered rosters.
    pub fn lineups_for(&self, team_ids: &[TeamId; TEAMS_PER_MATCH]) -> BTreeMap<TeamId, Vec<PlayerId>> {
        team_ids
            .iter()
            .filter_map(|id| self.teams.get(id).map(|t| (*id, t.players.clone())))
            .collect()
    }

    /// Check the team list and format are usable.
    pub fn validate(&self) -> Result<(), BracketError> {
        if self.teams.len() < TEAMS_PER_MATCH {
            return Err(BracketError::InvalidSchedule(format!(
                "tournament needs at least {} teams, has {}",
                TEAMS_PER_MATCH,
                self.teams.len()
            )));
        }

        if let BracketFormat::GroupBased { groups } = &self.format {
            if groups.len() != GROUP_COUNT {
                return Err(BracketError::InvalidSchedule(format!(
                    "group format needs {} groups, has {}",
                    GROUP_COUNT,
                    groups.len()
                )));
            }

            let mut seen = BTreeSet::new();
            for (label, members) in groups {
                if members.len() < QUALIFIERS_PER_GROUP {
                    return Err(BracketError::InvalidSchedule(format!(
                        "group {label} has {} teams",
                        members.len()
                    )));
                }
                for team in members {
                    if !self.teams.contains_key(team) {
                        return Err(BracketError::InvalidSchedule(format!(
                            "group {label} lists unregistered team {}",
                            team.short()
                        )));
                    }
                    if !seen.insert(*team) {
                        return Err(BracketError::InvalidSchedule(format!(
                            "team {} appears in more than one group",
                            team.short()
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
