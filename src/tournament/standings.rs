//! Standings
//!
//! Aggregates match rankings into a table. Always rebuilt from the full set
//! of finished matches.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::ids::TeamId;
use crate::scoring::state::Match;
use crate::tournament::model::Team;

/// One row of a standings table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsEntry {
    /// Team id
    pub team_id: TeamId,
    /// Display name, used as a tie-break
    pub team_name: String,
    /// Finished matches the team appeared in
    pub matches_played: u32,
    /// Points from match ranks
    pub points: u32,
    /// Runs excluding no-wicket bonuses
    pub total_runs: i64,
    /// Dismissals credited while fielding
    pub total_dismissals: u32,
    /// 1-based position in the table
    pub rank: u32,
}

impl StandingsEntry {
    fn empty(team: &Team) -> Self {
        Self {
            team_id: team.id,
            team_name: team.name.clone(),
            matches_played: 0,
            points: 0,
            total_runs: 0,
            total_dismissals: 0,
            rank: 0,
        }
    }
}

/// Table order: points desc, runs desc, name asc, then team id.
pub fn compare_entries(a: &StandingsEntry, b: &StandingsEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then(b.total_runs.cmp(&a.total_runs))
        .then(a.team_name.cmp(&b.team_name))
        .then(a.team_id.cmp(&b.team_id))
}

/// Build a standings table for `teams` from `matches`.
///
/// Only completed or locked matches count. Every listed team gets a row,
/// played or not; results for teams outside the list are ignored.
pub fn compute_standings<'a, M, T>(matches: M, teams: T) -> Vec<StandingsEntry>
where
    M: IntoIterator<Item = &'a Match>,
    T: IntoIterator<Item = &'a Team>,
{
    let mut rows: BTreeMap<TeamId, StandingsEntry> = teams
        .into_iter()
        .map(|t| (t.id, StandingsEntry::empty(t)))
        .collect();

    for m in matches.into_iter().filter(|m| m.is_finished()) {
        for ranking in &m.rankings {
            if let Some(row) = rows.get_mut(&ranking.team_id) {
                row.matches_played += 1;
                row.points += ranking.points as u32;
                row.total_runs += ranking.total_runs as i64;
                row.total_dismissals += ranking.dismissals;
            }
        }
    }

    let mut table: Vec<StandingsEntry> = rows.into_values().collect();
    table.sort_by(compare_entries);
    for (i, row) in table.iter_mut().enumerate() {
        row.rank = (i + 1) as u32;
    }
    table
}

/// Team at 1-based `rank`.
pub fn team_at(table: &[StandingsEntry], rank: u32) -> Option<TeamId> {
    table.iter().find(|e| e.rank == rank).map(|e| e.team_id)
}
