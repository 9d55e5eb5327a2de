//! Stage Progression
//!
//! Reads finished matches from the store, reports how far each stage has
//! got, and creates the next stage's matches exactly once.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::TEAMS_PER_MATCH;
use crate::core::ids::{MatchId, TeamId, TournamentId, derive_id};
use crate::scoring::state::{Match, Stage};
use crate::store::{SnapshotStore, StoreError};
use crate::tournament::bracket::{
    BracketError, PlannedMatch, plan_final, plan_group_semifinals, plan_quarterfinals,
    plan_rank_based_semifinals,
};
use crate::tournament::model::{BracketFormat, Tournament};
use crate::tournament::standings::{StandingsEntry, compute_standings};

/// Match counts for one stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    /// Stage being counted
    pub stage: Stage,
    /// Matches created for the stage
    pub scheduled: usize,
    /// Matches completed or locked
    pub completed: usize,
    /// Matches the stage needs; the scheduled count for the league
    pub expected: usize,
}

impl StageProgress {
    /// Every expected match has finished.
    pub fn is_complete(&self) -> bool {
        self.expected > 0 && self.completed >= self.expected
    }
}

/// Progress of a whole tournament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentStatus {
    /// Tournament the status describes
    pub tournament_id: TournamentId,
    /// One entry per stage of the format, in play order
    pub stages: Vec<StageProgress>,
    /// First stage of the format with no matches yet
    pub next_stage: Option<Stage>,
    /// Whether `next_stage` can be generated now
    pub can_generate_next_stage: bool,
    /// Final winner, once the final has finished
    pub champion: Option<TeamId>,
    /// Final finishing order, once the final has finished
    pub podium: Vec<TeamId>,
}

impl TournamentStatus {
    /// Progress of a single stage.
    pub fn stage(&self, stage: Stage) -> Option<&StageProgress> {
        self.stages.iter().find(|p| p.stage == stage)
    }
}

fn load_tournament(store: &dyn SnapshotStore, id: &TournamentId) -> Result<Tournament, BracketError> {
    store
        .load_tournament(id)?
        .ok_or(BracketError::TournamentNotFound(*id))
}

fn progress_of(format: &BracketFormat, stage: Stage, matches: &[Match]) -> StageProgress {
    let scheduled = matches.len();
    StageProgress {
        stage,
        scheduled,
        completed: matches.iter().filter(|m| m.is_finished()).count(),
        expected: format.expected_matches(stage).unwrap_or(scheduled),
    }
}

/// Stage completion counts and whether the next stage can be generated.
pub fn get_status(store: &dyn SnapshotStore, tournament_id: &TournamentId) -> Result<TournamentStatus, BracketError> {
    let tournament = load_tournament(store, tournament_id)?;
    let format = &tournament.format;

    let mut stages = Vec::new();
    let mut final_matches = Vec::new();
    for stage in format.stages() {
        let matches = store.stage_matches(tournament_id, *stage)?;
        stages.push(progress_of(format, *stage, &matches));
        if *stage == Stage::Final {
            final_matches = matches;
        }
    }

    let next_stage = stages
        .iter()
        .find(|p| p.stage != Stage::League && p.scheduled == 0)
        .map(|p| p.stage);

    let can_generate_next_stage = next_stage
        .and_then(|s| format.prerequisite(s))
        .and_then(|pre| stages.iter().find(|p| p.stage == pre))
        .is_some_and(|p| p.is_complete());

    let finished_final = final_matches.iter().find(|m| m.is_finished());
    let podium: Vec<TeamId> = finished_final
        .map(|m| m.rankings.iter().map(|r| r.team_id).collect())
        .unwrap_or_default();

    Ok(TournamentStatus {
        tournament_id: *tournament_id,
        stages,
        next_stage,
        can_generate_next_stage,
        champion: podium.first().copied(),
        podium,
    })
}

/// League table over all registered teams.
pub fn league_standings(store: &dyn SnapshotStore, tournament_id: &TournamentId) -> Result<Vec<StandingsEntry>, BracketError> {
    let tournament = load_tournament(store, tournament_id)?;
    let league = store.stage_matches(tournament_id, Stage::League)?;
    Ok(compute_standings(&league, tournament.teams.values()))
}

/// Per-group tables for a group-based tournament. Empty for rank-based.
pub fn group_standings(
    store: &dyn SnapshotStore,
    tournament_id: &TournamentId,
) -> Result<BTreeMap<String, Vec<StandingsEntry>>, BracketError> {
    let tournament = load_tournament(store, tournament_id)?;
    let league = store.stage_matches(tournament_id, Stage::League)?;
    Ok(tables_by_group(&tournament, &league))
}

fn tables_by_group(tournament: &Tournament, league: &[Match]) -> BTreeMap<String, Vec<StandingsEntry>> {
    let BracketFormat::GroupBased { groups } = &tournament.format else {
        return BTreeMap::new();
    };

    groups
        .iter()
        .map(|(label, members)| {
            let teams = members.iter().filter_map(|id| tournament.teams.get(id));
            (label.clone(), compute_standings(league, teams))
        })
        .collect()
}

/// Id of a bracket match. Same tournament, stage and slot give the same id.
pub fn bracket_match_id(tournament_id: &TournamentId, stage: Stage, slot: u8) -> MatchId {
    MatchId::new(derive_id(
        b"quad-cricket-bracket:",
        &[tournament_id.as_bytes(), &[stage as u8], &[slot]],
    ))
}

/// Create the matches of `target`.
///
/// Fails with `StageAlreadyExists` if the stage has any match, and with
/// `PrerequisiteIncomplete` if the previous stage has not finished. The
/// store's atomic create backs up the existence check.
pub fn generate_stage(
    store: &dyn SnapshotStore,
    tournament_id: &TournamentId,
    target: Stage,
) -> Result<Vec<Match>, BracketError> {
    let tournament = load_tournament(store, tournament_id)?;
    let format = &tournament.format;

    if target == Stage::League || !format.has_stage(target) {
        return Err(BracketError::StageNotInFormat(target));
    }
    if !store.stage_matches(tournament_id, target)?.is_empty() {
        return Err(BracketError::StageAlreadyExists(target));
    }

    let prerequisite = format
        .prerequisite(target)
        .ok_or(BracketError::StageNotInFormat(target))?;
    let prior = store.stage_matches(tournament_id, prerequisite)?;
    let progress = progress_of(format, prerequisite, &prior);
    if !progress.is_complete() {
        return Err(BracketError::PrerequisiteIncomplete {
            stage: target,
            prerequisite,
            completed: progress.completed,
            expected: progress.expected,
        });
    }

    let plan = match (target, format) {
        (Stage::Quarterfinal, BracketFormat::RankBased) => {
            plan_quarterfinals(&compute_standings(&prior, tournament.teams.values()))?
        }
        (Stage::Semifinal, BracketFormat::RankBased) => {
            let league = store.stage_matches(tournament_id, Stage::League)?;
            let table = compute_standings(&league, tournament.teams.values());
            plan_rank_based_semifinals(&table, &prior)?
        }
        (Stage::Semifinal, BracketFormat::GroupBased { .. }) => {
            plan_group_semifinals(&tables_by_group(&tournament, &prior))?
        }
        (Stage::Final, _) => plan_final(&prior)?,
        _ => return Err(BracketError::StageNotInFormat(target)),
    };

    let matches: Vec<Match> = plan
        .iter()
        .map(|p| planned_to_match(tournament_id, p))
        .collect();

    match store.create_stage_matches(tournament_id, target, &matches) {
        Ok(()) => {}
        Err(StoreError::StageExists(stage)) => {
            warn!(tournament = %tournament_id.short(), ?stage, "stage created concurrently");
            return Err(BracketError::StageAlreadyExists(stage));
        }
        Err(e) => return Err(e.into()),
    }

    info!(
        tournament = %tournament_id.short(),
        stage = target.label(),
        matches = matches.len(),
        "stage generated"
    );
    Ok(matches)
}

fn planned_to_match(tournament_id: &TournamentId, planned: &PlannedMatch) -> Match {
    Match::new(
        bracket_match_id(tournament_id, planned.stage, planned.slot),
        planned.team_ids,
        planned.stage,
    )
    .in_tournament(*tournament_id, planned.slot, None)
}

/// Generate the first stage that has no matches yet, the same stage
/// `get_status` reports as `next_stage`.
///
/// An unfinished prerequisite surfaces as `PrerequisiteIncomplete` for that
/// stage. Once every stage exists it fails with `StageAlreadyExists(Final)`
/// while the final is being played and `TournamentFinished` afterwards.
pub fn generate_next_stage(store: &dyn SnapshotStore, tournament_id: &TournamentId) -> Result<Vec<Match>, BracketError> {
    let status = get_status(store, tournament_id)?;
    if status.champion.is_some() {
        return Err(BracketError::TournamentFinished);
    }

    let target = status
        .next_stage
        .ok_or(BracketError::StageAlreadyExists(Stage::Final))?;
    generate_stage(store, tournament_id, target)
}

/// Schedule a league match between four registered teams.
///
/// The match gets the next free league slot and a group label when all
/// four teams share a group. Closed once any knockout stage exists.
pub fn schedule_league_match(
    store: &dyn SnapshotStore,
    tournament_id: &TournamentId,
    team_ids: [TeamId; TEAMS_PER_MATCH],
) -> Result<Match, BracketError> {
    let tournament = load_tournament(store, tournament_id)?;

    let distinct: BTreeSet<TeamId> = team_ids.iter().copied().collect();
    if distinct.len() != TEAMS_PER_MATCH {
        return Err(BracketError::InvalidSchedule("league match needs four distinct teams".into()));
    }
    if let Some(unknown) = team_ids.iter().find(|t| !tournament.teams.contains_key(t)) {
        return Err(BracketError::InvalidSchedule(format!("team {} is not registered", unknown.short())));
    }
    if let Some(short) = team_ids
        .iter()
        .filter_map(|t| tournament.teams.get(t))
        .find(|t| t.players.len() < 2)
    {
        return Err(BracketError::InvalidSchedule(format!("team {} has fewer than 2 players", short.name)));
    }

    for stage in tournament.format.stages().iter().filter(|s| **s != Stage::League) {
        if !store.stage_matches(tournament_id, *stage)?.is_empty() {
            return Err(BracketError::InvalidSchedule("league is closed once knockouts exist".into()));
        }
    }

    let existing = store.stage_matches(tournament_id, Stage::League)?;
    let slot = u8::try_from(existing.len())
        .map_err(|_| BracketError::InvalidSchedule("league slots exhausted".into()))?;

    let groups: BTreeSet<Option<&str>> = team_ids.iter().map(|t| tournament.group_of(t)).collect();
    let group = match groups.into_iter().collect::<Vec<_>>().as_slice() {
        [Some(label)] => Some(label.to_string()),
        _ => None,
    };

    let id = MatchId::new(derive_id(b"quad-cricket-league:", &[tournament_id.as_bytes(), &[slot]]));
    let scheduled = Match::new(id, team_ids, Stage::League).in_tournament(*tournament_id, slot, group);
    store.save_match(&scheduled)?;

    info!(tournament = %tournament_id.short(), slot, "league match scheduled");
    Ok(scheduled)
}
