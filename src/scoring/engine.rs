//! Match State Machine
//!
//! Pure reducers: each takes the current snapshot and returns the next one
//! plus the events it produced. The input snapshot is never touched, so the
//! caller decides when to persist and whom to notify.
//!
//! ```text
//! CREATED -> READY -> TOSS -> IN_PROGRESS -> COMPLETED -> LOCKED
//! ```

use std::collections::{BTreeMap, BTreeSet};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::{OVERS_PER_INNINGS, TEAMS_PER_MATCH};
use crate::core::ids::{InningsId, PlayerId, TeamId};
use crate::scoring::events::{MatchEvent, MatchEventData};
use crate::scoring::ranking::rank;
use crate::scoring::rotation::rotation_for_innings;
use crate::scoring::rules::{
    ScoringRules, compute_effective_runs, recompute_innings_totals,
    violates_third_ball_rule, violation_runs,
};
use crate::scoring::state::{
    Ball, BallInput, CreditTarget, Innings, InningsState, Match, MatchPhase, Over, WicketType,
};

/// State machine errors. All are precondition violations; gameplay rule
/// breaches are scored, not raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Action not allowed in the current match state.
    #[error("cannot {action} while match is {from:?}")]
    InvalidTransition {
        /// State the match was in
        from: MatchPhase,
        /// Attempted action
        action: &'static str,
    },

    /// Match teams are not four distinct teams.
    #[error("match needs four distinct teams")]
    DuplicateTeams,

    /// Team is not playing in this match.
    #[error("team {0} is not part of this match")]
    UnknownTeam(TeamId),

    /// Lineup missing for a team.
    #[error("no lineup for team {0}")]
    MissingLineup(TeamId),

    /// Lineup has fewer than two distinct players.
    #[error("team {team} has {count} players, at least 2 required")]
    RosterTooSmall {
        /// Team with the short lineup
        team: TeamId,
        /// Distinct players supplied
        count: usize,
    },

    /// Batting order is not a permutation of the match teams.
    #[error("batting order must list each match team exactly once")]
    InvalidBattingOrder,

    /// No innings is in progress.
    #[error("no innings in progress")]
    NoCurrentInnings,

    /// Every over of the current innings is complete.
    #[error("no over left to record against")]
    NoCurrentOver,

    /// Over or innings index out of range.
    #[error("innings {innings} over {over} does not exist")]
    InvalidOver {
        /// Innings position
        innings: u8,
        /// Over number
        over: u8,
    },

    /// Powerplay already chosen for this innings.
    #[error("powerplay already set on over {0}")]
    PowerplayAlreadySelected(u8),

    /// Balls have already been bowled in the over.
    #[error("over {0} has already started")]
    OverAlreadyStarted(u8),

    /// Reball not allowed right now.
    #[error("reball unavailable: {0}")]
    ReballUnavailable(&'static str),

    /// Player is not in the bowling team's lineup.
    #[error("player {0} is not in the bowling lineup")]
    PlayerNotInLineup(PlayerId),

    /// Bowler and keeper must be different players.
    #[error("bowler and keeper must differ")]
    InvalidCrew,

    /// Malformed ball event.
    #[error("invalid ball: {0}")]
    InvalidBall(&'static str),
}

/// Every mutation a match accepts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchAction {
    /// Confirm lineups (Created/Ready -> Ready)
    MarkReady {
        /// Players per team, in batting preference order
        lineups: BTreeMap<TeamId, Vec<PlayerId>>,
    },
    /// Fix batting order and create innings (Ready/Toss -> Toss)
    Toss {
        /// Permutation of the match teams
        batting_order: [TeamId; TEAMS_PER_MATCH],
    },
    /// Begin the first innings (Toss -> InProgress)
    Start,
    /// Replace bowler and keeper of an over that has not started
    AssignOverCrew {
        /// Innings position (0-3)
        innings: u8,
        /// Over number (0-2)
        over: u8,
        /// New bowler
        bowler_id: PlayerId,
        /// New keeper
        keeper_id: PlayerId,
    },
    /// Mark one over of the current innings as powerplay
    SelectPowerplay {
        /// Over number (0-2)
        over: u8,
    },
    /// Record a ball against the current over
    RecordBall(BallInput),
    /// Remove the last ball of the current over
    UndoLastBall,
    /// Grant an extra delivery in the last over
    UseReball,
    /// Freeze results (Completed -> Locked)
    Lock,
}

impl MatchAction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            MatchAction::MarkReady { .. } => "mark ready",
            MatchAction::Toss { .. } => "toss",
            MatchAction::Start => "start",
            MatchAction::AssignOverCrew { .. } => "assign over crew",
            MatchAction::SelectPowerplay { .. } => "select powerplay",
            MatchAction::RecordBall(_) => "record ball",
            MatchAction::UndoLastBall => "undo last ball",
            MatchAction::UseReball => "use reball",
            MatchAction::Lock => "lock",
        }
    }
}

/// An action with the time it was applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedAction {
    /// When the action was applied
    pub at: DateTime<Utc>,
    /// The action itself
    pub action: MatchAction,
}

/// Result of a reducer.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Next snapshot
    pub snapshot: Match,
    /// Events produced
    pub events: Vec<MatchEvent>,
}

impl Transition {
    fn new(snapshot: Match) -> Self {
        Self { snapshot, events: Vec::new() }
    }

    fn push(&mut self, at: DateTime<Utc>, data: MatchEventData) {
        self.events.push(MatchEvent::new(self.snapshot.id, at, data));
    }

    /// Whether this transition completed the match.
    pub fn completed_match(&self) -> bool {
        self.events.iter().any(|e| e.is_match_completed())
    }
}

/// Apply any action.
pub fn reduce(
    current: &Match,
    action: &MatchAction,
    rules: &ScoringRules,
    at: DateTime<Utc>,
) -> Result<Transition, EngineError> {
    match action {
        MatchAction::MarkReady { lineups } => mark_ready(current, lineups, at),
        MatchAction::Toss { batting_order } => toss(current, batting_order, rules, at),
        MatchAction::Start => start(current, at),
        MatchAction::AssignOverCrew { innings, over, bowler_id, keeper_id } => {
            assign_over_crew(current, *innings, *over, *bowler_id, *keeper_id, rules, at)
        }
        MatchAction::SelectPowerplay { over } => select_powerplay(current, *over, at),
        MatchAction::RecordBall(input) => record_ball(current, input, rules, at),
        MatchAction::UndoLastBall => undo_last_ball(current, rules, at),
        MatchAction::UseReball => use_reball(current, rules, at),
        MatchAction::Lock => lock(current, at),
    }
}

/// Rebuild a match by applying an action log from its initial snapshot.
pub fn replay(
    initial: Match,
    log: &[LoggedAction],
    rules: &ScoringRules,
) -> Result<(Match, Vec<MatchEvent>), EngineError> {
    let mut state = initial;
    let mut all_events = Vec::new();

    for entry in log {
        let transition = reduce(&state, &entry.action, rules, entry.at)?;
        state = transition.snapshot;
        all_events.extend(transition.events);
    }

    Ok((state, all_events))
}

// =============================================================================
// SETUP
// =============================================================================

/// Confirm lineups. Each team needs at least two distinct players.
pub fn mark_ready(
    current: &Match,
    lineups: &BTreeMap<TeamId, Vec<PlayerId>>,
    at: DateTime<Utc>,
) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::Created, MatchPhase::Ready], "mark ready")?;

    let distinct: BTreeSet<TeamId> = current.team_ids.iter().copied().collect();
    if distinct.len() != TEAMS_PER_MATCH {
        return Err(EngineError::DuplicateTeams);
    }
    if let Some(extra) = lineups.keys().find(|t| !current.has_team(t)) {
        return Err(EngineError::UnknownTeam(*extra));
    }

    let mut confirmed = BTreeMap::new();
    for team in &current.team_ids {
        let players = lineups.get(team).ok_or(EngineError::MissingLineup(*team))?;

        // Keep first occurrence order, drop repeats
        let mut seen = BTreeSet::new();
        let unique: Vec<PlayerId> = players.iter().copied().filter(|p| seen.insert(*p)).collect();
        if unique.len() < 2 {
            return Err(EngineError::RosterTooSmall { team: *team, count: unique.len() });
        }
        confirmed.insert(*team, unique);
    }

    let mut next = Transition::new(current.clone());
    next.snapshot.lineups = confirmed;
    next.snapshot.state = MatchPhase::Ready;
    next.push(at, MatchEventData::Ready);
    Ok(next)
}

/// Fix the batting order and materialize all innings and overs.
///
/// Safe to repeat before the match starts: any innings from an earlier toss
/// are discarded and rebuilt.
pub fn toss(
    current: &Match,
    batting_order: &[TeamId; TEAMS_PER_MATCH],
    rules: &ScoringRules,
    at: DateTime<Utc>,
) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::Ready, MatchPhase::Toss], "toss")?;

    let ordered: BTreeSet<TeamId> = batting_order.iter().copied().collect();
    let expected: BTreeSet<TeamId> = current.team_ids.iter().copied().collect();
    if ordered != expected || ordered.len() != TEAMS_PER_MATCH {
        return Err(EngineError::InvalidBattingOrder);
    }

    let mut innings = Vec::with_capacity(TEAMS_PER_MATCH);
    for (position, team) in batting_order.iter().enumerate() {
        let batters = lineup(current, team)?;
        let rotation = rotation_for_innings(batting_order, position);

        let mut overs = Vec::with_capacity(OVERS_PER_INNINGS);
        for (number, bowling_team) in rotation.iter().enumerate() {
            let crew = lineup(current, bowling_team)?;
            overs.push(Over::new(number as u8, *bowling_team, crew[0], crew[1]));
        }

        let mut fresh = Innings::new(
            InningsId::for_match(current.id, position as u8),
            *team,
            [batters[0], batters[1]],
            overs,
        );
        fresh.apply_totals(recompute_innings_totals(&fresh.overs, &rules.config));
        innings.push(fresh);
    }

    let mut next = Transition::new(current.clone());
    next.snapshot.batting_order = batting_order.to_vec();
    next.snapshot.innings = innings;
    next.snapshot.state = MatchPhase::Toss;
    next.push(at, MatchEventData::TossCompleted { batting_order: batting_order.to_vec() });

    info!(match_id = %current.id.short(), "toss completed");
    Ok(next)
}

/// Begin the first innings.
pub fn start(current: &Match, at: DateTime<Utc>) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::Toss], "start")?;
    if current.innings.len() != TEAMS_PER_MATCH {
        return Err(EngineError::NoCurrentInnings);
    }

    let mut next = Transition::new(current.clone());
    next.snapshot.state = MatchPhase::InProgress;
    next.snapshot.innings[0].state = InningsState::InProgress;
    let team_id = next.snapshot.innings[0].team_id;

    next.push(at, MatchEventData::MatchStarted);
    next.push(at, MatchEventData::InningsStarted { innings: 0, team_id });
    Ok(next)
}

/// Replace the bowler and keeper of an over that has not started.
pub fn assign_over_crew(
    current: &Match,
    innings: u8,
    over: u8,
    bowler_id: PlayerId,
    keeper_id: PlayerId,
    rules: &ScoringRules,
    at: DateTime<Utc>,
) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::Toss, MatchPhase::InProgress], "assign over crew")?;
    if bowler_id == keeper_id {
        return Err(EngineError::InvalidCrew);
    }

    let target = current
        .innings
        .get(innings as usize)
        .and_then(|i| i.overs.get(over as usize))
        .ok_or(EngineError::InvalidOver { innings, over })?;

    if !target.balls.is_empty() || target.is_complete(&rules.config) {
        return Err(EngineError::OverAlreadyStarted(over));
    }

    let crew = lineup(current, &target.bowling_team_id)?;
    for player in [bowler_id, keeper_id] {
        if !crew.contains(&player) {
            return Err(EngineError::PlayerNotInLineup(player));
        }
    }

    let mut next = Transition::new(current.clone());
    let slot = &mut next.snapshot.innings[innings as usize].overs[over as usize];
    slot.bowler_id = bowler_id;
    slot.keeper_id = keeper_id;
    next.push(at, MatchEventData::OverCrewAssigned { innings, over });
    Ok(next)
}

// =============================================================================
// SCORING
// =============================================================================

/// Whether a ball can be recorded right now.
pub fn can_record(current: &Match, rules: &ScoringRules) -> bool {
    current.state == MatchPhase::InProgress
        && current
            .current_innings()
            .and_then(|i| i.current_over_index(&rules.config))
            .is_some()
}

/// Mark one over of the current innings as powerplay.
///
/// Once per innings, and only before the chosen over's first ball: balls
/// keep the value computed under the flag as it was when they were recorded.
pub fn select_powerplay(current: &Match, over: u8, at: DateTime<Utc>) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::InProgress], "select powerplay")?;
    let idx = current.current_innings_index().ok_or(EngineError::NoCurrentInnings)?;
    let innings = &current.innings[idx];

    if let Some(existing) = innings.powerplay_over {
        return Err(EngineError::PowerplayAlreadySelected(existing));
    }
    let target = innings
        .overs
        .get(over as usize)
        .ok_or(EngineError::InvalidOver { innings: idx as u8, over })?;
    if !target.balls.is_empty() {
        return Err(EngineError::OverAlreadyStarted(over));
    }

    let mut next = Transition::new(current.clone());
    let innings = &mut next.snapshot.innings[idx];
    innings.powerplay_over = Some(over);
    innings.overs[over as usize].is_powerplay = true;
    next.push(at, MatchEventData::PowerplaySelected { innings: idx as u8, over });

    debug!(match_id = %current.id.short(), innings = idx, over, "powerplay selected");
    Ok(next)
}

/// Record a ball against the current over.
///
/// Computes effective runs under the over's current powerplay flag, applies
/// the third-ball override, recomputes innings totals from scratch and
/// advances over, innings and match as caps are reached. Completing the
/// last innings ranks the match.
pub fn record_ball(
    current: &Match,
    input: &BallInput,
    rules: &ScoringRules,
    at: DateTime<Utc>,
) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::InProgress], "record ball")?;
    validate_ball(input)?;

    let config = &rules.config;
    let idx = current.current_innings_index().ok_or(EngineError::NoCurrentInnings)?;
    let over_idx = current.innings[idx]
        .current_over_index(config)
        .ok_or(EngineError::NoCurrentOver)?;

    let mut next = Transition::new(current.clone());
    let innings = &mut next.snapshot.innings[idx];

    let follows_noball = innings.last_ball().is_some_and(|b| b.is_noball);
    let over = &innings.overs[over_idx];
    let is_powerplay = over.is_powerplay;
    let violation = violates_third_ball_rule(
        rules.third_ball_rule(),
        over,
        over.legal_ball_count(),
        input,
    );

    let mut ball = Ball::from_input(input, at);
    ball.is_free_hit = input.is_free_hit || follows_noball;

    if ball.is_wicket && ball.is_free_hit && !ball.wicket_type.is_some_and(|w| w.allowed_on_free_hit()) {
        ball.is_wicket = false;
        ball.wicket_type = None;
    }
    if !ball.wicket_type.is_some_and(|w| w.credit() == CreditTarget::Fielder) {
        ball.fielding_team_id = None;
    }

    let adjusted = BallInput {
        is_wicket: ball.is_wicket,
        wicket_type: ball.wicket_type,
        ..input.clone()
    };
    ball.effective_runs = compute_effective_runs(&adjusted, is_powerplay, config);

    if violation {
        ball.is_wicket = true;
        ball.wicket_type = Some(WicketType::RuleViolation);
        ball.fielding_team_id = None;
        ball.third_ball_violation = true;
        // The forced ball is the over's third legal ball
        ball.is_wide = false;
        ball.is_noball = false;
        ball.effective_runs = violation_runs(is_powerplay, config);
    }

    if innings.reball_pending {
        ball.is_reball = true;
        innings.reball_pending = false;
    }

    let effective_runs = ball.effective_runs;
    let wicket = if ball.is_wicket { ball.wicket_type } else { None };
    innings.overs[over_idx].balls.push(ball);

    let totals = recompute_innings_totals(&innings.overs, config);
    innings.apply_totals(totals);

    let innings_no = idx as u8;
    let over_no = over_idx as u8;
    if violation {
        next.push(at, MatchEventData::ThirdBallViolation {
            innings: innings_no,
            over: over_no,
            penalty: effective_runs,
        });
    }
    next.push(at, MatchEventData::BallRecorded {
        innings: innings_no,
        over: over_no,
        effective_runs,
        wicket,
        total_runs: totals.total_runs,
        final_score: totals.final_score,
    });

    advance(&mut next, idx, over_idx, rules, at);
    Ok(next)
}

/// Move over, innings and match forward after a ball.
fn advance(next: &mut Transition, idx: usize, over_idx: usize, rules: &ScoringRules, at: DateTime<Utc>) {
    let config = &rules.config;
    let over = &next.snapshot.innings[idx].overs[over_idx];
    if !over.is_complete(config) {
        return;
    }

    let over_runs = over.runs();
    next.push(at, MatchEventData::OverCompleted {
        innings: idx as u8,
        over: over_idx as u8,
        runs: over_runs,
    });

    let innings = &next.snapshot.innings[idx];
    if !innings.all_overs_complete(config) {
        return;
    }

    let team_id = innings.team_id;
    let final_score = innings.final_score;
    {
        let innings = &mut next.snapshot.innings[idx];
        innings.state = InningsState::Completed;
        innings.reball_pending = false;
    }
    next.push(at, MatchEventData::InningsCompleted {
        innings: idx as u8,
        team_id,
        final_score,
    });
    info!(
        match_id = %next.snapshot.id.short(),
        innings = idx,
        team = %team_id.short(),
        final_score,
        "innings completed"
    );

    if let Some(following) = next.snapshot.innings.get_mut(idx + 1) {
        following.state = InningsState::InProgress;
        let team_id = following.team_id;
        next.push(at, MatchEventData::InningsStarted { innings: (idx + 1) as u8, team_id });
        return;
    }

    // Last innings done
    let rankings = rank(&next.snapshot.innings);
    next.snapshot.rankings = rankings.clone();
    next.snapshot.state = MatchPhase::Completed;
    next.snapshot.locked_at = Some(at);
    next.push(at, MatchEventData::MatchCompleted { rankings });
    info!(match_id = %next.snapshot.id.short(), "match completed");
}

/// Remove the most recent ball of the current over and recompute totals.
///
/// No-op when the current over has no balls.
pub fn undo_last_ball(current: &Match, rules: &ScoringRules, at: DateTime<Utc>) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::InProgress], "undo last ball")?;
    let config = &rules.config;
    let idx = current.current_innings_index().ok_or(EngineError::NoCurrentInnings)?;
    let Some(over_idx) = current.innings[idx].current_over_index(config) else {
        return Ok(Transition::new(current.clone()));
    };
    if current.innings[idx].overs[over_idx].balls.is_empty() {
        return Ok(Transition::new(current.clone()));
    }

    let mut next = Transition::new(current.clone());
    let innings = &mut next.snapshot.innings[idx];
    let Some(removed) = innings.overs[over_idx].balls.pop() else {
        return Ok(Transition::new(current.clone()));
    };
    if removed.is_reball {
        // The grant stands; the next delivery is the extra one again
        innings.reball_pending = true;
    }

    let totals = recompute_innings_totals(&innings.overs, config);
    innings.apply_totals(totals);

    next.push(at, MatchEventData::BallUndone {
        innings: idx as u8,
        over: over_idx as u8,
        effective_runs: removed.effective_runs,
        total_runs: totals.total_runs,
    });
    Ok(next)
}

/// Grant one extra delivery in the last over of the innings.
pub fn use_reball(current: &Match, rules: &ScoringRules, at: DateTime<Utc>) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::InProgress], "use reball")?;
    let config = &rules.config;
    let idx = current.current_innings_index().ok_or(EngineError::NoCurrentInnings)?;
    let innings = &current.innings[idx];
    let over_idx = innings.current_over_index(config).ok_or(EngineError::NoCurrentOver)?;
    let over = &innings.overs[over_idx];

    if over_idx != OVERS_PER_INNINGS - 1 {
        return Err(EngineError::ReballUnavailable("only in the last over"));
    }
    if innings.reballs_used >= config.max_reballs {
        return Err(EngineError::ReballUnavailable("no reballs left"));
    }
    if over.is_powerplay {
        return Err(EngineError::ReballUnavailable("not in a powerplay over"));
    }
    if over.balls.is_empty() {
        return Err(EngineError::ReballUnavailable("no ball bowled yet"));
    }
    if innings.reball_pending {
        return Err(EngineError::ReballUnavailable("a reball is already pending"));
    }

    let mut next = Transition::new(current.clone());
    let innings = &mut next.snapshot.innings[idx];
    innings.reballs_used += 1;
    innings.reball_pending = true;
    let remaining = config.max_reballs - innings.reballs_used;
    next.push(at, MatchEventData::ReballGranted { innings: idx as u8, remaining });
    Ok(next)
}

/// Freeze a completed match.
pub fn lock(current: &Match, at: DateTime<Utc>) -> Result<Transition, EngineError> {
    require_state(current, &[MatchPhase::Completed], "lock")?;

    let mut next = Transition::new(current.clone());
    next.snapshot.state = MatchPhase::Locked;
    if next.snapshot.locked_at.is_none() {
        next.snapshot.locked_at = Some(at);
    }
    next.push(at, MatchEventData::MatchLocked);
    Ok(next)
}

// =============================================================================
// HELPERS
// =============================================================================

fn require_state(current: &Match, allowed: &[MatchPhase], action: &'static str) -> Result<(), EngineError> {
    if allowed.contains(&current.state) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from: current.state, action })
    }
}

fn lineup<'a>(current: &'a Match, team: &TeamId) -> Result<&'a [PlayerId], EngineError> {
    let players = current.lineups.get(team).ok_or(EngineError::MissingLineup(*team))?;
    if players.len() < 2 {
        return Err(EngineError::RosterTooSmall { team: *team, count: players.len() });
    }
    Ok(players)
}

fn validate_ball(input: &BallInput) -> Result<(), EngineError> {
    if input.runs > 6 {
        return Err(EngineError::InvalidBall("runs must be 0-6"));
    }
    if input.is_wicket && input.wicket_type.is_none() {
        return Err(EngineError::InvalidBall("wicket without a dismissal type"));
    }
    if input.is_wide && input.is_noball {
        return Err(EngineError::InvalidBall("ball cannot be both wide and no-ball"));
    }
    if input.wicket_type == Some(WicketType::RuleViolation) {
        return Err(EngineError::InvalidBall("rule violations are applied by the engine"));
    }
    Ok(())
}
