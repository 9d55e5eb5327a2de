//! Match State Definitions
//!
//! Ball, over, innings and match records. A `Match` is a self-contained
//! snapshot: everything needed to keep scoring or to rank it lives inside.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::hash::{SnapshotHash, SnapshotHasher, compute_snapshot_hash};
use crate::core::ids::{InningsId, MatchId, PlayerId, TeamId, TournamentId};
use crate::scoring::rules::RulesConfig;
use crate::TEAMS_PER_MATCH;

// =============================================================================
// WICKETS
// =============================================================================

/// Who gets credit for a dismissal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreditTarget {
    /// The bowler's team.
    Bowler,
    /// The keeper, who always belongs to the bowling team.
    Keeper,
    /// A fielder, whose team is named on the ball.
    Fielder,
    /// Nobody (rule violations).
    None,
}

/// How a batter was dismissed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WicketType {
    /// Stumps hit by the delivery
    Bowled = 0,
    /// Caught by a fielder
    Caught = 1,
    /// Leg before wicket
    Lbw = 2,
    /// Stumped by the keeper
    Stumped = 3,
    /// Run out by a fielder
    RunOut = 4,
    /// Batter broke their own wicket
    HitWicket = 5,
    /// Forced dismissal from the third-ball rule.
    RuleViolation = 6,
}

impl WicketType {
    /// Credit target for this dismissal.
    pub fn credit(self) -> CreditTarget {
        match self {
            WicketType::Bowled | WicketType::Lbw | WicketType::HitWicket => CreditTarget::Bowler,
            WicketType::Stumped => CreditTarget::Keeper,
            WicketType::Caught | WicketType::RunOut => CreditTarget::Fielder,
            WicketType::RuleViolation => CreditTarget::None,
        }
    }

    /// Whether this dismissal stands on a free hit.
    pub fn allowed_on_free_hit(self) -> bool {
        matches!(self, WicketType::RunOut | WicketType::RuleViolation)
    }
}

// =============================================================================
// BALL
// =============================================================================

/// A raw ball event as entered by the umpire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallInput {
    /// Runs off the bat (0-6)
    pub runs: u8,
    /// A dismissal occurred
    pub is_wicket: bool,
    /// Kind of dismissal, when `is_wicket`
    pub wicket_type: Option<WicketType>,
    /// Only meaningful for fielder-credited dismissals
    pub fielding_team_id: Option<TeamId>,
    /// No-ball; the next delivery is a free hit
    pub is_noball: bool,
    /// Wide delivery
    pub is_wide: bool,
    /// Bowled as a free hit
    pub is_free_hit: bool,
    /// Umpire flagged misconduct on this ball
    pub misconduct: bool,
}

impl BallInput {
    /// A dot ball.
    pub fn dot() -> Self {
        Self::default()
    }

    /// A legal ball scoring `runs`.
    pub fn runs(runs: u8) -> Self {
        Self { runs, ..Self::default() }
    }

    /// A legal ball taking a wicket.
    pub fn wicket(wicket_type: WicketType) -> Self {
        Self {
            is_wicket: true,
            wicket_type: Some(wicket_type),
            ..Self::default()
        }
    }

    /// A catch or run-out credited to `fielding_team_id`.
    pub fn fielded_wicket(wicket_type: WicketType, fielding_team_id: TeamId) -> Self {
        Self {
            is_wicket: true,
            wicket_type: Some(wicket_type),
            fielding_team_id: Some(fielding_team_id),
            ..Self::default()
        }
    }

    /// A wide.
    pub fn wide() -> Self {
        Self { is_wide: true, ..Self::default() }
    }

    /// A no-ball with `runs` off the bat.
    pub fn noball(runs: u8) -> Self {
        Self { runs, is_noball: true, ..Self::default() }
    }

    /// Wide and no-ball deliveries are not legal.
    pub fn is_legal(&self) -> bool {
        !self.is_wide && !self.is_noball
    }
}

/// A recorded ball. Immutable once appended, except through undo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ball {
    /// Runs off the bat (0-6)
    pub runs: u8,
    /// A dismissal occurred
    pub is_wicket: bool,
    /// Kind of dismissal, when `is_wicket`
    pub wicket_type: Option<WicketType>,
    /// Team credited with the dismissal, for fielder-credited wickets
    pub fielding_team_id: Option<TeamId>,
    /// No-ball; the next delivery is a free hit
    pub is_noball: bool,
    /// Wide delivery
    pub is_wide: bool,
    /// Bowled as a free hit
    pub is_free_hit: bool,
    /// Umpire flagged misconduct on this ball
    pub misconduct: bool,

    /// Extra delivery granted by a reball; never counts toward the over
    pub is_reball: bool,

    /// Set when the third-ball rule forced this ball into a wicket
    pub third_ball_violation: bool,

    /// Rule-adjusted run value, fixed at record time
    pub effective_runs: i32,

    /// When the ball was recorded
    pub timestamp: DateTime<Utc>,
}

impl Ball {
    /// Build a ball from raw input. Effective runs are filled in by the engine.
    pub fn from_input(input: &BallInput, timestamp: DateTime<Utc>) -> Self {
        Self {
            runs: input.runs,
            is_wicket: input.is_wicket,
            wicket_type: input.wicket_type,
            fielding_team_id: input.fielding_team_id,
            is_noball: input.is_noball,
            is_wide: input.is_wide,
            is_free_hit: input.is_free_hit,
            misconduct: input.misconduct,
            is_reball: false,
            third_ball_violation: false,
            effective_runs: 0,
            timestamp,
        }
    }

    /// Wide and no-ball deliveries are not legal.
    #[inline]
    pub fn is_legal(&self) -> bool {
        !self.is_wide && !self.is_noball
    }

    /// Whether this ball counts toward the over's six.
    pub fn counts_toward_over(&self, is_powerplay: bool, config: &RulesConfig) -> bool {
        if self.is_reball {
            return false;
        }
        if is_powerplay || !config.extras_count_outside_powerplay {
            self.is_legal()
        } else {
            true
        }
    }

    fn hash_into(&self, hasher: &mut SnapshotHasher) {
        hasher.update_u8(self.runs);
        hasher.update_bool(self.is_wicket);
        hasher.update_u8(self.wicket_type.map(|w| w as u8 + 1).unwrap_or(0));
        hasher.update_opt_id(self.fielding_team_id.as_ref().map(|t| t.as_bytes()));
        hasher.update_bool(self.is_noball);
        hasher.update_bool(self.is_wide);
        hasher.update_bool(self.is_free_hit);
        hasher.update_bool(self.misconduct);
        hasher.update_bool(self.is_reball);
        hasher.update_bool(self.third_ball_violation);
        hasher.update_i32(self.effective_runs);
        hasher.update_i64(self.timestamp.timestamp_millis());
    }
}

// =============================================================================
// OVER
// =============================================================================

/// One over of an innings, bowled by a single opposing team.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Over {
    /// 0, 1 or 2
    pub over_number: u8,
    /// Team bowling this over
    pub bowling_team_id: TeamId,
    /// Bowler for the over
    pub bowler_id: PlayerId,
    /// Wicket-keeper for the over
    pub keeper_id: PlayerId,
    /// Chosen as the innings powerplay over
    pub is_powerplay: bool,
    /// Deliveries in bowling order, extras and reballs included
    pub balls: Vec<Ball>,
}

impl Over {
    /// Create an empty over.
    pub fn new(over_number: u8, bowling_team_id: TeamId, bowler_id: PlayerId, keeper_id: PlayerId) -> Self {
        Self {
            over_number,
            bowling_team_id,
            bowler_id,
            keeper_id,
            is_powerplay: false,
            balls: Vec::new(),
        }
    }

    /// Number of legal deliveries, reballs excluded.
    pub fn legal_ball_count(&self) -> usize {
        self.balls.iter().filter(|b| b.is_legal() && !b.is_reball).count()
    }

    /// Number of deliveries counting toward the six-ball cap.
    pub fn counted_ball_count(&self, config: &RulesConfig) -> usize {
        self.balls
            .iter()
            .filter(|b| b.counts_toward_over(self.is_powerplay, config))
            .count()
    }

    /// Check if the over has reached its ball cap.
    pub fn is_complete(&self, config: &RulesConfig) -> bool {
        self.counted_ball_count(config) >= config.balls_per_over as usize
    }

    /// Sum of effective runs in this over.
    pub fn runs(&self) -> i32 {
        self.balls.iter().map(|b| b.effective_runs).sum()
    }
}

// =============================================================================
// INNINGS
// =============================================================================

/// Innings lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InningsState {
    /// Waiting for earlier innings
    #[default]
    NotStarted = 0,
    /// Balls are being recorded
    InProgress = 1,
    /// All three overs bowled
    Completed = 2,
}

/// Derived innings totals. Always recomputed from the full ball sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningsTotals {
    /// Sum of effective runs
    pub total_runs: i32,
    /// Balls that took a wicket
    pub total_wickets: u32,
    /// No wicket fell, so the bonus applies
    pub no_wicket_bonus: bool,
    /// Runs plus the bonus when it applies
    pub final_score: i32,
}

/// One team's batting turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Innings {
    /// Derived from the match id and batting position
    pub id: InningsId,

    /// Batting team
    pub team_id: TeamId,

    /// First two players of the lineup
    pub batting_pair: [PlayerId; 2],

    /// Team bowling the first over
    pub bowling_team_id: TeamId,

    /// Lifecycle of this innings
    pub state: InningsState,

    /// Exactly three overs, bowled by the other three teams
    pub overs: Vec<Over>,

    /// Over chosen as powerplay, once selected
    pub powerplay_over: Option<u8>,

    /// Sum of effective runs
    pub total_runs: i32,
    /// Balls that took a wicket
    pub total_wickets: u32,
    /// No wicket fell, so the bonus applies
    pub no_wicket_bonus: bool,
    /// Runs plus the bonus when it applies
    pub final_score: i32,

    /// Reballs granted so far
    pub reballs_used: u8,

    /// A reball was granted and the next delivery is the extra one
    pub reball_pending: bool,
}

impl Innings {
    /// Create a not-yet-started innings.
    pub fn new(id: InningsId, team_id: TeamId, batting_pair: [PlayerId; 2], overs: Vec<Over>) -> Self {
        let bowling_team_id = overs
            .first()
            .map(|o| o.bowling_team_id)
            .unwrap_or_default();
        Self {
            id,
            team_id,
            batting_pair,
            bowling_team_id,
            state: InningsState::NotStarted,
            overs,
            powerplay_over: None,
            total_runs: 0,
            total_wickets: 0,
            no_wicket_bonus: false,
            final_score: 0,
            reballs_used: 0,
            reball_pending: false,
        }
    }

    /// Index of the over currently being bowled, if any remain.
    pub fn current_over_index(&self, config: &RulesConfig) -> Option<usize> {
        self.overs.iter().position(|o| !o.is_complete(config))
    }

    /// Whether every over has reached its cap.
    pub fn all_overs_complete(&self, config: &RulesConfig) -> bool {
        self.current_over_index(config).is_none()
    }

    /// Last ball bowled in the innings, across overs.
    pub fn last_ball(&self) -> Option<&Ball> {
        self.overs.iter().rev().find_map(|o| o.balls.last())
    }

    /// Total number of balls recorded.
    pub fn ball_count(&self) -> usize {
        self.overs.iter().map(|o| o.balls.len()).sum()
    }

    /// Current derived totals.
    pub fn totals(&self) -> InningsTotals {
        InningsTotals {
            total_runs: self.total_runs,
            total_wickets: self.total_wickets,
            no_wicket_bonus: self.no_wicket_bonus,
            final_score: self.final_score,
        }
    }

    /// Overwrite the stored totals.
    pub fn apply_totals(&mut self, totals: InningsTotals) {
        self.total_runs = totals.total_runs;
        self.total_wickets = totals.total_wickets;
        self.no_wicket_bonus = totals.no_wicket_bonus;
        self.final_score = totals.final_score;
    }

    fn hash_into(&self, hasher: &mut SnapshotHasher) {
        hasher.update_id(self.id.as_bytes());
        hasher.update_id(self.team_id.as_bytes());
        hasher.update_id(self.batting_pair[0].as_bytes());
        hasher.update_id(self.batting_pair[1].as_bytes());
        hasher.update_u8(self.state as u8);
        hasher.update_u8(self.powerplay_over.map(|o| o + 1).unwrap_or(0));
        hasher.update_u8(self.reballs_used);
        hasher.update_bool(self.reball_pending);
        for over in &self.overs {
            hasher.update_u8(over.over_number);
            hasher.update_id(over.bowling_team_id.as_bytes());
            hasher.update_id(over.bowler_id.as_bytes());
            hasher.update_id(over.keeper_id.as_bytes());
            hasher.update_bool(over.is_powerplay);
            hasher.update_u32(over.balls.len() as u32);
            for ball in &over.balls {
                ball.hash_into(hasher);
            }
        }
        hasher.update_i32(self.total_runs);
        hasher.update_u32(self.total_wickets);
        hasher.update_i32(self.final_score);
    }
}

// =============================================================================
// MATCH
// =============================================================================

/// Tournament stage a match belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    /// Scheduled round-robin play
    League = 0,
    /// Rank-based only: league ranks 5 to 12
    Quarterfinal = 1,
    /// Two matches feeding the final
    Semifinal = 2,
    /// Decides the podium
    Final = 3,
}

impl Stage {
    /// Short label for logs and match names.
    pub fn label(self) -> &'static str {
        match self {
            Stage::League => "LEAGUE",
            Stage::Quarterfinal => "QF",
            Stage::Semifinal => "SEMI",
            Stage::Final => "FINAL",
        }
    }
}

/// Match lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MatchPhase {
    /// Scheduled, lineups not yet confirmed
    #[default]
    Created = 0,
    /// Lineups confirmed
    Ready = 1,
    /// Batting order fixed, innings materialized
    Toss = 2,
    /// Balls are being recorded
    InProgress = 3,
    /// All four innings finished, rankings attached
    Completed = 4,
    /// Results frozen by the organizer
    Locked = 5,
}

impl MatchPhase {
    /// Completed or locked.
    pub fn is_finished(self) -> bool {
        matches!(self, MatchPhase::Completed | MatchPhase::Locked)
    }
}

/// One team's result in a completed match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRanking {
    /// Ranked team
    pub team_id: TeamId,
    /// 1-4
    pub rank: u8,
    /// 5, 3, 1 or 0
    pub points: u8,
    /// Runs excluding the no-wicket bonus
    pub total_runs: i32,
    /// Innings score including any no-wicket bonus
    pub final_score: i32,
    /// Dismissals credited to this team while fielding
    pub dismissals: u32,
}

/// Complete state of a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Match id
    pub id: MatchId,
    /// Owning tournament; `None` for standalone matches
    pub tournament_id: Option<TournamentId>,
    /// Stage the match belongs to
    pub stage: Stage,

    /// Group label for group-stage matches
    pub group: Option<String>,

    /// Position within the stage (bracket matches only)
    pub slot: u8,

    /// The four competing teams
    pub team_ids: [TeamId; TEAMS_PER_MATCH],

    /// Confirmed lineups, keyed by team
    pub lineups: BTreeMap<TeamId, Vec<PlayerId>>,

    /// Permutation of `team_ids`; empty until toss
    pub batting_order: Vec<TeamId>,

    /// Lifecycle of the match
    pub state: MatchPhase,

    /// One per team once the toss is done
    pub innings: Vec<Innings>,

    /// Empty until the match completes
    pub rankings: Vec<MatchRanking>,

    /// Set when the result is locked
    pub locked_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Create a match in the `Created` state.
    pub fn new(id: MatchId, team_ids: [TeamId; TEAMS_PER_MATCH], stage: Stage) -> Self {
        Self {
            id,
            tournament_id: None,
            stage,
            group: None,
            slot: 0,
            team_ids,
            lineups: BTreeMap::new(),
            batting_order: Vec::new(),
            state: MatchPhase::Created,
            innings: Vec::new(),
            rankings: Vec::new(),
            locked_at: None,
        }
    }

    /// Attach the match to a tournament.
    pub fn in_tournament(mut self, tournament_id: TournamentId, slot: u8, group: Option<String>) -> Self {
        self.tournament_id = Some(tournament_id);
        self.slot = slot;
        self.group = group;
        self
    }

    /// Check whether a team plays in this match.
    pub fn has_team(&self, team_id: &TeamId) -> bool {
        self.team_ids.contains(team_id)
    }

    /// Index of the innings currently in progress.
    pub fn current_innings_index(&self) -> Option<usize> {
        self.innings.iter().position(|i| i.state == InningsState::InProgress)
    }

    /// The innings currently in progress.
    pub fn current_innings(&self) -> Option<&Innings> {
        self.current_innings_index().map(|i| &self.innings[i])
    }

    /// Innings batted by `team_id`.
    pub fn innings_of(&self, team_id: &TeamId) -> Option<&Innings> {
        self.innings.iter().find(|i| i.team_id == *team_id)
    }

    /// Ranking entry for `team_id` (completed matches only).
    pub fn ranking_of(&self, team_id: &TeamId) -> Option<&MatchRanking> {
        self.rankings.iter().find(|r| r.team_id == *team_id)
    }

    /// Team finishing at `rank`.
    pub fn team_at_rank(&self, rank: u8) -> Option<TeamId> {
        self.rankings.iter().find(|r| r.rank == rank).map(|r| r.team_id)
    }

    /// Completed or locked.
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Hash of the full snapshot.
    pub fn compute_hash(&self) -> SnapshotHash {
        compute_snapshot_hash(self.id.as_bytes(), |hasher| {
            hasher.update_u8(self.stage as u8);
            hasher.update_u8(self.slot);
            hasher.update_u8(self.state as u8);
            for team in &self.team_ids {
                hasher.update_id(team.as_bytes());
            }
            for (team, players) in &self.lineups {
                hasher.update_id(team.as_bytes());
                hasher.update_u32(players.len() as u32);
                for player in players {
                    hasher.update_id(player.as_bytes());
                }
            }
            for team in &self.batting_order {
                hasher.update_id(team.as_bytes());
            }
            for innings in &self.innings {
                innings.hash_into(hasher);
            }
            for ranking in &self.rankings {
                hasher.update_id(ranking.team_id.as_bytes());
                hasher.update_u8(ranking.rank);
                hasher.update_u8(ranking.points);
            }
            hasher.update_i64(self.locked_at.map(|t| t.timestamp_millis()).unwrap_or(-1));
        })
    }
}
