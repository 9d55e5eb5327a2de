//! Scoring Rules
//!
//! Pure functions turning a raw ball into its effective run value, the
//! third-ball rule hook, and the innings totals recomputation every mutation
//! goes through. No state lives here.

use std::str::FromStr;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::scoring::state::{Ball, BallInput, InningsTotals, Over};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Scoring rule constants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Deliveries per over
    pub balls_per_over: u8,
    /// Multiplier applied to every effective run value in a powerplay over
    pub powerplay_multiplier: i32,
    /// Bonus added to the final score of an innings with no wickets
    pub no_wicket_bonus: i32,
    /// Runs deducted for a third-ball violation (before powerplay scaling)
    pub violation_penalty: i32,
    /// Runs deducted for misconduct on a ball
    pub misconduct_penalty: i32,
    /// Runs deducted for an ordinary dismissal
    pub wicket_penalty: i32,
    /// Extra run awarded for a wide or no-ball
    pub extra_run: i32,
    /// Reballs allowed per innings
    pub max_reballs: u8,
    /// Whether wides and no-balls count toward the six outside a powerplay
    pub extras_count_outside_powerplay: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            balls_per_over: 6,
            powerplay_multiplier: 2,
            no_wicket_bonus: 10,
            violation_penalty: 5,
            misconduct_penalty: 5,
            wicket_penalty: 0,
            extra_run: 1,
            max_reballs: 3,
            extras_count_outside_powerplay: true,
        }
    }
}

impl RulesConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            balls_per_over: env_or("QC_BALLS_PER_OVER", defaults.balls_per_over),
            powerplay_multiplier: env_or("QC_POWERPLAY_MULTIPLIER", defaults.powerplay_multiplier),
            no_wicket_bonus: env_or("QC_NO_WICKET_BONUS", defaults.no_wicket_bonus),
            violation_penalty: env_or("QC_VIOLATION_PENALTY", defaults.violation_penalty),
            misconduct_penalty: env_or("QC_MISCONDUCT_PENALTY", defaults.misconduct_penalty),
            wicket_penalty: env_or("QC_WICKET_PENALTY", defaults.wicket_penalty),
            extra_run: env_or("QC_EXTRA_RUN", defaults.extra_run),
            max_reballs: env_or("QC_MAX_REBALLS", defaults.max_reballs),
            extras_count_outside_powerplay: std::env::var("QC_EXTRAS_COUNT_OUTSIDE_POWERPLAY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.extras_count_outside_powerplay),
        }
    }

    /// Parse a JSON rules document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Multiplier for an over with the given powerplay flag.
    #[inline]
    pub fn multiplier(&self, is_powerplay: bool) -> i32 {
        if is_powerplay {
            self.powerplay_multiplier
        } else {
            1
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// THIRD-BALL RULE
// =============================================================================

/// House rule checked before the third legal ball of an over.
///
/// `prior` holds every ball already recorded in the over (extras included);
/// `incoming` is the ball about to be recorded.
pub trait ThirdBallRule: Send + Sync {
    /// Return true to force `incoming` into a penalised wicket.
    fn violates(&self, prior: &[Ball], incoming: &BallInput) -> bool;
}

/// Rule that never fires. Used until the house rule is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoThirdBallRule;

impl ThirdBallRule for NoThirdBallRule {
    fn violates(&self, _prior: &[Ball], _incoming: &BallInput) -> bool {
        false
    }
}

impl<F> ThirdBallRule for F
where
    F: Fn(&[Ball], &BallInput) -> bool + Send + Sync,
{
    fn violates(&self, prior: &[Ball], incoming: &BallInput) -> bool {
        self(prior, incoming)
    }
}

/// Rule constants plus the third-ball predicate.
#[derive(Clone)]
pub struct ScoringRules {
    /// Numeric rule constants
    pub config: RulesConfig,
    third_ball: Arc<dyn ThirdBallRule>,
}

impl ScoringRules {
    /// Rules with no third-ball predicate.
    pub fn new(config: RulesConfig) -> Self {
        Self {
            config,
            third_ball: Arc::new(NoThirdBallRule),
        }
    }

    /// Replace the third-ball predicate.
    pub fn with_third_ball_rule<R: ThirdBallRule + 'static>(mut self, rule: R) -> Self {
        self.third_ball = Arc::new(rule);
        self
    }

    /// The active third-ball predicate.
    pub fn third_ball_rule(&self) -> &dyn ThirdBallRule {
        self.third_ball.as_ref()
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self::new(RulesConfig::default())
    }
}

impl std::fmt::Debug for ScoringRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringRules")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// EFFECTIVE RUNS
// =============================================================================

/// Rule-adjusted run value of a ball.
///
/// Nominal value is runs off the bat, plus the extra run for a wide or
/// no-ball, minus wicket and misconduct penalties. Under powerplay the whole
/// value (bonus and penalty alike) is multiplied.
pub fn compute_effective_runs(ball: &BallInput, is_powerplay: bool, config: &RulesConfig) -> i32 {
    let mut nominal = ball.runs as i32;
    if !ball.is_legal() {
        nominal += config.extra_run;
    }
    if ball.is_wicket {
        nominal -= config.wicket_penalty;
    }
    if ball.misconduct {
        nominal -= config.misconduct_penalty;
    }
    nominal * config.multiplier(is_powerplay)
}

/// Effective runs of a third-ball violation.
#[inline]
pub fn violation_runs(is_powerplay: bool, config: &RulesConfig) -> i32 {
    -config.violation_penalty * config.multiplier(is_powerplay)
}

/// Check the third-ball rule.
///
/// Only evaluated when exactly two legal balls have been bowled in the over.
pub fn violates_third_ball_rule(
    rule: &dyn ThirdBallRule,
    over: &Over,
    legal_balls_so_far: usize,
    incoming: &BallInput,
) -> bool {
    if legal_balls_so_far != 2 {
        return false;
    }
    rule.violates(&over.balls, incoming)
}

// =============================================================================
// TOTALS
// =============================================================================

/// Recompute innings totals from the complete ball sequence.
///
/// Every mutation (record, undo, violation override) goes through this;
/// totals are never patched incrementally.
pub fn recompute_innings_totals(overs: &[Over], config: &RulesConfig) -> InningsTotals {
    let mut total_runs = 0i32;
    let mut total_wickets = 0u32;

    for ball in overs.iter().flat_map(|o| o.balls.iter()) {
        total_runs += ball.effective_runs;
        if ball.is_wicket {
            total_wickets += 1;
        }
    }

    let no_wicket_bonus = total_wickets == 0;
    let final_score = total_runs + if no_wicket_bonus { config.no_wicket_bonus } else { 0 };

    InningsTotals {
        total_runs,
        total_wickets,
        no_wicket_bonus,
        final_score,
    }
}
