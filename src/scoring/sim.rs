//! Match Simulation
//!
//! Drives a match to completion with seeded random deliveries. Same seed,
//! same lineups, same match.

use std::collections::BTreeMap;
use chrono::{DateTime, Duration, Utc};

use crate::{OVERS_PER_INNINGS, TEAMS_PER_MATCH};
use crate::core::ids::{PlayerId, TeamId};
use crate::core::rng::DeterministicRng;
use crate::scoring::engine::{EngineError, LoggedAction, MatchAction, reduce};
use crate::scoring::rules::ScoringRules;
use crate::scoring::state::{BallInput, Match, MatchPhase, WicketType};

const DISMISSALS: [WicketType; 6] = [
    WicketType::Bowled,
    WicketType::Caught,
    WicketType::Lbw,
    WicketType::Stumped,
    WicketType::RunOut,
    WicketType::HitWicket,
];

const RUN_WEIGHTS: [u8; 10] = [0, 0, 1, 1, 2, 2, 3, 4, 4, 6];

/// Seeded action generator.
#[derive(Clone, Debug)]
pub struct Simulator {
    rng: DeterministicRng,
    /// Percent chance of asking for a reball when one is available
    pub reball_chance: u32,
}

impl Simulator {
    /// Create a simulator from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
            reball_chance: 5,
        }
    }

    /// Next action for a match past the lineup stage.
    ///
    /// Returns `None` when the match needs lineups or has finished.
    pub fn next_action(&mut self, current: &Match, rules: &ScoringRules) -> Option<MatchAction> {
        match current.state {
            MatchPhase::Created | MatchPhase::Completed | MatchPhase::Locked => None,
            MatchPhase::Ready => Some(MatchAction::Toss {
                batting_order: self.shuffled(current.team_ids),
            }),
            MatchPhase::Toss => Some(MatchAction::Start),
            MatchPhase::InProgress => {
                let innings = current.current_innings()?;
                let over_idx = innings.current_over_index(&rules.config)?;

                if innings.powerplay_over.is_none() && innings.ball_count() == 0 {
                    let over = self.rng.below(OVERS_PER_INNINGS as u32) as u8;
                    return Some(MatchAction::SelectPowerplay { over });
                }

                let over = &innings.overs[over_idx];
                let reball_open = over_idx == OVERS_PER_INNINGS - 1
                    && !over.is_powerplay
                    && !over.balls.is_empty()
                    && !innings.reball_pending
                    && innings.reballs_used < rules.config.max_reballs;
                if reball_open && self.rng.chance(self.reball_chance) {
                    return Some(MatchAction::UseReball);
                }

                Some(MatchAction::RecordBall(self.random_ball(over.bowling_team_id)))
            }
        }
    }

    /// A random delivery against `bowling_team`.
    pub fn random_ball(&mut self, bowling_team: TeamId) -> BallInput {
        let roll = self.rng.below(100);
        match roll {
            0..=3 => BallInput::wide(),
            4..=7 => BallInput::noball(self.rng.below(3) as u8),
            8..=15 => {
                let kind = DISMISSALS[self.rng.below(DISMISSALS.len() as u32) as usize];
                match kind {
                    WicketType::Caught | WicketType::RunOut => BallInput::fielded_wicket(kind, bowling_team),
                    _ => BallInput::wicket(kind),
                }
            }
            16..=17 => BallInput { misconduct: true, ..BallInput::dot() },
            _ => BallInput::runs(RUN_WEIGHTS[self.rng.below(RUN_WEIGHTS.len() as u32) as usize]),
        }
    }

    fn shuffled(&mut self, mut teams: [TeamId; TEAMS_PER_MATCH]) -> [TeamId; TEAMS_PER_MATCH] {
        for i in (1..teams.len()).rev() {
            let j = self.rng.below(i as u32 + 1) as usize;
            teams.swap(i, j);
        }
        teams
    }
}

/// A simulated match and the log that produced it.
#[derive(Debug, Clone)]
pub struct SimulatedMatch {
    /// Final state
    pub snapshot: Match,
    /// Every action applied, in order
    pub log: Vec<LoggedAction>,
}

/// Play a scheduled match to completion.
///
/// Each action is stamped one second after the previous one.
pub fn simulate_match(
    initial: &Match,
    lineups: BTreeMap<TeamId, Vec<PlayerId>>,
    rules: &ScoringRules,
    seed: u64,
    started_at: DateTime<Utc>,
) -> Result<SimulatedMatch, EngineError> {
    let mut sim = Simulator::new(seed);
    let mut state = initial.clone();
    let mut log = Vec::new();
    let mut next = Some(MatchAction::MarkReady { lineups });

    while let Some(action) = next {
        let at = started_at + Duration::seconds(log.len() as i64);
        state = reduce(&state, &action, rules, at)?.snapshot;
        log.push(LoggedAction { at, action });
        next = sim.next_action(&state, rules);
    }

    Ok(SimulatedMatch { snapshot: state, log })
}
