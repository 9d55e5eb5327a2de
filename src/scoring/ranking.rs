//! Match Ranking
//!
//! Orders the four innings of a completed match and assigns place points.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::POINTS_BY_RANK;
use crate::core::ids::TeamId;
use crate::scoring::state::{CreditTarget, Innings, MatchRanking};

/// Place points for a 1-based rank. Ranks past the table earn nothing.
pub fn points_for_rank(rank: u8) -> u8 {
    POINTS_BY_RANK
        .get((rank as usize).wrapping_sub(1))
        .copied()
        .unwrap_or(0)
}

/// Ordering between two innings: better innings first.
///
/// Final score descending, then runs excluding bonus descending, then fewer
/// wickets, then team id ascending. Total, so ranks are always distinct.
pub fn compare_innings(a: &Innings, b: &Innings) -> Ordering {
    b.final_score
        .cmp(&a.final_score)
        .then(b.total_runs.cmp(&a.total_runs))
        .then(a.total_wickets.cmp(&b.total_wickets))
        .then(a.team_id.cmp(&b.team_id))
}

/// Dismissals credited to each fielding team across the given innings.
pub fn dismissals_by_team(innings: &[Innings]) -> BTreeMap<TeamId, u32> {
    let mut credited: BTreeMap<TeamId, u32> = BTreeMap::new();

    for over in innings.iter().flat_map(|i| i.overs.iter()) {
        for ball in over.balls.iter().filter(|b| b.is_wicket) {
            let team = match ball.wicket_type.map(|w| w.credit()) {
                Some(CreditTarget::Bowler) | Some(CreditTarget::Keeper) => Some(over.bowling_team_id),
                Some(CreditTarget::Fielder) => Some(ball.fielding_team_id.unwrap_or(over.bowling_team_id)),
                Some(CreditTarget::None) | None => None,
            };
            if let Some(team) = team {
                *credited.entry(team).or_insert(0) += 1;
            }
        }
    }

    credited
}

/// Rank the innings of a completed match.
///
/// Returns one entry per innings, in rank order.
pub fn rank(innings: &[Innings]) -> Vec<MatchRanking> {
    let mut ordered: Vec<&Innings> = innings.iter().collect();
    ordered.sort_by(|a, b| compare_innings(a, b));

    let dismissals = dismissals_by_team(innings);

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, inn)| {
            let rank = (i + 1) as u8;
            MatchRanking {
                team_id: inn.team_id,
                rank,
                points: points_for_rank(rank),
                total_runs: inn.total_runs,
                final_score: inn.final_score,
                dismissals: dismissals.get(&inn.team_id).copied().unwrap_or(0),
            }
        })
        .collect()
}
