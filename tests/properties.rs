//! Property-based tests for scoring, rotation and ranking.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use quad_cricket::core::ids::{InningsId, MatchId, PlayerId, TeamId};
use quad_cricket::scoring::engine::{MatchAction, can_record, reduce};
use quad_cricket::scoring::ranking::rank;
use quad_cricket::scoring::rotation::match_rotation;
use quad_cricket::scoring::rules::{ScoringRules, compute_effective_runs, recompute_innings_totals};
use quad_cricket::scoring::state::{BallInput, Innings, Match, Stage, WicketType};
use quad_cricket::{POINTS_BY_RANK, TEAMS_PER_MATCH};

const INPUT_DISMISSALS: [WicketType; 6] = [
    WicketType::Bowled,
    WicketType::Caught,
    WicketType::Lbw,
    WicketType::Stumped,
    WicketType::RunOut,
    WicketType::HitWicket,
];

fn team(n: u8) -> TeamId {
    TeamId::new([n; 16])
}

fn started_match(rules: &ScoringRules, powerplay: Option<u8>) -> Match {
    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let teams = [team(1), team(2), team(3), team(4)];
    let lineups: BTreeMap<TeamId, Vec<PlayerId>> = teams
        .iter()
        .map(|t| (*t, vec![PlayerId::new([t.0[0] + 10; 16]), PlayerId::new([t.0[0] + 20; 16])]))
        .collect();

    let mut m = Match::new(MatchId::new([5; 16]), teams, Stage::League);
    for action in [
        MatchAction::MarkReady { lineups },
        MatchAction::Toss { batting_order: teams },
        MatchAction::Start,
    ] {
        m = reduce(&m, &action, rules, at).unwrap().snapshot;
    }
    if let Some(over) = powerplay {
        m = reduce(&m, &MatchAction::SelectPowerplay { over }, rules, at).unwrap().snapshot;
    }
    m
}

/// Strategy: any ball the engine accepts as input.
fn ball_strategy() -> impl Strategy<Value = BallInput> {
    (0..=6u8, 0..20usize, 0..6u8, prop::bool::weighted(0.1)).prop_map(|(runs, dismissal, kind, misconduct)| {
        let mut ball = match kind {
            0 => BallInput::wide(),
            1 => BallInput::noball(runs),
            _ => BallInput::runs(runs),
        };
        if let Some(wicket_type) = INPUT_DISMISSALS.get(dismissal) {
            ball.is_wicket = true;
            ball.wicket_type = Some(*wicket_type);
        }
        ball.misconduct = misconduct;
        ball
    })
}

fn check_totals(m: &Match, rules: &ScoringRules) -> Result<(), TestCaseError> {
    for innings in &m.innings {
        let summed: i32 = innings
            .overs
            .iter()
            .flat_map(|o| o.balls.iter())
            .map(|b| b.effective_runs)
            .sum();
        let wickets = innings
            .overs
            .iter()
            .flat_map(|o| o.balls.iter())
            .filter(|b| b.is_wicket)
            .count() as u32;

        prop_assert_eq!(innings.total_runs, summed);
        prop_assert_eq!(innings.total_wickets, wickets);
        prop_assert_eq!(innings.no_wicket_bonus, wickets == 0);
        let bonus = if innings.no_wicket_bonus { rules.config.no_wicket_bonus } else { 0 };
        prop_assert_eq!(innings.final_score, innings.total_runs + bonus);
        prop_assert_eq!(innings.totals(), recompute_innings_totals(&innings.overs, &rules.config));
    }
    Ok(())
}

fn innings_with(team_byte: u8, runs: i32, wickets: u32) -> Innings {
    let mut innings = Innings::new(
        InningsId::new([team_byte; 16]),
        team(team_byte),
        [PlayerId::new([0; 16]), PlayerId::new([1; 16])],
        Vec::new(),
    );
    innings.total_runs = runs;
    innings.total_wickets = wickets;
    innings.no_wicket_bonus = wickets == 0;
    innings.final_score = runs + if wickets == 0 { 10 } else { 0 };
    innings
}

proptest! {
    // 1. Totals always equal the sum of recorded effective runs
    #[test]
    fn totals_match_ball_sequence(
        balls in prop::collection::vec(ball_strategy(), 0..60),
        powerplay in prop::option::of(0..3u8),
    ) {
        let rules = ScoringRules::default();
        let mut m = started_match(&rules, powerplay);
        let at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();

        for ball in &balls {
            if !can_record(&m, &rules) {
                break;
            }
            m = reduce(&m, &MatchAction::RecordBall(ball.clone()), &rules, at).unwrap().snapshot;
            check_totals(&m, &rules)?;
        }
    }

    // 2. Undo keeps totals consistent
    #[test]
    fn undo_keeps_totals_consistent(
        balls in prop::collection::vec(ball_strategy(), 1..12),
        undos in 0..6usize,
    ) {
        let rules = ScoringRules::default();
        let mut m = started_match(&rules, None);
        let at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();

        for ball in &balls {
            if !can_record(&m, &rules) {
                break;
            }
            m = reduce(&m, &MatchAction::RecordBall(ball.clone()), &rules, at).unwrap().snapshot;
        }
        for _ in 0..undos {
            if !can_record(&m, &rules) {
                break;
            }
            m = reduce(&m, &MatchAction::UndoLastBall, &rules, at).unwrap().snapshot;
            check_totals(&m, &rules)?;
        }
    }

    // 3. Powerplay scales every value by the multiplier
    #[test]
    fn powerplay_scales_effective_runs(ball in ball_strategy()) {
        let rules = ScoringRules::default();
        let normal = compute_effective_runs(&ball, false, &rules.config);
        let powered = compute_effective_runs(&ball, true, &rules.config);
        prop_assert_eq!(powered, normal * rules.config.powerplay_multiplier);
    }

    // 4. Every innings is bowled by the other three teams, once per over slot
    #[test]
    fn rotation_is_a_latin_square(shuffled in Just(vec![1u8, 2, 3, 4]).prop_shuffle()) {
        let order: [u8; TEAMS_PER_MATCH] = [shuffled[0], shuffled[1], shuffled[2], shuffled[3]];
        let rotation = match_rotation(&order);

        for (i, bowlers) in rotation.iter().enumerate() {
            let set: BTreeSet<u8> = bowlers.iter().copied().collect();
            prop_assert_eq!(set.len(), 3);
            prop_assert!(!set.contains(&order[i]));
        }
        for slot in 0..3 {
            let column: BTreeSet<u8> = rotation.iter().map(|b| b[slot]).collect();
            prop_assert_eq!(column.len(), TEAMS_PER_MATCH);
        }
        for bowler in order {
            let overs = rotation.iter().flatten().filter(|t| **t == bowler).count();
            prop_assert_eq!(overs, 3);
        }
    }

    // 5. Ranks are a permutation of 1..=4 with the fixed points table
    #[test]
    fn ranking_is_a_permutation(
        scores in prop::array::uniform4((-20..60i32, 0..5u32)),
    ) {
        let innings: Vec<Innings> = scores
            .iter()
            .enumerate()
            .map(|(i, (runs, wickets))| innings_with(i as u8 + 1, *runs, *wickets))
            .collect();
        let ranking = rank(&innings);

        let ranks: Vec<u8> = ranking.iter().map(|r| r.rank).collect();
        prop_assert_eq!(ranks, vec![1, 2, 3, 4]);
        let teams: BTreeSet<TeamId> = ranking.iter().map(|r| r.team_id).collect();
        prop_assert_eq!(teams.len(), TEAMS_PER_MATCH);
        for r in &ranking {
            prop_assert_eq!(r.points, POINTS_BY_RANK[r.rank as usize - 1]);
        }
        for pair in ranking.windows(2) {
            prop_assert!(pair[0].final_score >= pair[1].final_score);
        }
        prop_assert_eq!(ranking.iter().map(|r| r.points as u32).sum::<u32>(), 9);
    }

    // 6. Ranking ignores input order
    #[test]
    fn ranking_ignores_input_order(
        scores in prop::array::uniform4((-20..60i32, 0..5u32)),
    ) {
        let innings: Vec<Innings> = scores
            .iter()
            .enumerate()
            .map(|(i, (runs, wickets))| innings_with(i as u8 + 1, *runs, *wickets))
            .collect();
        let mut reversed = innings.clone();
        reversed.reverse();

        prop_assert_eq!(rank(&innings), rank(&reversed));
    }
}
