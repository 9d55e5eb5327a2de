//! End-to-end tests: matches scored ball by ball, then carried through
//! standings and stage generation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use quad_cricket::core::ids::{MatchId, PlayerId, TeamId, TournamentId};
use quad_cricket::scoring::engine::{MatchAction, reduce};
use quad_cricket::scoring::sim::simulate_match;
use quad_cricket::scoring::state::{BallInput, Match, MatchPhase, Stage, WicketType};
use quad_cricket::store::{MemoryStore, SnapshotStore};
use quad_cricket::tournament::progression;
use quad_cricket::{
    BracketError, BracketFormat, RetryPolicy, ScoringRules, SessionError, SessionManager, Team, Tournament,
};

const BALLS_PER_INNINGS: usize = 18;

fn team(n: u8) -> TeamId {
    TeamId::new([n; 16])
}

fn players(n: u8) -> Vec<PlayerId> {
    (0..3u8)
        .map(|p| {
            let mut bytes = [n; 16];
            bytes[15] = p;
            PlayerId::new(bytes)
        })
        .collect()
}

/// Eighteen legal balls: the given scoring shots, `wickets` bowled, dots after.
fn innings_balls(shots: &[u8], wickets: usize) -> Vec<BallInput> {
    let mut balls: Vec<BallInput> = shots.iter().map(|r| BallInput::runs(*r)).collect();
    balls.extend((0..wickets).map(|_| BallInput::wicket(WicketType::Bowled)));
    balls.resize(BALLS_PER_INNINGS, BallInput::dot());
    balls
}

#[test]
fn test_four_innings_rank_and_points() {
    let rules = ScoringRules::default();
    let at = Utc::now();
    let (a, b, c, d) = (team(1), team(2), team(3), team(4));
    let lineups: BTreeMap<TeamId, Vec<PlayerId>> = [a, b, c, d].iter().map(|t| (*t, players(t.0[0]))).collect();

    let mut m = Match::new(MatchId::new([1; 16]), [a, b, c, d], Stage::League);
    for action in [
        MatchAction::MarkReady { lineups },
        MatchAction::Toss { batting_order: [a, b, c, d] },
        MatchAction::Start,
    ] {
        m = reduce(&m, &action, &rules, at).unwrap().snapshot;
    }

    // A 40/0, B 35/2, C 35/1, D 20/3
    let script = [
        innings_balls(&[6, 6, 6, 6, 6, 6, 4], 0),
        innings_balls(&[6, 6, 6, 6, 6, 5], 2),
        innings_balls(&[6, 6, 6, 6, 6, 5], 1),
        innings_balls(&[6, 6, 6, 2], 3),
    ];
    for ball in script.iter().flatten() {
        m = reduce(&m, &MatchAction::RecordBall(ball.clone()), &rules, at).unwrap().snapshot;
    }

    assert_eq!(m.state, MatchPhase::Completed);
    let finals: Vec<(i32, u32, i32)> = m
        .innings
        .iter()
        .map(|i| (i.total_runs, i.total_wickets, i.final_score))
        .collect();
    assert_eq!(finals, vec![(40, 0, 50), (35, 2, 35), (35, 1, 35), (20, 3, 20)]);

    let order: Vec<TeamId> = m.rankings.iter().map(|r| r.team_id).collect();
    assert_eq!(order, vec![a, c, b, d]);
    assert_eq!(m.rankings.iter().map(|r| r.points).collect::<Vec<_>>(), vec![5, 3, 1, 0]);

    // Bowled dismissals go to the bowling team of the over
    let credited: u32 = m.rankings.iter().map(|r| r.dismissals).sum();
    assert_eq!(credited, 6);

    let locked = reduce(&m, &MatchAction::Lock, &rules, at).unwrap().snapshot;
    assert_eq!(locked.state, MatchPhase::Locked);
    assert!(reduce(&locked, &MatchAction::RecordBall(BallInput::dot()), &rules, at).is_err());
}

fn group_tournament() -> Tournament {
    let groups: BTreeMap<String, Vec<TeamId>> = ["A", "B", "C", "D"]
        .iter()
        .enumerate()
        .map(|(g, label)| (label.to_string(), (1..=4u8).map(|n| team(g as u8 * 4 + n)).collect()))
        .collect();

    (1..=16u8).fold(
        Tournament::new(TournamentId::new([30; 16]), "Group Cup", BracketFormat::GroupBased { groups }),
        |t, n| t.with_team(Team::new(team(n), format!("Team {n}"), players(n))),
    )
}

fn play(store: &MemoryStore, tournament: &Tournament, scheduled: &Match, seed: u64) {
    let rules = ScoringRules::default();
    let lineups = tournament.lineups_for(&scheduled.team_ids);
    let played = simulate_match(scheduled, lineups, &rules, seed, Utc::now()).unwrap();
    store.save_match(&played.snapshot).unwrap();
}

#[test]
fn test_group_semifinals_take_top_two_per_group() {
    let store = MemoryStore::new();
    let tournament = group_tournament();
    let tid = tournament.id;
    store.save_tournament(&tournament).unwrap();

    // Semifinals cannot be generated before the league finishes
    let BracketFormat::GroupBased { groups } = &tournament.format else {
        unreachable!()
    };
    let mut league = Vec::new();
    for members in groups.values() {
        let fixture = [members[0], members[1], members[2], members[3]];
        league.push(progression::schedule_league_match(&store, &tid, fixture).unwrap());
    }
    let err = progression::generate_next_stage(&store, &tid).unwrap_err();
    assert!(matches!(
        err,
        BracketError::PrerequisiteIncomplete { stage: Stage::Semifinal, completed: 0, expected: 4, .. }
    ));

    for (seed, scheduled) in league.iter().enumerate() {
        play(&store, &tournament, scheduled, seed as u64 + 1);
    }

    let tables = progression::group_standings(&store, &tid).unwrap();
    let pick = |label: &str, rank: usize| tables[label][rank - 1].team_id;

    let semis = progression::generate_next_stage(&store, &tid).unwrap();
    assert_eq!(semis.len(), 2);
    assert_eq!(semis[0].team_ids, [pick("A", 1), pick("B", 2), pick("C", 1), pick("D", 2)]);
    assert_eq!(semis[1].team_ids, [pick("B", 1), pick("A", 2), pick("D", 1), pick("C", 2)]);
    assert!(semis.iter().all(|m| m.stage == Stage::Semifinal));

    // Generating again is rejected and creates nothing
    let before = store.match_count();
    let again = progression::generate_stage(&store, &tid, Stage::Semifinal).unwrap_err();
    assert!(matches!(again, BracketError::StageAlreadyExists(Stage::Semifinal)));
    assert_eq!(store.match_count(), before);

    // Final needs both semifinals
    let err = progression::generate_stage(&store, &tid, Stage::Final).unwrap_err();
    assert!(matches!(err, BracketError::PrerequisiteIncomplete { stage: Stage::Final, .. }));

    for (seed, scheduled) in semis.iter().enumerate() {
        play(&store, &tournament, scheduled, seed as u64 + 100);
    }
    let finals = progression::generate_next_stage(&store, &tid).unwrap();
    assert_eq!(finals.len(), 1);

    let mut finalists: Vec<TeamId> = semis
        .iter()
        .flat_map(|s| {
            let stored = store.load_match(&s.id).unwrap().unwrap();
            [stored.team_at_rank(1).unwrap(), stored.team_at_rank(2).unwrap()]
        })
        .collect();
    let mut drawn = finals[0].team_ids.to_vec();
    finalists.sort();
    drawn.sort();
    assert_eq!(drawn, finalists);

    play(&store, &tournament, &finals[0], 7);
    let status = progression::get_status(&store, &tid).unwrap();
    assert_eq!(status.podium.len(), 4);
    assert_eq!(status.champion, status.podium.first().copied());
    assert!(matches!(
        progression::generate_next_stage(&store, &tid),
        Err(BracketError::TournamentFinished)
    ));
}

#[tokio::test]
async fn test_random_match_through_session_manager() {
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(store, ScoringRules::default(), RetryPolicy::immediate(3));
    let tournament = (1..=4u8).fold(
        Tournament::new(TournamentId::new([40; 16]), "Random Cup", BracketFormat::RankBased),
        |t, n| t.with_team(Team::new(team(n), format!("Team {n}"), players(n))),
    );
    let tid = tournament.id;
    manager.register_tournament(tournament.clone()).await.unwrap();

    let teams = [team(1), team(2), team(3), team(4)];
    let scheduled = manager.schedule_league_match(&tid, teams).await.unwrap();

    let mut rng = StdRng::seed_from_u64(2024);
    let handle = manager.open_session(scheduled.id).await.unwrap();
    {
        let mut session = handle.write().await;
        let mut events = session.subscribe();
        session.mark_ready(tournament.lineups_for(&teams)).await.unwrap();
        session.toss([team(2), team(4), team(1), team(3)]).await.unwrap();
        session.start().await.unwrap();
        session.select_powerplay(rng.gen_range(0..3)).await.unwrap();

        while session.can_record() {
            let mut ball = match rng.gen_range(0..10) {
                0 => BallInput::wide(),
                1 => BallInput::noball(rng.gen_range(0..=6)),
                _ => BallInput::runs(rng.gen_range(0..=6)),
            };
            if rng.gen_bool(0.15) {
                ball.is_wicket = true;
                ball.wicket_type = Some(WicketType::Caught);
                ball.fielding_team_id = Some(teams[rng.gen_range(0..4)]);
            }
            session.record_ball(ball).await.unwrap();

            for i in &session.snapshot().innings {
                let summed: i32 = i.overs.iter().flat_map(|o| o.balls.iter()).map(|b| b.effective_runs).sum();
                assert_eq!(i.total_runs, summed);
            }
        }

        assert_eq!(session.snapshot().state, MatchPhase::Completed);
        session.lock().await.unwrap();

        let mut completed = false;
        while let Ok(event) = events.try_recv() {
            completed |= event.is_match_completed();
        }
        assert!(completed);
    }
    manager.close_session(&scheduled.id).await.unwrap();

    let stored = manager.store().load_match(&scheduled.id).unwrap().unwrap();
    assert_eq!(stored.state, MatchPhase::Locked);
    assert_eq!(stored.rankings.len(), 4);

    let table = manager.league_standings(&tid).await.unwrap();
    assert_eq!(table.iter().map(|e| e.points).sum::<u32>(), 9);
    assert_eq!(table[0].team_id, stored.team_at_rank(1).unwrap());
    assert!(table.iter().all(|e| e.matches_played == 1));

    // A rank-based bracket needs twelve teams before quarterfinals
    let err = manager.generate_next_stage(&tid).await.unwrap_err();
    assert!(matches!(err, SessionError::Bracket(_)));
}
