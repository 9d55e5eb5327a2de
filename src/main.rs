//! Quad Cricket Demo
//!
//! Runs a full group-based tournament in memory: league, semifinals and
//! final, with every ball simulated from a fixed seed.

use std::sync::Arc;
use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use quad_cricket::{
    MatchId, PlayerId, RetryPolicy, RulesConfig, ScoringRules, SessionManager, TeamId, Tournament,
    TournamentId, VERSION,
    core::ids::derive_id,
    scoring::sim::Simulator,
    store::{MemoryStore, SnapshotStore},
    tournament::{BracketFormat, Team},
};

const TEAM_NAMES: [&str; 16] = [
    "Anchors", "Badgers", "Comets", "Dragons",
    "Eagles", "Falcons", "Gales", "Hornets",
    "Ibis", "Jaguars", "Kestrels", "Lynx",
    "Mavericks", "Nomads", "Otters", "Pumas",
];

const GROUP_LABELS: [&str; 4] = ["A", "B", "C", "D"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Quad Cricket v{}", VERSION);

    let config = match std::env::var("QC_RULES_FILE") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading rules file {path}"))?;
            RulesConfig::from_json_str(&json).with_context(|| format!("parsing rules file {path}"))?
        }
        Err(_) => RulesConfig::from_env(),
    };
    info!(?config, "scoring rules");

    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(store, ScoringRules::new(config), RetryPolicy::from_env());

    let tournament = demo_tournament();
    let tournament_id = tournament.id;
    manager.register_tournament(tournament.clone()).await?;

    // Two league rounds per group
    let BracketFormat::GroupBased { groups } = &tournament.format else {
        anyhow::bail!("demo tournament must be group based");
    };
    for members in groups.values() {
        let fixture: [TeamId; 4] = members.as_slice().try_into()?;
        for round in 0..2 {
            let mut order = fixture;
            order.rotate_left(round);
            let scheduled = manager.schedule_league_match(&tournament_id, order).await?;
            play_match(&manager, &tournament, scheduled.id).await?;
        }
    }

    let groups = manager.group_standings(&tournament_id).await?;
    println!("{}", serde_json::to_string_pretty(&groups)?);

    loop {
        let status = manager.tournament_status(&tournament_id).await?;
        if let Some(champion) = status.champion {
            info!(champion = %tournament.team_name(&champion), "tournament complete");
            let podium: Vec<String> = status.podium.iter().map(|t| tournament.team_name(t)).collect();
            println!("{}", serde_json::to_string_pretty(&podium)?);
            break;
        }

        let created = manager.generate_next_stage(&tournament_id).await?;
        for m in created {
            let names: Vec<String> = m.team_ids.iter().map(|t| tournament.team_name(t)).collect();
            info!(stage = m.stage.label(), slot = m.slot, teams = ?names, "playing");
            play_match(&manager, &tournament, m.id).await?;
        }
    }

    Ok(())
}

/// Sixteen teams of three players in four groups.
fn demo_tournament() -> Tournament {
    let id = TournamentId::new(derive_id(b"quad-cricket-demo:", &[b"tournament"]));
    let teams: Vec<Team> = TEAM_NAMES
        .iter()
        .map(|name| {
            let team_id = TeamId::new(derive_id(b"quad-cricket-demo:team:", &[name.as_bytes()]));
            let players = (0..3u8)
                .map(|p| PlayerId::new(derive_id(b"quad-cricket-demo:player:", &[name.as_bytes(), &[p]])))
                .collect();
            Team::new(team_id, *name, players)
        })
        .collect();

    let groups = GROUP_LABELS
        .iter()
        .enumerate()
        .map(|(g, label)| (label.to_string(), teams[g * 4..g * 4 + 4].iter().map(|t| t.id).collect()))
        .collect();

    teams
        .into_iter()
        .fold(Tournament::new(id, "Demo Cup", BracketFormat::GroupBased { groups }), Tournament::with_team)
}

/// Play a scheduled match to the end and lock the result.
async fn play_match(manager: &SessionManager, tournament: &Tournament, match_id: MatchId) -> anyhow::Result<()> {
    let handle = manager.open_session(match_id).await?;
    {
        let mut session = handle.write().await;
        let lineups = tournament.lineups_for(&session.snapshot().team_ids);
        session.mark_ready(lineups).await?;

        let seed = u64::from_le_bytes(match_id.0[..8].try_into()?);
        let mut sim = Simulator::new(seed);
        while let Some(action) = sim.next_action(session.snapshot(), manager.rules()) {
            session.apply(action).await?;
        }
        session.lock().await?;

        for ranking in &session.snapshot().rankings {
            info!(
                rank = ranking.rank,
                team = %tournament.team_name(&ranking.team_id),
                final_score = ranking.final_score,
                points = ranking.points,
                "result"
            );
        }
    }
    manager.close_session(&match_id).await?;
    Ok(())
}
