use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use rps_duel::config::MatchConfig;
use rps_duel::engine::Move;
use rps_duel::game::{MatchCoordinator, MatchSnapshot, Phase};
use rps_duel::store::{DocumentStore, InMemoryDocumentStore};

mod common;

const LOG_TARGET: &str = "bin::duel_demo";
const TAUNTS: [&str; 4] = ["too easy", "again?", "", "gg"];

#[derive(Debug, Parser)]
#[command(name = "duel_demo")]
#[command(about = "Two scripted bots play a full duel over the in-memory store", long_about = None)]
struct Args {
    /// Room code to play in
    #[arg(long, default_value = "DEMO")]
    code: String,

    /// Length of one timing unit in milliseconds
    #[arg(long, env = "DUEL_UNIT_MS", default_value_t = 50)]
    unit_ms: u64,

    /// Optional RNG seed for reproducible games
    #[arg(long)]
    seed: Option<u64>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "DUEL_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    common::load_dotenv();
    let args = Args::parse();
    common::init_tracing(args.json)?;

    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    let config = MatchConfig::default()
        .with_unit(Duration::from_millis(args.unit_ms))
        .with_auto_next_round(true);

    let ann = MatchCoordinator::spawn(config.clone(), Arc::clone(&store));
    let bo = MatchCoordinator::spawn(config, Arc::clone(&store));

    ann.create_room("Ann", &args.code).await?;
    bo.join_room("Bo", &args.code).await?;

    let seed = args.seed.unwrap_or_else(rand::random);
    info!(target: LOG_TARGET, seed, room = %args.code, "starting demo duel");
    let (ann_done, bo_done) = tokio::join!(
        play("Ann", &ann, StdRng::seed_from_u64(seed)),
        play("Bo", &bo, StdRng::seed_from_u64(seed.wrapping_add(1))),
    );
    let ann_final = ann_done?;
    let bo_final = bo_done?;

    println!("{}", common::describe("Ann", &ann_final));
    println!("{}", common::describe("Bo", &bo_final));

    ann.leave_and_reset().await?;
    ann.shutdown().await?;
    bo.shutdown().await?;
    Ok(())
}

/// Plays rounds until the session is over and returns the final snapshot.
async fn play(
    label: &str,
    coordinator: &MatchCoordinator,
    mut rng: StdRng,
) -> Result<MatchSnapshot> {
    let mut rounds_played = 0;
    loop {
        let snapshot = coordinator
            .wait_for(|s| {
                matches!(s.phase, Phase::GameOver | Phase::Login)
                    || (s.phase == Phase::Selecting && s.round > rounds_played)
            })
            .await?;
        match snapshot.phase {
            Phase::GameOver => return Ok(snapshot),
            Phase::Login => return Err(anyhow!("{label} was sent back to the lobby")),
            _ => {}
        }
        rounds_played = snapshot.round;

        let choice = *Move::ALL.choose(&mut rng).unwrap_or(&Move::Rock);
        // Now and then a bot dawdles past the deadline.
        if rng.gen_bool(0.1) {
            coordinator.select_move(choice).await?;
            info!(
                target: LOG_TARGET,
                player = label,
                round = rounds_played,
                "letting the clock run out"
            );
            continue;
        }
        let taunt = TAUNTS.choose(&mut rng).copied().unwrap_or_default();
        coordinator.select_move(choice).await?;
        coordinator.set_message(taunt).await?;
        coordinator.confirm().await?;
        println!("{}", common::describe(label, &coordinator.snapshot()));
    }
}
