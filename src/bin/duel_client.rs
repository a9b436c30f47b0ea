use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use url::Url;

use rps_duel::config::{MatchConfig, RetryPolicy};
use rps_duel::engine::Move;
use rps_duel::game::{MatchCoordinator, MatchError};
use rps_duel::store::{DocumentStore, FirebaseDocumentStore, FirebaseStoreConfig};

mod common;

const LOG_TARGET: &str = "bin::duel_client";

#[derive(Debug, Parser)]
#[command(name = "duel_client")]
#[command(about = "Play a rock/paper/scissors duel against another terminal", long_about = None)]
struct Args {
    /// Firebase Realtime Database root, e.g. https://my-app.firebaseio.com
    #[arg(long, env = "FIREBASE_DATABASE_URL")]
    database_url: String,

    /// Database secret or ID token passed as the `auth` query parameter
    #[arg(long, env = "FIREBASE_AUTH")]
    auth: Option<String>,

    /// Length of one timing unit in milliseconds
    #[arg(long, env = "DUEL_UNIT_MS", default_value_t = 1000)]
    unit_ms: u64,

    /// Idle time after which a room counts as abandoned
    #[arg(long, env = "DUEL_SESSION_TTL_SECS", default_value_t = 300)]
    session_ttl_secs: u64,

    /// Attempts per store write before giving up
    #[arg(long, env = "DUEL_WRITE_ATTEMPTS", default_value_t = 3)]
    write_attempts: u32,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "DUEL_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    common::load_dotenv();
    let args = Args::parse();
    common::init_tracing(args.json)?;

    let store = build_store(&args)?;
    let config = MatchConfig::default()
        .with_unit(Duration::from_millis(args.unit_ms))
        .with_session_ttl(Duration::from_secs(args.session_ttl_secs))
        .with_retry(RetryPolicy {
            attempts: args.write_attempts,
            ..RetryPolicy::default()
        });
    let coordinator = MatchCoordinator::spawn(config, store);

    let mut snapshots = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let line = common::describe("you", &snapshots.borrow_and_update());
            println!("{line}");
        }
    });

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(target: LOG_TARGET, "Ctrl+C received; leaving");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match handle_line(&coordinator, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => match err.downcast_ref::<MatchError>() {
                        Some(MatchError::Room(room)) if room.is_input_error() => {
                            println!("{room}; try again")
                        }
                        _ => println!("error: {err}"),
                    },
                }
            }
        }
    }

    coordinator.leave_and_reset().await.ok();
    coordinator.shutdown().await?;
    printer.abort();
    Ok(())
}

fn build_store(args: &Args) -> Result<Arc<dyn DocumentStore>> {
    let url = Url::parse(&args.database_url).context("invalid FIREBASE_DATABASE_URL")?;
    let mut cfg = FirebaseStoreConfig::new(url);
    if let Some(auth) = &args.auth {
        cfg = cfg.with_auth(auth.clone());
    } else {
        warn!(target: LOG_TARGET, "no FIREBASE_AUTH set; relying on open database rules");
    }
    let store = FirebaseDocumentStore::new(cfg).context("failed to build Firebase client")?;
    Ok(Arc::new(store))
}

fn print_help() {
    println!("commands:");
    println!("  create <name> <code>   open a room");
    println!("  join <name> <code>     join a waiting room");
    println!("  pick <rock|paper|scissors>");
    println!("  say <message>          shown if you win or tie");
    println!("  confirm                lock in your pick");
    println!("  next                   ready for the next round");
    println!("  leave                  leave the room");
    println!("  quit");
}

/// Returns `false` when the user asked to quit.
async fn handle_line(coordinator: &MatchCoordinator, line: &str) -> Result<bool> {
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    match verb {
        "" => {}
        "create" | "join" => {
            let (name, code) = rest
                .trim()
                .rsplit_once(' ')
                .ok_or_else(|| anyhow!("usage: {verb} <name> <code>"))?;
            let entry = if verb == "create" {
                coordinator.create_room(name, code).await?
            } else {
                coordinator.join_room(name, code).await?
            };
            println!("seated as {} in room {}", entry.role, entry.code);
        }
        "pick" => {
            let choice: Move = rest.parse().map_err(|err: String| anyhow!(err))?;
            coordinator.select_move(choice).await?;
        }
        "say" => coordinator.set_message(rest.trim()).await?,
        "confirm" => coordinator.confirm().await?,
        "next" => coordinator.request_next_round().await?,
        "leave" => coordinator.leave_and_reset().await?,
        "quit" | "exit" => return Ok(false),
        "help" => print_help(),
        other => println!("unknown command `{other}`; try `help`"),
    }
    Ok(true)
}
