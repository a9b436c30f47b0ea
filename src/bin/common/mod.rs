//! Helpers shared by the duel binaries.

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use rps_duel::game::{MatchSnapshot, Phase, Shown};

pub fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

pub fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

/// One-line rendering of a snapshot for terminal output.
pub fn describe(label: &str, s: &MatchSnapshot) -> String {
    let health = match (s.own_health, s.opponent_health) {
        (Some(own), Some(opp)) => format!(" hp {own}-{opp}"),
        (Some(own), None) => format!(" hp {own}"),
        _ => String::new(),
    };
    let detail = match s.phase {
        Phase::Login => s
            .notice
            .as_ref()
            .map(|n| format!(" ({n})"))
            .unwrap_or_default(),
        Phase::Waiting => format!(" room {}", s.room_code.as_deref().unwrap_or("?")),
        Phase::Selecting => format!(
            " round {} {}s left, pick {} / opponent {}",
            s.round,
            s.selection_countdown.unwrap_or(0),
            s.pending_selection
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".into()),
            if s.opponent_ready { "ready" } else { "thinking" },
        ),
        Phase::Revealing | Phase::RoundOver => {
            let shown = |m: Option<Shown>| m.map(|m| m.to_string()).unwrap_or_else(|| "?".into());
            let mut line = format!(
                " round {} {} vs {}",
                s.round,
                shown(s.reveal.own_move),
                shown(s.reveal.opponent_move)
            );
            if let Some(countdown) = s.reveal_countdown.filter(|c| *c > 0) {
                line.push_str(&format!(" reveal in {countdown}"));
            }
            if let Some(verdict) = s.reveal.verdict {
                line.push_str(&format!(" => {}", verdict.verdict()));
            }
            if let Some(messages) = &s.reveal.messages {
                for msg in [&messages.own, &messages.opponent].into_iter().flatten() {
                    line.push_str(&format!(" \"{msg}\""));
                }
            }
            line
        }
        Phase::GameOver => format!(
            " {}",
            s.final_outcome.map(|o| o.verdict()).unwrap_or("finished")
        ),
    };
    format!("[{label}] {:?}{health}{detail}", s.phase)
}
