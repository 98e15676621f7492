//! news-sync: local debug runner.
//! Runs one sync the way the scheduling host would: reads configuration and the last
//! state, prints every operation as a JSON line, and persists the final checkpoint.
//!
//! `news-sync schema` prints the table definitions instead.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_sync::config::{self, env::ensure_configuration};
use news_sync::destination::{drain_into, MemoryDestination};
use news_sync::state::{load_state, save_state};

const ENV_STATE_PATH: &str = "NEWS_SYNC_STATE";
const DEFAULT_STATE_PATH: &str = "state.json";

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
/// Filter from `RUST_LOG`, else `news_sync=info,warn`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_sync=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // stdout carries the operations; logs go to stderr.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn state_path() -> PathBuf {
    std::env::var(ENV_STATE_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_PATH))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config_path = config::default_path();
    ensure_configuration(&config_path, Path::new(".env"))?;
    let cfg = config::load_default()?;
    tracing::debug!(config = ?cfg, "configuration loaded");

    if std::env::args().nth(1).as_deref() == Some("schema") {
        println!("{}", serde_json::to_string_pretty(&news_sync::schema(&cfg))?);
        return Ok(());
    }

    let state_path = state_path();
    let state = load_state(&state_path)?;
    let destination = MemoryDestination::with_state(state.clone());

    let ops = news_sync::update(&cfg, state)?.inspect(|item| {
        if let Ok(op) = item {
            match serde_json::to_string(op) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "could not render operation"),
            }
        }
    });
    let summary = drain_into(ops, &destination).await?;

    save_state(&state_path, &destination.state())
        .with_context(|| format!("persisting state to {}", state_path.display()))?;
    tracing::info!(
        upserts = summary.upserts,
        checkpoints = summary.checkpoints,
        rows = destination.len(),
        state = ?destination.state(),
        "sync finished"
    );
    Ok(())
}
