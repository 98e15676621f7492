// src/ingest/watermark.rs
//! Query window resolution.
//!
//! The window start is the minimum of three candidates:
//! 1. `to_ts` from the host state (end of the last successful run),
//! 2. `max(published_at)` currently stored in the destination,
//! 3. now - 2 days.
//!
//! A stale or missing signal is covered by the others, and the fallback makes every
//! run look back at least two days.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::state::{format_ts, truncate_to_secs, SyncState};

/// How far back the fallback candidate reaches.
pub fn fallback_lookback() -> Duration {
    Duration::days(2)
}

/// Which destination table the live watermark is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationTarget {
    #[default]
    #[serde(alias = "production")]
    Prod,
    #[serde(alias = "tester")]
    Test,
}

impl DestinationTarget {
    pub fn article_table(self) -> &'static str {
        match self {
            DestinationTarget::Prod => "article",
            DestinationTarget::Test => "tester.article",
        }
    }
}

/// `start` is inclusive; `end` is the run's time snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl QueryWindow {
    pub fn from_param(&self) -> String {
        format_ts(&self.start)
    }

    pub fn to_param(&self) -> String {
        format_ts(&self.end)
    }
}

/// Live lookup of the newest stored article.
#[async_trait::async_trait]
pub trait WatermarkStore: Send + Sync {
    /// `max(published_at)` of `table`, UTC. `Ok(None)` for an empty table.
    async fn max_published_at(&self, table: &str) -> Result<Option<NaiveDateTime>>;
}

/// Minimum of the present candidates. All absent is a bug, not an unbounded window.
pub fn pick_window_start(candidates: &[Option<NaiveDateTime>]) -> Result<NaiveDateTime> {
    candidates
        .iter()
        .flatten()
        .min()
        .copied()
        .ok_or_else(|| anyhow!("no watermark candidate available; refusing an unbounded window"))
}

pub struct WatermarkResolver {
    store: Option<Arc<dyn WatermarkStore>>,
    target: DestinationTarget,
}

impl WatermarkResolver {
    pub fn new(store: Option<Arc<dyn WatermarkStore>>, target: DestinationTarget) -> Self {
        Self { store, target }
    }

    pub fn with_store(mut self, store: Arc<dyn WatermarkStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Destination candidate. Any failure degrades to `None`.
    pub async fn destination_max(&self) -> Option<NaiveDateTime> {
        let store = self.store.as_ref()?;
        let table = self.target.article_table();
        match store.max_published_at(table).await {
            Ok(v) => v.map(truncate_to_secs),
            Err(e) => {
                counter!("sync_watermark_lookup_failures_total").increment(1);
                tracing::warn!(error = ?e, table, "destination watermark lookup failed; ignoring it");
                None
            }
        }
    }

    pub async fn resolve(&self, state: &SyncState, now: DateTime<Utc>) -> Result<QueryWindow> {
        let end = truncate_to_secs(now.naive_utc());
        let from_state = state.to_ts().context("invalid to_ts in run state")?;
        let from_destination = self.destination_max().await;
        let fallback = end - fallback_lookback();

        let start = pick_window_start(&[from_state, from_destination, Some(fallback)])?;
        tracing::debug!(
            from_state = ?from_state.map(|t| format_ts(&t)),
            from_destination = ?from_destination.map(|t| format_ts(&t)),
            fallback = %format_ts(&fallback),
            start = %format_ts(&start),
            end = %format_ts(&end),
            "query window resolved"
        );
        Ok(QueryWindow { start, end })
    }
}
