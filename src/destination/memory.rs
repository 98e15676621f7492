//! In-process destination: applies upserts keyed by (`source`, `published_at`) and
//! commits them at each checkpoint.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::{Stream, StreamExt};

use crate::ingest::types::{Article, ArticleKey, Operation};
use crate::ingest::watermark::WatermarkStore;
use crate::state::SyncState;

#[derive(Debug, Default)]
struct Inner {
    committed: BTreeMap<ArticleKey, Article>,
    staged: Vec<Article>,
    state: SyncState,
    checkpoints: usize,
}

#[derive(Debug, Default)]
pub struct MemoryDestination {
    inner: Mutex<Inner>,
}

/// Counts for one drained run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub upserts: usize,
    pub checkpoints: usize,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed committed state, e.g. the host's last persisted checkpoint.
    pub fn with_state(state: SyncState) -> Self {
        let d = Self::default();
        d.inner.lock().expect("destination mutex poisoned").state = state;
        d
    }

    pub fn apply(&self, op: &Operation) {
        let mut g = self.inner.lock().expect("destination mutex poisoned");
        match op {
            Operation::Upsert { data, .. } => g.staged.push(data.clone()),
            Operation::Checkpoint { state } => {
                let staged = std::mem::take(&mut g.staged);
                for article in staged {
                    g.committed.insert(article.key(), article);
                }
                g.state = state.clone();
                g.checkpoints += 1;
            }
        }
    }

    /// Drop upserts not yet covered by a checkpoint. Returns how many were dropped.
    pub fn rollback(&self) -> usize {
        let mut g = self.inner.lock().expect("destination mutex poisoned");
        let n = g.staged.len();
        g.staged.clear();
        n
    }

    /// Committed rows, ordered by key.
    pub fn rows(&self) -> Vec<Article> {
        let g = self.inner.lock().expect("destination mutex poisoned");
        g.committed.values().cloned().collect()
    }

    pub fn get(&self, source: &str, published_at: DateTime<Utc>) -> Option<Article> {
        let g = self.inner.lock().expect("destination mutex poisoned");
        g.committed
            .get(&(source.to_string(), published_at))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("destination mutex poisoned").committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last committed state.
    pub fn state(&self) -> SyncState {
        self.inner.lock().expect("destination mutex poisoned").state.clone()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.inner.lock().expect("destination mutex poisoned").checkpoints
    }
}

/// Consume a run's operations in order. On a fatal error the uncommitted tail is rolled
/// back and the error returned; committed checkpoints stay.
pub async fn drain_into<S>(mut ops: S, dest: &MemoryDestination) -> Result<DrainSummary>
where
    S: Stream<Item = Result<Operation>> + Unpin,
{
    let mut summary = DrainSummary::default();
    while let Some(item) = ops.next().await {
        match item {
            Ok(op) => {
                match &op {
                    Operation::Upsert { .. } => summary.upserts += 1,
                    Operation::Checkpoint { .. } => summary.checkpoints += 1,
                }
                dest.apply(&op);
            }
            Err(e) => {
                let dropped = dest.rollback();
                tracing::debug!(dropped, "rolled back uncommitted upserts");
                return Err(e);
            }
        }
    }
    Ok(summary)
}

#[async_trait::async_trait]
impl WatermarkStore for MemoryDestination {
    /// Single-table store: `table` is not consulted.
    async fn max_published_at(&self, _table: &str) -> Result<Option<NaiveDateTime>> {
        let g = self.inner.lock().expect("destination mutex poisoned");
        Ok(g.committed
            .values()
            .map(|a| a.published_at.naive_utc())
            .max())
    }
}
