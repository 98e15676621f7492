// src/ingest/mod.rs
//! Sync orchestrator: resolve the window once, then fetch → enrich → emit per topic,
//! then checkpoint.

pub mod providers;
pub mod types;
pub mod watermark;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, Stream, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::analyze::{enrich, Analyzer, TabulaClient};
use crate::config::Configuration;
use crate::destination::SnowflakeWatermarkStore;
use crate::ingest::providers::NewsApiProvider;
use crate::ingest::types::{Article, ArticleSource, Operation};
use crate::ingest::watermark::{WatermarkResolver, WatermarkStore};
use crate::state::{format_ts, SyncState};

/// Lazy, finite, single-pass sequence of operations for one run. Ends with `Err` at
/// most once, and nothing follows an `Err`.
pub type OperationStream<'a> = BoxStream<'a, Result<Operation>>;

/// Describe sync metrics once per process.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_runs_total", "Sync runs started.");
        describe_counter!("sync_topics_total", "Topics fetched.");
        describe_counter!(
            "sync_articles_fetched_total",
            "Raw articles returned by the news source."
        );
        describe_counter!("sync_articles_upserted_total", "Upsert operations emitted.");
        describe_counter!(
            "sync_enrichment_failures_total",
            "Articles emitted without linguistic scores."
        );
        describe_counter!(
            "sync_source_errors_total",
            "News source failures (each aborts a run)."
        );
        describe_counter!(
            "sync_watermark_lookup_failures_total",
            "Destination watermark lookups that failed and were ignored."
        );
        describe_histogram!("sync_fetch_ms", "News source fetch time in milliseconds.");
        describe_gauge!(
            "sync_last_success_ts",
            "Unix ts of the last run that reached its final checkpoint."
        );
    });
}

fn boxed<'a, S>(stream: S) -> OperationStream<'a>
where
    S: Stream<Item = Result<Operation>> + Send + 'a,
{
    Box::pin(stream)
}

pub struct Connector {
    source: Arc<dyn ArticleSource>,
    analyzer: Arc<dyn Analyzer>,
    resolver: WatermarkResolver,
    topics: Vec<String>,
}

impl Connector {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        analyzer: Arc<dyn Analyzer>,
        resolver: WatermarkResolver,
        topics: Vec<String>,
    ) -> Self {
        Self {
            source,
            analyzer,
            resolver,
            topics,
        }
    }

    /// Wire the real NewsAPI, Tabula Lingua and (if configured) Snowflake clients.
    pub fn from_config(cfg: &Configuration) -> Result<Self> {
        let http = cfg.http_client()?;
        let source = NewsApiProvider::new(
            http.clone(),
            &cfg.news_api_url,
            &cfg.news_api_key,
            cfg.page_size,
        );
        let analyzer = TabulaClient::new(http.clone(), &cfg.tabula_url, &cfg.tabula_key);
        let store = SnowflakeWatermarkStore::from_config(&cfg.snowflake, http)
            .map(|s| Arc::new(s) as Arc<dyn WatermarkStore>);
        if store.is_none() {
            tracing::debug!("snowflake not configured; destination watermark lookup disabled");
        }
        let resolver = WatermarkResolver::new(store, cfg.destination_target);
        Ok(Self::new(
            Arc::new(source),
            Arc::new(analyzer),
            resolver,
            cfg.topics(),
        ))
    }

    /// Replace the destination used for the live watermark lookup.
    pub fn with_watermark_store(mut self, store: Arc<dyn WatermarkStore>) -> Self {
        self.resolver = self.resolver.with_store(store);
        self
    }

    pub fn update(&self, state: SyncState) -> OperationStream<'_> {
        self.update_at(state, Utc::now())
    }

    /// Owning variant of [`Connector::update`].
    pub fn into_update(self, state: SyncState) -> OperationStream<'static> {
        boxed(try_stream! {
            let mut ops = self.update(state);
            while let Some(op) = ops.next().await {
                yield op?;
            }
        })
    }

    /// Same as [`Connector::update`] with an explicit time snapshot for the window end.
    pub fn update_at(&self, state: SyncState, now: DateTime<Utc>) -> OperationStream<'_> {
        ensure_metrics_described();
        let run = self.run(state, now).map(|item| {
            item.map_err(|err| {
                let err = err.context("article sync failed; run aborted without checkpoint");
                tracing::error!(error = ?err, "sync run failed");
                err
            })
        });
        boxed(run)
    }

    fn run(
        &self,
        state: SyncState,
        now: DateTime<Utc>,
    ) -> impl Stream<Item = Result<Operation>> + Send + '_ {
        try_stream! {
            counter!("sync_runs_total").increment(1);
            let window = self.resolver.resolve(&state, now).await?;
            tracing::info!(
                from = %window.from_param(),
                to = %window.to_param(),
                topics = self.topics.len(),
                "starting sync"
            );

            for topic in &self.topics {
                counter!("sync_topics_total").increment(1);
                let raw = self
                    .source
                    .fetch_topic(&window, topic)
                    .await
                    .map_err(|e| {
                        counter!("sync_source_errors_total").increment(1);
                        e
                    })
                    .with_context(|| format!("fetching topic {topic:?} from {}", self.source.name()))?;

                let fetched = raw.len();
                let mut unscored = 0usize;
                for item in raw {
                    let article = enrich(self.analyzer.as_ref(), Article::from_raw(topic, item)).await;
                    if article.scores.is_none() {
                        unscored += 1;
                    }
                    counter!("sync_articles_upserted_total").increment(1);
                    yield Operation::upsert(article);
                }
                tracing::info!(topic = %topic, fetched, unscored, "topic synced");

                // Progress marker only: carries the input state, not the new window.
                yield Operation::checkpoint(state.clone());
            }

            let new_state = SyncState::at(&window.end);
            tracing::debug!(to_ts = %format_ts(&window.end), "state updated, new state: {new_state:?}");
            gauge!("sync_last_success_ts").set(now.timestamp() as f64);
            yield Operation::checkpoint(new_state);
        }
    }
}
