//! Snowflake watermark lookup over the SQL REST API (`/api/v2/statements`).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::config::SnowflakeConfig;
use crate::ingest::watermark::WatermarkStore;

/// Server-side statement timeout, seconds.
const STATEMENT_TIMEOUT_SECS: u32 = 30;

pub struct SnowflakeWatermarkStore {
    http: reqwest::Client,
    statements_url: String,
    token: String,
    warehouse: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    role: Option<String>,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: String,
    timeout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Deserialize)]
struct StatementResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

impl SnowflakeWatermarkStore {
    /// `None` unless the config carries an account (or URL) and a token.
    pub fn from_config(cfg: &SnowflakeConfig, http: reqwest::Client) -> Option<Self> {
        if !cfg.is_enabled() {
            return None;
        }
        let base = match (&cfg.url, &cfg.account) {
            (Some(url), _) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            (_, Some(account)) => format!("https://{}.snowflakecomputing.com", account.trim()),
            _ => return None,
        };
        Some(Self {
            http,
            statements_url: format!("{base}/api/v2/statements"),
            token: cfg.token.clone().unwrap_or_default(),
            warehouse: cfg.warehouse.clone(),
            database: cfg.database.clone(),
            schema: cfg.schema.clone(),
            role: cfg.role.clone(),
        })
    }
}

/// Parse a timestamp cell. The SQL API returns epoch seconds with a fraction,
/// followed by a minute offset for `TIMESTAMP_TZ` (e.g. `"1704888000.000000000 1440"`).
pub fn parse_epoch_cell(cell: &str) -> Result<NaiveDateTime> {
    let first = cell
        .split_whitespace()
        .next()
        .context("empty timestamp cell")?;
    let secs = first.split('.').next().unwrap_or(first);
    let secs: i64 = secs
        .parse()
        .with_context(|| format!("timestamp cell {cell:?} is not epoch seconds"))?;
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .with_context(|| format!("timestamp {secs} out of range"))
}

#[async_trait::async_trait]
impl WatermarkStore for SnowflakeWatermarkStore {
    async fn max_published_at(&self, table: &str) -> Result<Option<NaiveDateTime>> {
        let req = StatementRequest {
            statement: format!("select max(published_at) from {table}"),
            timeout: STATEMENT_TIMEOUT_SECS,
            warehouse: self.warehouse.as_deref(),
            database: self.database.as_deref(),
            schema: self.schema.as_deref(),
            role: self.role.as_deref(),
        };
        let resp = self
            .http
            .post(&self.statements_url)
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", "OAUTH")
            .header(ACCEPT, "application/json")
            .json(&req)
            .send()
            .await
            .context("snowflake statement request")?;

        let status = resp.status();
        // 202 means the statement is still running; report it as a failed lookup.
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            bail!("snowflake returned {status}: {}", body.chars().take(300).collect::<String>());
        }
        let body: StatementResponse = resp
            .json()
            .await
            .context("decoding snowflake statement response")?;

        match body.data.first().and_then(|row| row.first()).cloned().flatten() {
            Some(cell) => parse_epoch_cell(&cell).map(Some),
            None => Ok(None),
        }
    }
}
