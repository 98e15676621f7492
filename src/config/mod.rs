// src/config/mod.rs
//! Connector configuration. The host hands it over as a flat string map
//! (`NEWS_API_KEY`, `TOPIC`, ...); locally it is read from `configuration.json`
//! or a TOML equivalent.

pub mod env;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Deserializer};

use crate::analyze::tabula::TABULA_URL;
use crate::ingest::providers::NEWS_API_URL;
use crate::ingest::watermark::DestinationTarget;

pub const ENV_CONFIG_PATH: &str = "NEWS_SYNC_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "configuration.json";

/// NewsAPI caps `pageSize` at 100.
pub const MAX_PAGE_SIZE: u32 = 100;

fn default_news_api_url() -> String {
    NEWS_API_URL.to_string()
}
fn default_tabula_url() -> String {
    TABULA_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// Host values arrive as strings; TOML files may carry plain numbers.
fn de_number<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr + TryFrom<u64>,
    <T as std::str::FromStr>::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(u64),
    }
    match StrOrNum::deserialize(d)? {
        StrOrNum::Str(s) => s
            .trim()
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {s:?}: {e}"))),
        StrOrNum::Num(n) => {
            T::try_from(n).map_err(|_| serde::de::Error::custom(format!("{n} out of range")))
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct Configuration {
    #[serde(rename = "NEWS_API_KEY")]
    pub news_api_key: String,
    #[serde(rename = "TABULA_KEY")]
    pub tabula_key: String,
    /// Comma-separated topic list.
    #[serde(rename = "TOPIC")]
    pub topic: String,
    #[serde(rename = "PAGE_SIZE", deserialize_with = "de_number")]
    pub page_size: u32,

    #[serde(rename = "NEWS_API_URL", default = "default_news_api_url")]
    pub news_api_url: String,
    #[serde(rename = "TABULA_URL", default = "default_tabula_url")]
    pub tabula_url: String,
    #[serde(
        rename = "REQUEST_TIMEOUT_SECS",
        default = "default_timeout_secs",
        deserialize_with = "de_number"
    )]
    pub request_timeout_secs: u64,
    #[serde(rename = "DESTINATION_TARGET", default)]
    pub destination_target: DestinationTarget,

    #[serde(flatten)]
    pub snowflake: SnowflakeConfig,
}

/// Destination connection parameters, used only for the live watermark lookup.
#[derive(Clone, Default, Deserialize)]
pub struct SnowflakeConfig {
    #[serde(rename = "SNOWFLAKE_ACCOUNT", default)]
    pub account: Option<String>,
    #[serde(rename = "SNOWFLAKE_WAREHOUSE", default)]
    pub warehouse: Option<String>,
    #[serde(rename = "SNOWFLAKE_DATABASE", default)]
    pub database: Option<String>,
    #[serde(rename = "SNOWFLAKE_SCHEMA", default)]
    pub schema: Option<String>,
    #[serde(rename = "SNOWFLAKE_ROLE", default)]
    pub role: Option<String>,
    /// OAuth token for the SQL API.
    #[serde(rename = "SNOWFLAKE_TOKEN", default)]
    pub token: Option<String>,
    /// Overrides `https://<account>.snowflakecomputing.com`.
    #[serde(rename = "SNOWFLAKE_URL", default)]
    pub url: Option<String>,
}

impl SnowflakeConfig {
    /// Lookup is enabled once an account (or explicit URL) and a token are present.
    pub fn is_enabled(&self) -> bool {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        (has(&self.account) || has(&self.url)) && has(&self.token)
    }
}

fn redacted(s: &str) -> String {
    format!("<{} chars>", s.len())
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("news_api_key", &redacted(&self.news_api_key))
            .field("tabula_key", &redacted(&self.tabula_key))
            .field("topic", &self.topic)
            .field("page_size", &self.page_size)
            .field("news_api_url", &self.news_api_url)
            .field("tabula_url", &self.tabula_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("destination_target", &self.destination_target)
            .field("snowflake", &self.snowflake)
            .finish()
    }
}

impl fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("token", &self.token.as_deref().map(redacted))
            .field("url", &self.url)
            .finish()
    }
}

impl Configuration {
    /// Topics from the comma-separated `TOPIC`, trimmed, empties dropped.
    pub fn topics(&self) -> Vec<String> {
        split_topics(&self.topic)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.news_api_key.trim().is_empty() {
            bail!("NEWS_API_KEY is empty");
        }
        if self.tabula_key.trim().is_empty() {
            bail!("TABULA_KEY is empty");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            bail!("PAGE_SIZE must be within 1..={MAX_PAGE_SIZE}, got {}", self.page_size);
        }
        if self.request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be positive");
        }
        Ok(())
    }

    /// Shared HTTP client for every outbound call, bounded by the request timeout.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let timeout = self.request_timeout();
        reqwest::Client::builder()
            .user_agent(concat!("news-sync/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .context("building http client")
    }
}

pub fn split_topics(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load from an explicit path. JSON or TOML, picked by extension.
pub fn load_from(path: &Path) -> Result<Configuration> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading configuration from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_configuration(&content, ext.as_str())
        .with_context(|| format!("parsing configuration {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Path from `$NEWS_SYNC_CONFIG`, else `configuration.json`.
pub fn default_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_default() -> Result<Configuration> {
    let path = default_path();
    if !path.exists() {
        return Err(anyhow!("configuration file {} not found", path.display()));
    }
    load_from(&path)
}

/// Parse configuration text without validating it. `hint_ext` is the file extension, if any.
pub fn parse_configuration(s: &str, hint_ext: &str) -> Result<Configuration> {
    if hint_ext == "toml" {
        return toml::from_str(s).context("invalid TOML configuration");
    }
    match serde_json::from_str(s) {
        Ok(cfg) => Ok(cfg),
        Err(json_err) if hint_ext != "json" => {
            toml::from_str(s).map_err(|_| anyhow!(json_err).context("invalid configuration"))
        }
        Err(e) => Err(e).context("invalid JSON configuration"),
    }
}
