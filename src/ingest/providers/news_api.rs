use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::ingest::types::{ArticleSource, RawArticle};
use crate::ingest::watermark::QueryWindow;

pub const NEWS_API_URL: &str = "https://newsapi.org/v2/everything";

/// Only the first page is requested per run.
const PAGE: &str = "1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EverythingResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    total_results: Option<u64>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    articles: Option<Vec<RawArticle>>,
}

/// Parse an `/v2/everything` body. A missing `articles` array is an error.
pub fn parse_articles(body: &str) -> Result<Vec<RawArticle>> {
    let resp: EverythingResponse =
        serde_json::from_str(body).context("parsing news api response json")?;
    if resp.status.as_deref() == Some("error") {
        bail!(
            "news api error {}: {}",
            resp.code.as_deref().unwrap_or("unknown"),
            resp.message.as_deref().unwrap_or_default()
        );
    }
    let articles = resp
        .articles
        .context("news api response has no `articles` array")?;
    if let Some(total) = resp.total_results {
        if total > articles.len() as u64 {
            tracing::debug!(
                total,
                returned = articles.len(),
                "more results than the first page holds; only page 1 is fetched"
            );
        }
    }
    Ok(articles)
}

/// Best-effort one-line summary of an error body.
fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<EverythingResponse>(body) {
        Ok(EverythingResponse {
            code: Some(code),
            message,
            ..
        }) => format!("{code}: {}", message.unwrap_or_default()),
        _ => body.chars().take(300).collect(),
    }
}

/// NewsAPI `/v2/everything` client, bearer-token authenticated.
pub struct NewsApiProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    page_size: u32,
}

impl NewsApiProvider {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        api_key: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            page_size,
        }
    }

    pub fn query_params(&self, window: &QueryWindow, topic: &str) -> Vec<(&'static str, String)> {
        vec![
            ("from", window.from_param()),
            ("to", window.to_param()),
            ("page", PAGE.to_string()),
            ("language", "en".to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("pageSize", self.page_size.to_string()),
            ("q", topic.to_string()),
        ]
    }
}

#[async_trait]
impl ArticleSource for NewsApiProvider {
    async fn fetch_topic(&self, window: &QueryWindow, topic: &str) -> Result<Vec<RawArticle>> {
        let t0 = std::time::Instant::now();
        let resp = self
            .client
            .get(&self.url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .query(&self.query_params(window, topic))
            .send()
            .await
            .with_context(|| format!("news api get() for topic {topic:?}"))?;

        let status = resp.status();
        let body = resp.text().await.context("news api .text()")?;
        if !status.is_success() {
            bail!(
                "news api returned {status} for topic {topic:?}: {}",
                describe_error_body(&body)
            );
        }
        let articles = parse_articles(&body)
            .with_context(|| format!("news api response for topic {topic:?}"))?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("sync_fetch_ms").record(ms);
        counter!("sync_articles_fetched_total").increment(articles.len() as u64);
        Ok(articles)
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}
