//! Tabula Lingua provider: posts article text to the standard analysis endpoint and
//! reads the document-level scores.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use super::{Analyzer, EnrichmentError, LinguisticScores, P_VALUES};

pub const TABULA_URL: &str = "https://app.tabulalingua.com/v0/standard/";

/// Tabula Lingua analysis client. Authenticates with the `Auth` header.
pub struct TabulaClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl TabulaClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Serialize)]
struct AnalyzeConfig {
    include_segments: bool,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    config: AnalyzeConfig,
    text: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    data: AnalyzeData,
}

#[derive(Deserialize)]
struct AnalyzeData {
    document: Document,
}

#[derive(Deserialize)]
struct Document {
    blue: f64,
    red: f64,
    p_values: Vec<f64>,
}

/// Parse a successful response body into scores. `p_values` must hold exactly eight
/// entries; they map positionally onto `p0`..`p7`.
pub fn parse_document(body: &str) -> Result<LinguisticScores, EnrichmentError> {
    let resp: AnalyzeResponse = serde_json::from_str(body)
        .map_err(|e| EnrichmentError::MalformedResponse(e.to_string()))?;
    let doc = resp.data.document;
    let len = doc.p_values.len();
    let p_values: [f64; P_VALUES] = doc.p_values.try_into().map_err(|_| {
        EnrichmentError::MalformedResponse(format!(
            "expected {P_VALUES} p_values, got {len}"
        ))
    })?;
    Ok(LinguisticScores {
        blue: doc.blue,
        red: doc.red,
        p_values,
    })
}

#[async_trait]
impl Analyzer for TabulaClient {
    async fn analyze(&self, text: &str) -> Result<LinguisticScores, EnrichmentError> {
        let req = AnalyzeRequest {
            config: AnalyzeConfig {
                include_segments: false,
            },
            text,
        };

        let resp = self
            .http
            .post(&self.url)
            .header("Auth", &self.api_key)
            .header(ACCEPT, "application/json")
            .json(&req)
            .send()
            .await
            .map_err(EnrichmentError::Request)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnrichmentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(EnrichmentError::Request)?;
        parse_document(&body)
    }

    fn provider_name(&self) -> &'static str {
        "tabula"
    }
}
