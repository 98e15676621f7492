// src/analyze/mod.rs
//! Linguistic enrichment: the analyzer abstraction, its score payload and failure modes.

pub mod enrich;
pub mod tabula;

use async_trait::async_trait;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

pub use crate::analyze::enrich::{enrich, score_content, EnrichmentOutcome};
pub use crate::analyze::tabula::TabulaClient;

/// Number of positional p-values in a document analysis.
pub const P_VALUES: usize = 8;

/// Document-level output of one analysis call. Serialized flat as
/// `blue`, `red`, `p0`..`p7` so it lands directly in the article columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinguisticScores {
    pub blue: f64,
    pub red: f64,
    pub p_values: [f64; P_VALUES],
}

const P_COLUMNS: [&str; P_VALUES] = ["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"];

impl LinguisticScores {
    pub fn column_names() -> impl Iterator<Item = &'static str> {
        ["blue", "red"].into_iter().chain(P_COLUMNS)
    }
}

impl Serialize for LinguisticScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + P_VALUES))?;
        map.serialize_entry("blue", &self.blue)?;
        map.serialize_entry("red", &self.red)?;
        for (name, value) in P_COLUMNS.iter().zip(self.p_values.iter()) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Why an article could not be scored. Never fatal for a run.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("content is blank or missing from the news api response")]
    BlankContent,

    #[error("analysis request failed")]
    Request(#[source] reqwest::Error),

    #[error("analysis service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),
}

impl EnrichmentError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichmentError::BlankContent => "blank_content",
            EnrichmentError::Request(_) => "request",
            EnrichmentError::Status { .. } => "status",
            EnrichmentError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// A linguistic-analysis backend. One call per article text.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<LinguisticScores, EnrichmentError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_serialize_as_flat_columns() {
        let s = LinguisticScores {
            blue: 0.5,
            red: 0.25,
            p_values: [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7],
        };
        let v = serde_json::to_value(s).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 10);
        assert_eq!(obj["blue"], 0.5);
        assert_eq!(obj["p0"], 0.0);
        assert_eq!(obj["p7"], 0.7);
        let names: Vec<_> = LinguisticScores::column_names().collect();
        assert!(names.iter().all(|n| obj.contains_key(*n)));
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(EnrichmentError::BlankContent.kind(), "blank_content");
        let e = EnrichmentError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(e.kind(), "status");
        assert_eq!(e.to_string(), "analysis service returned status 500: boom");
    }
}
