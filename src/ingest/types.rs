// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::LinguisticScores;
use crate::ingest::watermark::QueryWindow;
use crate::state::SyncState;

/// Destination table for every upsert.
pub const ARTICLE_TABLE: &str = "article";

/// One element of the NewsAPI `articles` array.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    pub source: RawSource,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RawSource {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Natural key of an article row.
pub type ArticleKey = (String, DateTime<Utc>);

/// Unit of persistence. Keyed by (`source`, `published_at`).
/// `scores` is all-or-nothing: it comes from a single analysis call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Article {
    pub topic: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    #[serde(flatten)]
    pub scores: Option<LinguisticScores>,
}

impl Article {
    pub fn from_raw(topic: &str, raw: RawArticle) -> Self {
        Self {
            topic: topic.to_string(),
            source: raw.source.name,
            published_at: raw.published_at,
            author: raw.author,
            title: raw.title,
            description: raw.description,
            content: raw.content,
            url: raw.url,
            scores: None,
        }
    }

    pub fn key(&self) -> ArticleKey {
        (self.source.clone(), self.published_at)
    }
}

/// What the host receives, in order. A checkpoint commits every upsert since the
/// previous one.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Upsert { table: &'static str, data: Article },
    Checkpoint { state: SyncState },
}

impl Operation {
    pub fn upsert(article: Article) -> Self {
        Operation::Upsert {
            table: ARTICLE_TABLE,
            data: article,
        }
    }

    pub fn checkpoint(state: SyncState) -> Self {
        Operation::Checkpoint { state }
    }
}

/// A topic-scoped article feed.
#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    /// Articles for `topic` published inside `window`, in the source's own order.
    async fn fetch_topic(&self, window: &QueryWindow, topic: &str) -> Result<Vec<RawArticle>>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::LinguisticScores;

    fn raw() -> RawArticle {
        serde_json::from_str(
            r#"{"source":{"id":null,"name":"Reuters"},"author":null,"title":"T",
                "description":"D","url":"https://x.test/a","publishedAt":"2024-01-09T08:15:00Z",
                "content":"C"}"#,
        )
        .unwrap()
    }

    #[test]
    fn unscored_article_has_no_score_columns() {
        let a = Article::from_raw("fed", raw());
        let v = serde_json::to_value(Operation::upsert(a)).unwrap();
        assert_eq!(v["op"], "upsert");
        assert_eq!(v["table"], "article");
        let data = v["data"].as_object().unwrap();
        assert_eq!(data["source"], "Reuters");
        assert_eq!(data["published_at"], "2024-01-09T08:15:00Z");
        assert_eq!(data["topic"], "fed");
        assert!(data["author"].is_null());
        assert!(!data.contains_key("blue"));
        assert!(!data.contains_key("p0"));
    }

    #[test]
    fn scored_article_carries_every_score_column() {
        let mut a = Article::from_raw("fed", raw());
        a.scores = Some(LinguisticScores {
            blue: 0.1,
            red: 0.9,
            p_values: [0.5; 8],
        });
        let v = serde_json::to_value(&a).unwrap();
        let obj = v.as_object().unwrap();
        let present = LinguisticScores::column_names()
            .filter(|c| obj.contains_key(*c))
            .count();
        assert_eq!(present, 10);
    }

    #[test]
    fn checkpoint_serializes_state() {
        let op = Operation::checkpoint(SyncState {
            to_ts: Some("2024-01-10T12:00:00".into()),
        });
        let v = serde_json::to_value(op).unwrap();
        assert_eq!(v["op"], "checkpoint");
        assert_eq!(v["state"]["to_ts"], "2024-01-10T12:00:00");
    }
}
