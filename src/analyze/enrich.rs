//! Per-article enrichment. Best-effort: a failed analysis is logged and the article
//! moves on without scores.

use metrics::counter;

use super::{Analyzer, EnrichmentError, LinguisticScores};
use crate::ingest::types::Article;

/// Either the full score set or the reason there is none.
pub type EnrichmentOutcome = Result<LinguisticScores, EnrichmentError>;

/// Score one article text. Blank or missing content fails locally, without a call.
pub async fn score_content(analyzer: &dyn Analyzer, content: Option<&str>) -> EnrichmentOutcome {
    let text = content
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(EnrichmentError::BlankContent)?;
    analyzer.analyze(text).await
}

/// Attach scores to `article`, or log why not. Never fails.
pub async fn enrich(analyzer: &dyn Analyzer, mut article: Article) -> Article {
    match score_content(analyzer, article.content.as_deref()).await {
        Ok(scores) => article.scores = Some(scores),
        Err(err) => {
            let kind = err.kind();
            counter!("sync_enrichment_failures_total", "kind" => kind).increment(1);
            let err = anyhow::Error::from(err);
            tracing::warn!(
                provider = analyzer.provider_name(),
                error_kind = kind,
                topic = %article.topic,
                source = %article.source,
                published_at = %article.published_at,
                error = %format!("{err:#}"),
                "enrichment failed; emitting article without scores"
            );
        }
    }
    article
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{RawArticle, RawSource};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    struct CountingAnalyzer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Analyzer for CountingAnalyzer {
        async fn analyze(&self, text: &str) -> EnrichmentOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(text, text.trim(), "analyzer must receive trimmed text");
            if self.fail {
                return Err(EnrichmentError::Status {
                    status: 500,
                    body: "internal".into(),
                });
            }
            Ok(LinguisticScores {
                blue: 0.7,
                red: 0.3,
                p_values: [0.125; 8],
            })
        }
        fn provider_name(&self) -> &'static str {
            "counting"
        }
    }

    fn article(content: Option<&str>) -> Article {
        Article::from_raw(
            "markets",
            RawArticle {
                source: RawSource {
                    id: None,
                    name: "Reuters".into(),
                },
                published_at: Utc.with_ymd_and_hms(2024, 1, 9, 8, 0, 0).unwrap(),
                author: None,
                title: Some("t".into()),
                description: None,
                content: content.map(str::to_string),
                url: None,
            },
        )
    }

    #[tokio::test]
    async fn blank_content_skips_the_call() {
        let a = CountingAnalyzer {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let out = enrich(&a, article(Some("  \n "))).await;
        assert!(out.scores.is_none());
        let out = enrich(&a, article(None)).await;
        assert!(out.scores.is_none());
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_attaches_full_score_set() {
        let a = CountingAnalyzer {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let out = enrich(&a, article(Some("  Stocks rallied.  "))).await;
        let s = out.scores.expect("scored");
        assert_eq!(s.blue, 0.7);
        assert_eq!(out.content.as_deref(), Some("  Stocks rallied.  "));
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn service_failure_keeps_article_unscored() {
        let a = CountingAnalyzer {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let out = enrich(&a, article(Some("Stocks rallied."))).await;
        assert!(out.scores.is_none());
        assert_eq!(out.source, "Reuters");
    }

    /// Fails every call with a real transport error (unparseable URL).
    struct BrokenTransport;

    #[async_trait]
    impl Analyzer for BrokenTransport {
        async fn analyze(&self, _text: &str) -> EnrichmentOutcome {
            let err = reqwest::Client::new()
                .get("not a url")
                .send()
                .await
                .expect_err("relative url must not send");
            Err(EnrichmentError::Request(err))
        }
        fn provider_name(&self) -> &'static str {
            "broken"
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn warning_carries_the_full_error_chain() {
        let logs = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let out = enrich(&BrokenTransport, article(Some("Stocks rallied."))).await;
        assert!(out.scores.is_none());

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("WARN"), "{text}");
        assert!(text.contains("enrichment failed"), "{text}");
        assert!(text.contains("analysis request failed: builder error"), "{text}");
        assert!(text.contains("relative URL without a base"), "{text}");
    }
}
