//! Search Gateway (§4.D): per-claim query budget ledger, canonical-URL
//! dedup, and timeout-bounded dispatch in front of a `RawSearchTransport`.
//! Concrete search providers are external collaborators (spec.md §1).

mod budget;
mod canonical;
mod gateway;

pub use budget::QueryBudgetLedger;
pub use canonical::canonicalize;
pub use gateway::{RawSearchTransport, SearchGateway};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use factharbor_types::{Search, SearchHit, SearchOptions, WarningsCollector};

    use super::*;

    struct FixedTransport {
        hits: Vec<SearchHit>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RawSearchTransport for FixedTransport {
        async fn search(&self, _query: &str, _opts: &SearchOptions) -> anyhow::Result<Vec<SearchHit>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.hits.clone())
        }
    }

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            title: "title".to_string(),
            snippet: "snippet".to_string(),
            published_at: None,
        }
    }

    #[tokio::test]
    async fn deduplicates_by_canonical_url() {
        let transport = FixedTransport {
            hits: vec![
                hit("https://example.com/story?utm_source=x"),
                hit("https://Example.com/story"),
                hit("https://example.com/other"),
            ],
            delay: None,
        };
        let gateway = SearchGateway::new(Arc::new(transport), 5, WarningsCollector::new());
        let results = gateway
            .query("q", "claim-1", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn empty_budget_returns_empty_without_spending() {
        let transport = FixedTransport {
            hits: vec![hit("https://example.com/a")],
            delay: None,
        };
        let gateway = SearchGateway::new(Arc::new(transport), 0, WarningsCollector::new());
        let results = gateway
            .query("q", "claim-1", &SearchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(gateway.remaining_budget("claim-1"), 0);
    }

    #[tokio::test]
    async fn timeout_returns_partial_empty_list_and_records_warning() {
        let transport = FixedTransport {
            hits: vec![hit("https://example.com/a")],
            delay: Some(Duration::from_millis(50)),
        };
        let warnings = WarningsCollector::new();
        let gateway = SearchGateway::new(Arc::new(transport), 5, warnings.clone());
        let opts = SearchOptions {
            timeout_ms: Some(10),
            ..Default::default()
        };
        let results = gateway.query("q", "claim-1", &opts).await.unwrap();
        assert!(results.is_empty());
        assert!(!warnings.is_empty().await);
    }
}
