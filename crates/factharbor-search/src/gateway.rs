//! Search Gateway (§4.D): budget-gated, deduplicated, timeout-bounded query
//! dispatch in front of a raw search transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use factharbor_types::{Search, SearchCallError, SearchHit, SearchOptions, WarningType, WarningsCollector};

use crate::budget::QueryBudgetLedger;
use crate::canonical::canonicalize;

const DEFAULT_TIMEOUT_MS: u64 = 12_000;

/// The raw transport a concrete search provider (Bing, Google CSE, an
/// internal index, ...) implements. External collaborator, out of scope
/// here (spec.md §1) — `SearchGateway` is the seam in front of it.
#[async_trait]
pub trait RawSearchTransport: Send + Sync {
    async fn search(&self, query: &str, opts: &SearchOptions) -> anyhow::Result<Vec<SearchHit>>;
}

pub struct SearchGateway {
    transport: Arc<dyn RawSearchTransport>,
    budget: QueryBudgetLedger,
    warnings: WarningsCollector,
}

impl SearchGateway {
    pub fn new(
        transport: Arc<dyn RawSearchTransport>,
        per_claim_query_limit: u32,
        warnings: WarningsCollector,
    ) -> Self {
        Self {
            transport,
            budget: QueryBudgetLedger::new(per_claim_query_limit),
            warnings,
        }
    }

    pub fn remaining_budget(&self, claim_id: &str) -> i64 {
        self.budget.remaining(claim_id)
    }

    fn dedupe_by_canonical_url(hits: Vec<SearchHit>) -> Vec<SearchHit> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let key = canonicalize(&hit.url);
            if seen.insert(key) {
                out.push(hit);
            }
        }
        out
    }
}

#[async_trait]
impl Search for SearchGateway {
    async fn query(
        &self,
        query: &str,
        claim_id: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchCallError> {
        if self.budget.remaining(claim_id) <= 0 {
            return Ok(Vec::new());
        }

        let timeout_ms = opts.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        self.budget.record_query(claim_id);

        let fut = self.transport.search(query, opts);
        match timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(Ok(hits)) => Ok(Self::dedupe_by_canonical_url(hits)),
            Ok(Err(e)) => Err(SearchCallError::Transport(e.to_string())),
            Err(_) => {
                self.warnings
                    .push_simple(
                        WarningType::SearchTimeout,
                        format!("search query for claim {claim_id} timed out after {timeout_ms}ms; returning partial results"),
                    )
                    .await;
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchHit {
        SearchHit { url: url.to_string(), title: String::new(), snippet: String::new(), published_at: None }
    }

    struct StaticTransport(Vec<SearchHit>);

    #[async_trait]
    impl RawSearchTransport for StaticTransport {
        async fn search(&self, _query: &str, _opts: &SearchOptions) -> anyhow::Result<Vec<SearchHit>> {
            Ok(self.0.clone())
        }
    }

    struct SlowTransport(u64);

    #[async_trait]
    impl RawSearchTransport for SlowTransport {
        async fn search(&self, _query: &str, _opts: &SearchOptions) -> anyhow::Result<Vec<SearchHit>> {
            tokio::time::sleep(Duration::from_millis(self.0)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn exhausted_budget_returns_empty_without_consuming_further() {
        let gateway = SearchGateway::new(
            Arc::new(StaticTransport(vec![hit("https://a.example/1")])),
            0,
            WarningsCollector::new(),
        );
        let hits = gateway.query("q", "claim-1", &SearchOptions::default()).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(gateway.remaining_budget("claim-1"), 0);
    }

    #[tokio::test]
    async fn dedups_by_canonical_url_within_one_query() {
        let gateway = SearchGateway::new(
            Arc::new(StaticTransport(vec![
                hit("https://Example.com/story?utm_source=x&id=5"),
                hit("https://example.com/story?id=5"),
                hit("https://example.com/other"),
            ])),
            5,
            WarningsCollector::new(),
        );
        let hits = gateway.query("q", "claim-1", &SearchOptions::default()).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn timeout_returns_empty_and_emits_a_search_timeout_warning() {
        let warnings = WarningsCollector::new();
        let gateway = SearchGateway::new(Arc::new(SlowTransport(50)), 5, warnings.clone());
        let opts = SearchOptions { timeout_ms: Some(5), ..Default::default() };
        let hits = gateway.query("q", "claim-1", &opts).await.unwrap();
        assert!(hits.is_empty());
        let snapshot = warnings.snapshot().await;
        assert!(snapshot.iter().any(|w| matches!(w.warning_type, WarningType::SearchTimeout)));
    }
}
