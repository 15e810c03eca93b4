//! Per-claim query budget ledger (§4.D `queryBudgetUsageByClaim`).

use std::collections::HashMap;
use std::sync::Mutex;

/// Tracks how many search queries each claim has spent against its budget.
/// Shared across Stage 2's concurrent per-claim research loops, hence the
/// interior mutability rather than requiring `&mut self` everywhere.
#[derive(Debug, Default)]
pub struct QueryBudgetLedger {
    used: Mutex<HashMap<String, u32>>,
    limit_per_claim: u32,
}

impl QueryBudgetLedger {
    pub fn new(limit_per_claim: u32) -> Self {
        Self {
            used: Mutex::new(HashMap::new()),
            limit_per_claim,
        }
    }

    pub fn remaining(&self, claim_id: &str) -> i64 {
        let used = self.used.lock().unwrap();
        let spent = used.get(claim_id).copied().unwrap_or(0);
        self.limit_per_claim as i64 - spent as i64
    }

    /// Records one query spend against `claim_id`. Callers must check
    /// `remaining` first; this never refuses, it only books the spend.
    pub fn record_query(&self, claim_id: &str) {
        let mut used = self.used.lock().unwrap();
        *used.entry(claim_id.to_string()).or_insert(0) += 1;
    }

    pub fn usage_snapshot(&self) -> HashMap<String, u32> {
        self.used.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_decreases_as_queries_are_recorded() {
        let ledger = QueryBudgetLedger::new(3);
        assert_eq!(ledger.remaining("c1"), 3);
        ledger.record_query("c1");
        ledger.record_query("c1");
        assert_eq!(ledger.remaining("c1"), 1);
        assert_eq!(ledger.remaining("c2"), 3);
    }

    #[test]
    fn remaining_goes_negative_if_overspent_but_never_panics() {
        let ledger = QueryBudgetLedger::new(1);
        ledger.record_query("c1");
        ledger.record_query("c1");
        assert_eq!(ledger.remaining("c1"), -1);
    }
}
