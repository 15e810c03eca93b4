//! `PipelineContext`: the single-owner arena and cross-cutting dependency
//! bundle every stage reads/writes through (§9 "encapsulate in a
//! `PipelineContext` passed by reference to every stage; never
//! process-global").

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use factharbor_config::ResolvedConfig;
use factharbor_prompts::PromptRegistry;
use factharbor_types::{
    AnalysisContext, AnalysisWarning, AtomicClaim, CancellationToken, ClaimVerdict, Clock,
    EvidenceItem, EvidenceScope, LlmCall, LlmCallError, LlmCallRequest, Reliability, Search,
    StructuredResult, TaskKey, WarningType, WarningsCollector,
};

use crate::ids::IdFactory;
use crate::metrics::{MetricCounters, PhaseRecorder};

/// The capability bundle a job is constructed with (§6 `deps`). All five
/// are external collaborators the pipeline consumes through a trait object.
pub struct PipelineDeps {
    pub llm: Arc<dyn LlmCall>,
    pub search: Arc<dyn Search>,
    pub reliability: Arc<dyn Reliability>,
    pub prompts: Arc<PromptRegistry>,
    pub clock: Arc<dyn Clock>,
}

/// Per-claim query budget tracking driving Stage 2's outer loop
/// (`queryBudgetUsageByClaim`, §5). Distinct from the search gateway's own
/// ledger: this one decides when the pipeline itself should stop asking,
/// the gateway's decides whether any individual query still gets dispatched.
#[derive(Default)]
pub struct QueryBudget {
    limit_per_claim: u32,
    used: Mutex<HashMap<String, u32>>,
}

impl QueryBudget {
    pub fn new(limit_per_claim: u32) -> Self {
        Self {
            limit_per_claim,
            used: Mutex::new(HashMap::new()),
        }
    }

    pub fn remaining(&self, claim_id: &str) -> i64 {
        let used = self.used.lock().unwrap();
        self.limit_per_claim as i64 - *used.get(claim_id).unwrap_or(&0) as i64
    }

    pub fn consume(&self, claim_id: &str, n: u32) {
        let mut used = self.used.lock().unwrap();
        *used.entry(claim_id.to_string()).or_insert(0) += n;
    }

    pub fn all_exhausted<'a>(&self, claim_ids: impl Iterator<Item = &'a str>) -> bool {
        claim_ids.into_iter().all(|id| self.remaining(id) <= 0)
    }

    pub fn usage_snapshot(&self) -> HashMap<String, u32> {
        self.used.lock().unwrap().clone()
    }
}

/// The single arena owning every entity produced across stages (§3.1
/// "Ownership"). Stages append; only Stage 3's `contextId` annotation
/// mutates an earlier stage's entity, and only through this type's own
/// method so the rule is enforced in one place.
#[derive(Default)]
pub struct PipelineState {
    pub claims: Vec<AtomicClaim>,
    pub implied_claim: Option<String>,
    pub evidence: Vec<EvidenceItem>,
    pub contexts: Vec<AnalysisContext>,
    pub verdicts: Vec<ClaimVerdict>,
}

impl PipelineState {
    pub fn assign_context(
        &mut self,
        evidence_id: &str,
        context_id: &str,
        evidence_scope: Option<EvidenceScope>,
    ) {
        if let Some(item) = self.evidence.iter_mut().find(|e| e.id == evidence_id) {
            item.context_id = context_id.to_string();
            item.evidence_scope = evidence_scope;
        }
    }

    pub fn evidence_for_claim(&self, claim_id: &str) -> Vec<&EvidenceItem> {
        self.evidence.iter().filter(|e| e.claim_id == claim_id).collect()
    }
}

pub struct PipelineContext {
    pub deps: PipelineDeps,
    pub config: ResolvedConfig,
    pub warnings: WarningsCollector,
    pub cancel: CancellationToken,
    pub ids: IdFactory,
    pub query_budget: QueryBudget,
    pub phases: PhaseRecorder,
    pub metrics: MetricCounters,
}

impl PipelineContext {
    pub fn new(deps: PipelineDeps, config: ResolvedConfig, cancel: CancellationToken) -> Self {
        let limit_per_claim = config.search.query_budget_per_claim;
        Self {
            deps,
            config,
            warnings: WarningsCollector::new(),
            cancel,
            ids: IdFactory::new(),
            query_budget: QueryBudget::new(limit_per_claim),
            phases: PhaseRecorder::new(),
            metrics: MetricCounters::default(),
        }
    }

    /// Loads + renders `prompt_name` and issues the resulting structured
    /// call through the LLM gateway (§4.C). `provider_override` is a
    /// debate role's configured provider, or `None` for the global default.
    pub async fn call_llm(
        &self,
        task_key: TaskKey,
        prompt_name: &str,
        system: &str,
        vars: &std::collections::HashMap<String, String>,
        schema: serde_json::Value,
        provider_override: Option<String>,
    ) -> Result<StructuredResult, LlmCallError> {
        let loaded = self
            .deps
            .prompts
            .load_prompt(prompt_name)
            .map_err(|e| LlmCallError::Transport(e.to_string()))?;
        let user = match self.deps.prompts.render(&loaded.content, vars) {
            Ok(rendered) => rendered,
            Err(e) => {
                self.warnings
                    .push(
                        AnalysisWarning::new(
                            WarningType::PromptRenderError,
                            format!("failed to render prompt {prompt_name}: {e}"),
                        )
                        .with_details(serde_json::json!({"promptName": prompt_name})),
                    )
                    .await;
                return Err(LlmCallError::Transport(e.to_string()));
            }
        };

        let request = LlmCallRequest {
            task_key,
            prompt_hash: loaded.content_hash,
            system: system.to_string(),
            user,
            schema,
            provider_override,
        };
        let result = self.deps.llm.call(request, &self.warnings, &self.cancel).await;
        if let Ok(ref r) = result {
            self.metrics.record_llm_call(r.envelope.tokens);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_budget_tracks_remaining_per_claim() {
        let budget = QueryBudget::new(2);
        assert_eq!(budget.remaining("c1"), 2);
        budget.consume("c1", 1);
        assert_eq!(budget.remaining("c1"), 1);
        assert_eq!(budget.remaining("c2"), 2);
    }

    #[test]
    fn all_exhausted_is_true_only_when_every_claim_is_out_of_budget() {
        let budget = QueryBudget::new(1);
        budget.consume("c1", 1);
        assert!(!budget.all_exhausted(["c1", "c2"].into_iter()));
        budget.consume("c2", 1);
        assert!(budget.all_exhausted(["c1", "c2"].into_iter()));
    }

    #[test]
    fn pipeline_state_assign_context_updates_the_matching_evidence_item() {
        let mut state = PipelineState {
            evidence: vec![factharbor_types::EvidenceItem {
                id: "ev-0001".to_string(),
                claim_id: "claim-0001".to_string(),
                statement: "a".repeat(25),
                source_url: "https://example.com".to_string(),
                source_excerpt: "b".repeat(35),
                source_authority: String::new(),
                evidence_basis: String::new(),
                source_type: factharbor_types::SourceType::Other,
                category: String::new(),
                probative_value: factharbor_types::ProbativeValue::Medium,
                claim_direction: factharbor_types::ClaimDirection::Neutral,
                evidence_scope: None,
                derivative_claim_unverified: false,
                context_id: factharbor_types::CTX_UNSCOPED.to_string(),
            }],
            ..Default::default()
        };
        let scope = factharbor_types::EvidenceScope {
            name: "national".to_string(),
            ..Default::default()
        };
        state.assign_context("ev-0001", "ctx-0001", Some(scope));
        assert_eq!(state.evidence[0].context_id, "ctx-0001");
        assert_eq!(
            state.evidence[0].evidence_scope.as_ref().map(|s| s.name.as_str()),
            Some("national")
        );
        assert_eq!(state.evidence_for_claim("claim-0001").len(), 1);
        assert!(state.evidence_for_claim("claim-9999").is_empty());
    }
}
