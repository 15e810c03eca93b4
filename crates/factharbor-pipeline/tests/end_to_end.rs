//! End-to-end integration tests driving `analyze()` with scripted
//! capability mocks. Unlike the per-stage unit tests, these exercise the
//! real `PromptRegistry::render` path and so are the only tests that would
//! have caught a prompt referencing a variable no stage ever supplies.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use factharbor_config::{resolve, RawConfigLayer};
use factharbor_pipeline::prompts::default_prompt_registry;
use factharbor_pipeline::{analyze, PipelineDeps};
use factharbor_types::{
    CancellationToken, Input, InputKind, LlmCall, LlmCallEnvelope, LlmCallError, LlmCallRequest,
    QualityGate, Reliability, ReliabilityResult, Search, SearchCallError, SearchHit,
    SearchOptions, StructuredResult, SystemClock, TaskKey, WarningType, WarningsCollector,
};

struct ScriptedLlm {
    responses: HashMap<TaskKey, Value>,
}

impl ScriptedLlm {
    fn new(responses: HashMap<TaskKey, Value>) -> Self {
        Self { responses }
    }
}

#[async_trait]
impl LlmCall for ScriptedLlm {
    async fn call(
        &self,
        request: LlmCallRequest,
        _warnings: &WarningsCollector,
        cancel: &CancellationToken,
    ) -> Result<StructuredResult, LlmCallError> {
        if cancel.is_cancelled() {
            return Err(LlmCallError::Cancelled);
        }
        let value = self
            .responses
            .get(&request.task_key)
            .cloned()
            .unwrap_or_else(|| json!({}));
        Ok(StructuredResult {
            value,
            envelope: LlmCallEnvelope {
                prompt_hash: request.prompt_hash,
                configured_provider: "test".to_string(),
                provider: "test".to_string(),
                model: "test-model".to_string(),
                tokens: 10,
                was_total_refusal: false,
            },
        })
    }
}

struct ScriptedSearch {
    hits: Vec<SearchHit>,
}

#[async_trait]
impl Search for ScriptedSearch {
    async fn query(
        &self,
        _query: &str,
        _claim_id: &str,
        _opts: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchCallError> {
        Ok(self.hits.clone())
    }
}

struct NoopReliability;

#[async_trait]
impl Reliability for NoopReliability {
    async fn evaluate(&self, _domain: &str) -> anyhow::Result<ReliabilityResult> {
        Ok(ReliabilityResult { score: None, source_type: None, factual_rating: None })
    }
}

fn nasa_hit() -> SearchHit {
    SearchHit {
        url: "https://nasa.gov/sky-color".to_string(),
        title: "NASA Explains Sky Color".to_string(),
        snippet: "NASA explains why the sky appears blue due to Rayleigh scattering.".to_string(),
        published_at: None,
    }
}

/// A complete happy-path response set: one central claim, one evidence hit,
/// one candidate context, a clean debate with no challenges.
fn happy_responses() -> HashMap<TaskKey, Value> {
    let mut m = HashMap::new();
    m.insert(
        TaskKey::ClaimClassifyInput,
        json!({
            "classification": "single_atomic_claim",
            "impliedClaim": "The sky is blue according to NASA",
            "firstCutClaims": ["The sky is blue according to NASA."]
        }),
    );
    m.insert(
        TaskKey::ClaimRefine,
        json!({
            "claims": [{
                "text": "The sky is blue according to NASA.",
                "claimRole": "core",
                "centrality": "high",
                "isCentral": true,
                "checkWorthiness": 0.9,
                "keyEntities": ["NASA"],
                "isCounterClaim": false
            }]
        }),
    );
    m.insert(
        TaskKey::QueryGenerate,
        json!({"queries": [{"query": "why is the sky blue NASA", "label": "supporting"}]}),
    );
    m.insert(TaskKey::RelevanceClassify, json!({"relevance": 0.95}));
    m.insert(
        TaskKey::EvidenceExtract,
        json!({
            "statement": "NASA explains that Rayleigh scattering causes the sky to appear blue during the day.",
            "sourceExcerpt": "Short-wavelength blue light is scattered more than other colors by gases in Earth's atmosphere.",
            "sourceAuthority": "NASA",
            "evidenceBasis": "scientific consensus",
            "sourceType": "government_report",
            "category": "science",
            "probativeValue": "high",
            "claimDirection": "supports",
            "derivativeClaimUnverified": false
        }),
    );
    m.insert(
        TaskKey::BoundaryCluster,
        json!({"contexts": [{"name": "Atmospheric science consensus", "shortName": "Atmospheric", "subject": "why the sky is blue"}]}),
    );
    m.insert(
        TaskKey::ContextAssign,
        json!({"assignments": [{"evidenceId": "ev-0001", "contextId": "ctx-0001"}]}),
    );
    m.insert(
        TaskKey::DebateAdvocate,
        json!({
            "answerPct": 92,
            "confidencePct": 90,
            "shortAnswer": "Strongly supported by NASA-sourced atmospheric science.",
            "keyFactors": [{
                "factor": "Rayleigh scattering explanation",
                "explanation": "NASA's explanation is grounded in established physics.",
                "supports": "strongly_supports",
                "weight": "high",
                "citedEvidenceIds": ["ev-0001"]
            }]
        }),
    );
    m.insert(TaskKey::DebateSelfConsistency, json!({"consistencyScore": 0.95}));
    m.insert(TaskKey::DebateChallenge, json!({"challenges": []}));
    m.insert(
        TaskKey::DebateReconcile,
        json!({"answerPct": 92, "confidencePct": 90, "challengeResponses": []}),
    );
    m.insert(
        TaskKey::DebateValidate,
        json!({"isInverted": false, "harmPotential": "low", "isContested": false, "factualBasis": "established"}),
    );
    m.insert(
        TaskKey::VerdictNarrative,
        json!({
            "overallSummary": "The claim is well supported by NASA atmospheric science.",
            "contextNarratives": [{"narrative": "In the atmospheric-science context, evidence strongly supports the claim."}]
        }),
    );
    m
}

fn base_config() -> factharbor_config::ResolvedConfig {
    resolve(None, None, None).expect("defaults must typecheck")
}

fn deps(responses: HashMap<TaskKey, Value>, hits: Vec<SearchHit>) -> PipelineDeps {
    PipelineDeps {
        llm: Arc::new(ScriptedLlm::new(responses)),
        search: Arc::new(ScriptedSearch { hits }),
        reliability: Arc::new(NoopReliability),
        prompts: default_prompt_registry(),
        clock: Arc::new(SystemClock),
    }
}

#[tokio::test]
async fn happy_path_produces_a_high_quality_gate() {
    let input = Input::new("The sky is blue according to NASA.", InputKind::Claim);
    // One iteration's worth of budget is enough; keep the rest of the
    // pipeline's defaults so Stage 2 runs its normal several iterations and
    // the duplicate-hit extractions get deduplicated away.
    let run = analyze(
        input,
        base_config(),
        deps(happy_responses(), vec![nasa_hit()]),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(run.assessment.status, factharbor_types::JobStatus::Succeeded);
    assert_eq!(run.assessment.claim_verdicts.len(), 1);
    let verdict = &run.assessment.claim_verdicts[0];
    assert_eq!(verdict.claim_id, "claim-0001");
    assert_eq!(verdict.context_id, "ctx-0001");
    assert!(verdict.answer_pct >= 86.0, "answerPct was {}", verdict.answer_pct);
    assert_eq!(run.assessment.quality_gates.overall, QualityGate::High);
    assert!(!run.assessment.verdict_narrative.is_empty());
    // Only one evidence item should have survived Jaccard dedup across the
    // repeated identical hits Stage 2 would otherwise have extracted.
    assert_eq!(run.assessment.claim_boundaries.len(), 1);
}

#[tokio::test]
async fn repeated_runs_with_identical_inputs_assign_identical_ids() {
    let responses = happy_responses();
    let hits = vec![nasa_hit()];

    let run_a = analyze(
        Input::new("The sky is blue according to NASA.", InputKind::Claim),
        base_config(),
        deps(responses.clone(), hits.clone()),
        CancellationToken::new(),
    )
    .await;
    let run_b = analyze(
        Input::new("The sky is blue according to NASA.", InputKind::Claim),
        base_config(),
        deps(responses, hits),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(run_a.assessment.claim_verdicts.len(), run_b.assessment.claim_verdicts.len());
    let a = &run_a.assessment.claim_verdicts[0];
    let b = &run_b.assessment.claim_verdicts[0];
    assert_eq!(a.claim_id, b.claim_id);
    assert_eq!(a.context_id, b.context_id);
    assert_eq!(a.answer_pct, b.answer_pct);
    assert_eq!(run_a.assessment.quality_gates.overall, run_b.assessment.quality_gates.overall);
}

#[tokio::test]
async fn query_budget_exhaustion_emits_a_warning() {
    let mut responses = happy_responses();
    // No hits, so no evidence survives and the debate/aggregation stages
    // never issue LLM calls at all; only Stage 1 and Stage 2's
    // query-generation responses matter here.
    responses.insert(TaskKey::QueryGenerate, json!({"queries": [{"query": "q", "label": "supporting"}]}));

    let override_layer = RawConfigLayer {
        query_budget_per_claim: Some(2),
        ..Default::default()
    };
    let config = resolve(Some(override_layer), None, None).expect("override must typecheck");

    let run = analyze(
        Input::new("The sky is blue according to NASA.", InputKind::Claim),
        config,
        deps(responses, vec![]),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(run.assessment.status, factharbor_types::JobStatus::Succeeded);
    assert!(run
        .assessment
        .analysis_warnings
        .iter()
        .any(|w| w.warning_type == WarningType::QueryBudgetExhausted));
    assert!(run.assessment.claim_verdicts.is_empty());
    assert_eq!(run.assessment.quality_gates.overall, QualityGate::Insufficient);
}

#[tokio::test]
async fn baseless_adversarial_challenge_is_dropped_and_warned() {
    let mut responses = happy_responses();
    responses.insert(
        TaskKey::DebateChallenge,
        json!({"challenges": [{"id": "c1", "point": "this is unfounded", "citedEvidenceIds": ["ev-9999"]}]}),
    );

    let run = analyze(
        Input::new("The sky is blue according to NASA.", InputKind::Claim),
        base_config(),
        deps(responses, vec![nasa_hit()]),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(run.assessment.status, factharbor_types::JobStatus::Succeeded);
    assert!(run
        .assessment
        .analysis_warnings
        .iter()
        .any(|w| w.warning_type == WarningType::BaselessAdversarialChallenge));
    let verdict = &run.assessment.claim_verdicts[0];
    assert!(verdict.challenge_responses.is_empty());
}

#[tokio::test]
async fn cancellation_before_stage1_yields_a_failed_job_with_no_verdicts() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let run = analyze(
        Input::new("The sky is blue according to NASA.", InputKind::Claim),
        base_config(),
        deps(happy_responses(), vec![nasa_hit()]),
        cancel,
    )
    .await;

    assert_eq!(run.assessment.status, factharbor_types::JobStatus::Failed);
    assert_eq!(run.assessment.fatal_reason.as_deref(), Some("job_cancelled"));
    assert!(run.assessment.claim_verdicts.is_empty());
    assert!(run
        .assessment
        .analysis_warnings
        .iter()
        .any(|w| w.warning_type == WarningType::JobCancelled));
}

#[tokio::test]
async fn high_centrality_claims_beyond_four_are_demoted_before_verdicting() {
    let mut responses = happy_responses();
    let claims: Vec<Value> = (0..5)
        .map(|i| {
            json!({
                "text": format!("Claim number {i} is about NASA."),
                "claimRole": "core",
                "centrality": "high",
                "isCentral": true,
                "checkWorthiness": 0.9,
                "keyEntities": ["NASA"],
                "isCounterClaim": false
            })
        })
        .collect();
    responses.insert(TaskKey::ClaimRefine, json!({"claims": claims}));
    responses.insert(
        TaskKey::ClaimClassifyInput,
        json!({
            "classification": "multi_assertion_input",
            "impliedClaim": "NASA claims about the number sequence",
            "firstCutClaims": ["Claim number 0", "Claim number 1", "Claim number 2", "Claim number 3", "Claim number 4"]
        }),
    );

    let run = analyze(
        Input::new(
            "Claim number 0 is about NASA. Claim number 1 is about NASA. Claim number 2 is about NASA. \
             Claim number 3 is about NASA. Claim number 4 is about NASA.",
            InputKind::Claim,
        ),
        base_config(),
        deps(responses, vec![nasa_hit()]),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(run.assessment.status, factharbor_types::JobStatus::Succeeded);
    let high_count = run
        .assessment
        .coverage_matrix
        .keys()
        .count();
    assert_eq!(high_count, 5, "all five claims should survive Gate 1");
    // Only four of the five may carry forward as central/high; the fifth
    // was demoted and so never reaches Stage 2's central-claims research
    // loop, meaning it gets no verdict at all.
    let verdicted_claims: std::collections::HashSet<&str> =
        run.assessment.claim_verdicts.iter().map(|v| v.claim_id.as_str()).collect();
    assert!(verdicted_claims.len() <= 4);
}
