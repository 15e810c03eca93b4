//! Stage 4 — Verdict Debate (§4.H). One `DebateWorkflow` runs per `(claim,
//! context)` pair that has at least one evidence item, through the fixed
//! role sequence advocate → self-consistency → adversarial challenge →
//! reconciliation → validation, with a deterministic baseless-challenge and
//! grounding-validation layer enforced atop each LLM call's output.

use std::collections::{HashMap, HashSet};

use factharbor_types::{
    AnalysisWarning, AtomicClaim, ChallengeResponse, ClaimVerdict, ConsistencyResult,
    EvidenceItem, FactualBasis, HarmPotential, KeyFactor, Support, TaskKey, WarningType, Weight,
};
use futures::stream::{self, StreamExt};
use serde_json::json;

use crate::context::PipelineContext;
use crate::jsonutil::{array_field, bool_field, f32_field, str_array_field, str_field};
use crate::workflow::{DebateState, DebateWorkflow};

/// Below this, self-consistency is flagged and confidence is discounted
/// (§4.H.2: "consistencyScore below threshold ⇒ lowConsistency, confidence
/// multiplied by 0.9").
const CONSISTENCY_THRESHOLD: f32 = 0.7;
const LOW_CONSISTENCY_PENALTY: f32 = 0.9;
const SELF_CONSISTENCY_SAMPLES: u32 = 3;

fn parse_support(s: &str) -> Support {
    match s {
        "strongly_supports" => Support::StronglySupports,
        "supports" => Support::Supports,
        "refutes" => Support::Refutes,
        "strongly_refutes" => Support::StronglyRefutes,
        _ => Support::Neutral,
    }
}

fn parse_weight(s: &str) -> Weight {
    match s {
        "high" => Weight::High,
        "low" => Weight::Low,
        _ => Weight::Medium,
    }
}

fn parse_harm(s: &str) -> HarmPotential {
    match s {
        "high" => HarmPotential::High,
        "low" => HarmPotential::Low,
        _ => HarmPotential::Medium,
    }
}

fn parse_factual_basis(s: &str) -> FactualBasis {
    match s {
        "disputed" => FactualBasis::Disputed,
        "opinion" => FactualBasis::Opinion,
        "alleged" => FactualBasis::Alleged,
        "established" => FactualBasis::Established,
        _ => FactualBasis::Unknown,
    }
}

fn key_factors_from_json(raw: &[serde_json::Value], valid_evidence_ids: &HashSet<&str>) -> Vec<KeyFactor> {
    raw.iter()
        .filter_map(|f| {
            let cited: Vec<String> = str_array_field(f, "citedEvidenceIds")
                .into_iter()
                .filter(|id| valid_evidence_ids.contains(id.as_str()))
                .collect();
            if cited.is_empty() {
                return None;
            }
            Some(KeyFactor {
                factor: str_field(f, "factor"),
                explanation: str_field(f, "explanation"),
                supports: parse_support(&str_field(f, "supports")),
                weight: parse_weight(&str_field(f, "weight")),
                cited_evidence_ids: cited,
            })
        })
        .collect()
}

async fn degraded_verdict(
    ctx: &PipelineContext,
    claim: &AtomicClaim,
    context_id: &str,
    reason: &str,
) -> ClaimVerdict {
    ctx.warnings
        .push(
            AnalysisWarning::new(
                WarningType::AnalysisGenerationFailed,
                format!("debate failed for claim {} in context {context_id}: {reason}", claim.id),
            )
            .with_details(json!({"claimId": claim.id, "contextId": context_id})),
        )
        .await;
    ClaimVerdict {
        claim_id: claim.id.clone(),
        context_id: context_id.to_string(),
        answer_pct: 50.0,
        confidence_pct: 0.0,
        short_answer: format!("debate failed: {reason}"),
        key_factors: Vec::new(),
        boundary_findings: String::new(),
        consistency_result: ConsistencyResult {
            samples: 0,
            consistency_score: 0.0,
            low_consistency: false,
        },
        challenge_responses: Vec::new(),
        triangulation_score: 0.0,
        is_inverted: false,
        harm_potential: HarmPotential::Low,
        is_contested: false,
        factual_basis: FactualBasis::Unknown,
        verdict_band: factharbor_types::VerdictBand::Mixed,
    }
}

/// Runs the full debate protocol for one `(claim, context)` pair.
async fn run_debate(
    ctx: &PipelineContext,
    claim: &AtomicClaim,
    context_id: &str,
    evidence: &[&EvidenceItem],
) -> ClaimVerdict {
    let roles = &ctx.config.debate_profile.roles;
    let evidence_ids: HashSet<&str> = evidence.iter().map(|e| e.id.as_str()).collect();
    let evidence_json = serde_json::to_string(
        &evidence
            .iter()
            .map(|e| {
                json!({
                    "id": e.id,
                    "statement": e.statement,
                    "claimDirection": e.claim_direction,
                    "probativeValue": e.probative_value,
                    "sourceType": e.source_type,
                })
            })
            .collect::<Vec<_>>(),
    )
    .unwrap_or_default();

    let mut workflow = DebateWorkflow::new(ctx.deps.clock.as_ref());

    // --- Advocate ---
    let mut adv_vars = HashMap::new();
    adv_vars.insert("claimText".to_string(), claim.text.clone());
    adv_vars.insert("evidenceJson".to_string(), evidence_json.clone());
    let adv_schema = json!({
        "required": ["answerPct", "confidencePct", "shortAnswer", "keyFactors"],
        "properties": {
            "answerPct": {"type": "number"},
            "confidencePct": {"type": "number"},
            "shortAnswer": {"type": "string"},
            "keyFactors": {"type": "array"}
        },
        "x-quality-critical": ["shortAnswer", "keyFactors"]
    });
    let advocate = match ctx
        .call_llm(
            TaskKey::DebateAdvocate,
            "debate.advocate",
            "You are the advocate: produce the strongest evidence-grounded verdict for this claim in this context.",
            &adv_vars,
            adv_schema,
            Some(roles.advocate.clone()),
        )
        .await
    {
        Ok(r) => r,
        Err(e) => return degraded_verdict(ctx, claim, context_id, &e.to_string()).await,
    };
    workflow.transition(ctx.deps.clock.as_ref(), DebateState::Advocated, "advocate responded");

    let mut answer_pct = f32_field(&advocate.value, "answerPct", 50.0);
    let mut confidence_pct = f32_field(&advocate.value, "confidencePct", 0.0);
    let short_answer = str_field(&advocate.value, "shortAnswer");
    let boundary_findings = str_field(&advocate.value, "boundaryFindings");
    let raw_factors = array_field(&advocate.value, "keyFactors");
    let mut key_factors = key_factors_from_json(raw_factors, &evidence_ids);

    // --- Self-consistency ---
    let mut sc_vars = HashMap::new();
    sc_vars.insert("claimText".to_string(), claim.text.clone());
    sc_vars.insert("evidenceJson".to_string(), evidence_json.clone());
    sc_vars.insert("candidateAnswerPct".to_string(), answer_pct.to_string());
    let sc_schema = json!({
        "required": ["consistencyScore"],
        "properties": {"consistencyScore": {"type": "number"}},
    });
    let consistency_result = match ctx
        .call_llm(
            TaskKey::DebateSelfConsistency,
            "debate.self_consistency",
            "You resample the advocate's reasoning and report how consistent independent \
             samples are with each other, on a 0-1 scale.",
            &sc_vars,
            sc_schema,
            Some(roles.self_consistency.clone()),
        )
        .await
    {
        Ok(r) => {
            let score = f32_field(&r.value, "consistencyScore", 1.0).clamp(0.0, 1.0);
            let low = score < CONSISTENCY_THRESHOLD;
            if low {
                confidence_pct *= LOW_CONSISTENCY_PENALTY;
                ctx.warnings
                    .push(
                        AnalysisWarning::new(
                            WarningType::LowConsistency,
                            format!("self-consistency score {score:.2} below threshold for claim {}", claim.id),
                        )
                        .with_details(json!({
                            "claimId": claim.id,
                            "contextId": context_id,
                            "consistencyScore": score,
                        })),
                    )
                    .await;
            }
            workflow.transition(
                ctx.deps.clock.as_ref(),
                if low { DebateState::LowConsistency } else { DebateState::Consistent },
                "self-consistency sampled",
            );
            ConsistencyResult {
                samples: SELF_CONSISTENCY_SAMPLES,
                consistency_score: score,
                low_consistency: low,
            }
        }
        Err(e) => return degraded_verdict(ctx, claim, context_id, &e.to_string()).await,
    };

    // --- Adversarial challenge ---
    let mut ch_vars = HashMap::new();
    ch_vars.insert("claimText".to_string(), claim.text.clone());
    ch_vars.insert("evidenceJson".to_string(), evidence_json.clone());
    ch_vars.insert("candidateAnswerPct".to_string(), answer_pct.to_string());
    ch_vars.insert(
        "keyFactorsJson".to_string(),
        serde_json::to_string(&key_factors).unwrap_or_default(),
    );
    let ch_schema = json!({
        "required": ["challenges"],
        "properties": {"challenges": {"type": "array"}},
    });
    let (surviving_challenges, baseless_rate) = match ctx
        .call_llm(
            TaskKey::DebateChallenge,
            "debate.challenge",
            "You are the adversarial challenger: raise the strongest objections to the \
             advocate's verdict, each grounded in a cited evidence id.",
            &ch_vars,
            ch_schema,
            Some(roles.challenger.clone()),
        )
        .await
    {
        Ok(r) => {
            let raw = array_field(&r.value, "challenges");
            let total = raw.len();
            let mut survivors = Vec::new();
            let mut dropped = 0usize;
            for c in raw {
                let cited = str_array_field(c, "citedEvidenceIds");
                let grounded = cited.iter().any(|id| evidence_ids.contains(id.as_str()));
                if grounded {
                    survivors.push((str_field(c, "id"), str_field(c, "point"), cited));
                } else {
                    dropped += 1;
                }
            }
            let rate = if total == 0 { 0.0 } else { dropped as f32 / total as f32 };
            ctx.metrics.record_challenges(total as u32, dropped as u32);
            if dropped > 0 {
                ctx.warnings
                    .push(
                        AnalysisWarning::new(
                            WarningType::BaselessAdversarialChallenge,
                            format!("{dropped} of {total} challenges for claim {} had no grounded evidence citation", claim.id),
                        )
                        .with_details(json!({
                            "claimId": claim.id,
                            "contextId": context_id,
                            "baselessAdjustmentRate": rate,
                        })),
                    )
                    .await;
            }
            workflow.transition(ctx.deps.clock.as_ref(), DebateState::Challenged, "challenges enforced");
            (survivors, rate)
        }
        Err(e) => return degraded_verdict(ctx, claim, context_id, &e.to_string()).await,
    };

    // --- Reconciliation ---
    let mut rec_vars = HashMap::new();
    rec_vars.insert("claimText".to_string(), claim.text.clone());
    rec_vars.insert("candidateAnswerPct".to_string(), answer_pct.to_string());
    rec_vars.insert(
        "challengesJson".to_string(),
        serde_json::to_string(
            &surviving_challenges
                .iter()
                .map(|(id, point, cited)| json!({"id": id, "point": point, "citedEvidenceIds": cited}))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default(),
    );
    let rec_schema = json!({
        "required": ["answerPct", "confidencePct", "challengeResponses"],
        "properties": {
            "answerPct": {"type": "number"},
            "confidencePct": {"type": "number"},
            "challengeResponses": {"type": "array"}
        },
    });
    let challenge_responses = match ctx
        .call_llm(
            TaskKey::DebateReconcile,
            "debate.reconcile",
            "You reconcile the advocate's verdict against surviving challenges, producing a \
             final answer and a response to every surviving challenge.",
            &rec_vars,
            rec_schema,
            Some(roles.reconciler.clone()),
        )
        .await
    {
        Ok(r) => {
            answer_pct = f32_field(&r.value, "answerPct", answer_pct);
            confidence_pct = f32_field(&r.value, "confidencePct", confidence_pct);
            let raw_responses = array_field(&r.value, "challengeResponses");
            let known_challenge_ids: HashSet<&str> =
                surviving_challenges.iter().map(|(id, _, _)| id.as_str()).collect();
            let responses: Vec<ChallengeResponse> = raw_responses
                .iter()
                .map(|c| ChallengeResponse {
                    challenge_id: str_field(c, "challengeId"),
                    response: str_field(c, "response"),
                    conceded: bool_field(c, "conceded", false),
                })
                .filter(|c| known_challenge_ids.contains(c.challenge_id.as_str()))
                .collect();
            workflow.transition(ctx.deps.clock.as_ref(), DebateState::Reconciled, "reconciled");
            responses
        }
        Err(e) => return degraded_verdict(ctx, claim, context_id, &e.to_string()).await,
    };

    // --- Validation ---
    let mut val_vars = HashMap::new();
    val_vars.insert("claimText".to_string(), claim.text.clone());
    val_vars.insert("candidateAnswerPct".to_string(), answer_pct.to_string());
    val_vars.insert(
        "keyFactorsJson".to_string(),
        serde_json::to_string(&key_factors).unwrap_or_default(),
    );
    let val_schema = json!({
        "required": ["isInverted", "harmPotential", "isContested", "factualBasis"],
        "properties": {
            "isInverted": {"type": "boolean"},
            "harmPotential": {"type": "string"},
            "isContested": {"type": "boolean"},
            "factualBasis": {"type": "string"}
        },
    });
    let (is_inverted, harm_potential, is_contested, factual_basis) = match ctx
        .call_llm(
            TaskKey::DebateValidate,
            "debate.validate",
            "You validate grounding, direction, and harm classification of the reconciled \
             verdict.",
            &val_vars,
            val_schema,
            Some(roles.validation.clone()),
        )
        .await
    {
        Ok(r) => {
            if let Some(refreshed) = r.value.get("keyFactors").and_then(serde_json::Value::as_array) {
                if !refreshed.is_empty() {
                    key_factors = key_factors_from_json(refreshed, &evidence_ids);
                }
            }
            let inverted = bool_field(&r.value, "isInverted", false);
            if inverted {
                if let Some(corrected) = r.value.get("correctedAnswerPct").and_then(serde_json::Value::as_f64) {
                    answer_pct = corrected as f32;
                } else {
                    answer_pct = 100.0 - answer_pct;
                }
            }
            workflow.transition(ctx.deps.clock.as_ref(), DebateState::Validated, "validated");
            (
                inverted,
                parse_harm(&str_field(&r.value, "harmPotential")),
                bool_field(&r.value, "isContested", false),
                parse_factual_basis(&str_field(&r.value, "factualBasis")),
            )
        }
        Err(e) => return degraded_verdict(ctx, claim, context_id, &e.to_string()).await,
    };

    workflow.transition(ctx.deps.clock.as_ref(), DebateState::Finalized, "debate complete");
    let _ = baseless_rate; // recorded via the warning; not separately surfaced on the verdict.
    let _ = workflow;

    let mut verdict = ClaimVerdict {
        claim_id: claim.id.clone(),
        context_id: context_id.to_string(),
        answer_pct,
        confidence_pct,
        short_answer,
        key_factors,
        boundary_findings,
        consistency_result,
        challenge_responses,
        triangulation_score: 0.0,
        is_inverted,
        harm_potential,
        is_contested,
        factual_basis,
        verdict_band: factharbor_types::VerdictBand::Mixed,
    };
    verdict.clamp_ranges();
    verdict
}

/// Groups evidence by `(claimId, contextId)` and runs one debate per group,
/// bounded by the pipeline's configured concurrency (§5).
pub async fn run(
    ctx: &PipelineContext,
    claims: &[AtomicClaim],
    evidence: &[EvidenceItem],
) -> Vec<ClaimVerdict> {
    let mut groups: HashMap<(String, String), Vec<&EvidenceItem>> = HashMap::new();
    for item in evidence {
        groups
            .entry((item.claim_id.clone(), item.context_id.clone()))
            .or_default()
            .push(item);
    }

    let claims_by_id: HashMap<&str, &AtomicClaim> = claims.iter().map(|c| (c.id.as_str(), c)).collect();
    let concurrency = ctx.config.pipeline.concurrency_limit.max(1);

    let mut verdicts: Vec<ClaimVerdict> = stream::iter(groups.into_iter())
        .map(|((claim_id, context_id), items)| async move {
            let claim = *claims_by_id.get(claim_id.as_str())?;
            if ctx.cancel.is_cancelled() {
                return None;
            }
            Some(run_debate(ctx, claim, &context_id, &items).await)
        })
        .buffer_unordered(concurrency)
        .filter_map(|x| async { x })
        .collect()
        .await;

    // `(claim, context)` debates finish in whatever order the bounded
    // fan-out above happens to resolve them; Stage 5 must never observe
    // that (§5: "consume sorted results by stable id").
    verdicts.sort_by(|a, b| (a.claim_id.as_str(), a.context_id.as_str()).cmp(&(b.claim_id.as_str(), b.context_id.as_str())));
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_factors_drop_entries_with_no_grounded_citation() {
        let valid_ids: HashSet<&str> = ["ev-0001", "ev-0002"].into_iter().collect();
        let raw = vec![
            json!({"factor": "f1", "explanation": "e1", "supports": "supports", "weight": "high", "citedEvidenceIds": ["ev-0001"]}),
            json!({"factor": "f2", "explanation": "e2", "supports": "refutes", "weight": "low", "citedEvidenceIds": ["ev-9999"]}),
        ];
        let factors = key_factors_from_json(&raw, &valid_ids);
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].factor, "f1");
    }

    #[test]
    fn parse_support_defaults_to_neutral_on_unknown_string() {
        assert_eq!(parse_support("strongly_supports"), Support::StronglySupports);
        assert_eq!(parse_support("garbage"), Support::Neutral);
    }

    #[test]
    fn parse_harm_defaults_to_medium_on_unknown_string() {
        assert_eq!(parse_harm("high"), HarmPotential::High);
        assert_eq!(parse_harm("nonsense"), HarmPotential::Medium);
    }
}
