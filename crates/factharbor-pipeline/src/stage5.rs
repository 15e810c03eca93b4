//! Stage 5 — Aggregation (§4.I, Gate 4).

use std::collections::{HashMap, HashSet};

use factharbor_types::{
    AtomicClaim, Centrality, ClaimVerdict, CoverageMatrix, EvidenceItem, HarmPotential, Input,
    OverallAssessment, ProbativeValue, QualityGate, QualityGates, SourceType, TaskKey, VerdictBand,
};
use serde_json::json;

use crate::context::{PipelineContext, PipelineState};
use crate::jsonutil::str_field;

/// Base per-claim weight before contestation discounting (§4.I.2). Neither
/// the spec nor the original source fixes numeric values for centrality or
/// harm-potential multipliers, so these are this implementation's resolved
/// Open Question (DESIGN.md): centrality dominates (high claims drive the
/// aggregate far more than low ones), harm potential nudges the weight up
/// slightly so high-harm claims get more scrutiny rather than more benefit
/// of the doubt.
fn centrality_weight(c: Centrality) -> f32 {
    match c {
        Centrality::High => 1.0,
        Centrality::Medium => 0.6,
        Centrality::Low => 0.3,
    }
}

fn harm_potential_multiplier(h: HarmPotential) -> f32 {
    match h {
        HarmPotential::High => 1.15,
        HarmPotential::Medium => 1.0,
        HarmPotential::Low => 0.9,
    }
}

fn probative_value_key(v: ProbativeValue) -> &'static str {
    match v {
        ProbativeValue::High => "high",
        ProbativeValue::Medium => "medium",
        ProbativeValue::Low => "low",
    }
}

fn source_type_key(t: SourceType) -> &'static str {
    match t {
        SourceType::PeerReviewedStudy => "peer_reviewed_study",
        SourceType::FactCheckReport => "fact_check_report",
        SourceType::GovernmentReport => "government_report",
        SourceType::LegalDocument => "legal_document",
        SourceType::NewsPrimary => "news_primary",
        SourceType::NewsSecondary => "news_secondary",
        SourceType::ExpertStatement => "expert_statement",
        SourceType::OrganizationReport => "organization_report",
        SourceType::Other => "other",
    }
}

fn factual_basis_key(fb: factharbor_types::FactualBasis) -> &'static str {
    match fb {
        factharbor_types::FactualBasis::Established => "established",
        factharbor_types::FactualBasis::Disputed => "disputed",
        factharbor_types::FactualBasis::Opinion => "opinion",
        factharbor_types::FactualBasis::Alleged => "alleged",
        factharbor_types::FactualBasis::Unknown => "unknown",
    }
}

/// `triangulationScore(claim)` (§4.I.1): the literal wording ("fraction of
/// evidence items that come from ≥2 distinct authorities AND ≥2 distinct
/// types") describes a property of the whole evidence set, not a
/// per-item fraction. Resolved Open Question (DESIGN.md): treat it as
/// partial credit toward full diversity — `min(|authorities|,2)/2 *
/// min(|types|,2)/2` — so a claim with exactly one authority or one type
/// never reaches 1.0, and more than two of each doesn't inflate it further.
fn triangulation_score(evidence: &[&EvidenceItem]) -> f32 {
    if evidence.is_empty() {
        return 0.0;
    }
    let authorities: HashSet<&str> = evidence.iter().map(|e| e.source_authority.as_str()).collect();
    let types: HashSet<SourceType> = evidence.iter().map(|e| e.source_type).collect();
    let authority_factor = (authorities.len().min(2) as f32) / 2.0;
    let type_factor = (types.len().min(2) as f32) / 2.0;
    authority_factor * type_factor
}

/// Weighted base for one `(claim, context)` verdict (§4.I.2): centrality ×
/// harm-potential × probative-value × source-type calibration, averaged
/// over the evidence actually backing this verdict.
fn base_weight(ctx: &PipelineContext, claim: &AtomicClaim, verdict: &ClaimVerdict, evidence: &[&EvidenceItem]) -> f32 {
    let pv_weights = &ctx.config.calculation.probative_value_weights;
    let st_calibration = &ctx.config.calculation.source_type_calibration;

    let (pv_sum, st_sum): (f32, f32) = evidence.iter().fold((0.0, 0.0), |(pv, st), e| {
        let pv_w = pv_weights.get(probative_value_key(e.probative_value)).copied().unwrap_or(0.8);
        let st_w = st_calibration.get(source_type_key(e.source_type)).copied().unwrap_or(0.5);
        (pv + pv_w, st + st_w)
    });
    let n = evidence.len().max(1) as f32;
    let avg_pv = if evidence.is_empty() { 0.8 } else { pv_sum / n };
    let avg_st = if evidence.is_empty() { 0.5 } else { st_sum / n };

    let mut weight = centrality_weight(claim.centrality) * harm_potential_multiplier(verdict.harm_potential) * avg_pv * avg_st;

    if verdict.is_contested {
        let cw = ctx
            .config
            .calculation
            .contestation_weights
            .get(factual_basis_key(verdict.factual_basis))
            .copied()
            .unwrap_or(1.0);
        weight *= cw;
    }

    weight.max(0.0)
}

struct ClaimAggregate {
    confidence: f32,
    gate: QualityGate,
}

fn narrative_schema() -> serde_json::Value {
    json!({
        "required": ["overallSummary"],
        "properties": {
            "overallSummary": {"type": "string"},
            "contextNarratives": {"type": "array"}
        },
        "x-quality-critical": ["overallSummary"]
    })
}

pub async fn run(
    ctx: &PipelineContext,
    _input: &Input,
    state: &PipelineState,
    mut verdicts: Vec<ClaimVerdict>,
) -> OverallAssessment {
    let claims = &state.claims;
    let contexts = &state.contexts;
    let claims_by_id: HashMap<&str, &AtomicClaim> = claims.iter().map(|c| (c.id.as_str(), c)).collect();

    // Triangulation (§4.I.1): computed per claim over ALL of that claim's
    // surviving evidence, independent of which context a given verdict
    // belongs to.
    let bands = &ctx.config.calculation.verdict_bands;
    for verdict in verdicts.iter_mut() {
        let claim_evidence = state.evidence_for_claim(&verdict.claim_id);
        verdict.triangulation_score = triangulation_score(&claim_evidence);
        verdict.verdict_band = VerdictBand::classify(
            verdict.answer_pct,
            bands.true_min,
            bands.mostly_true_min,
            bands.leaning_true_min,
            bands.mixed_min,
            bands.leaning_false_min,
            bands.mostly_false_min,
        );
    }

    // Weighted aggregation per claim across contexts (§4.I.2). Confidence
    // measures certainty, not direction, so it is never flipped for a
    // counter-claim here — this loop only ever touches a claim's own
    // keyed-by-claim_id aggregate, so inverting confidence would just
    // mangle that claim's own Gate 4 bucket rather than the thesis it
    // inverts. The polarity flip itself (§4.I.2 "flip polarity … but do not
    // reduce weight") is applied to the answer, not the confidence, where it
    // is actually consumed: the narrative payload built below.
    let mut weighted_sum: HashMap<String, f32> = HashMap::new();
    let mut weight_total: HashMap<String, f32> = HashMap::new();
    for verdict in &verdicts {
        let Some(claim) = claims_by_id.get(verdict.claim_id.as_str()) else { continue };
        let claim_context_evidence: Vec<&EvidenceItem> = state
            .evidence_for_claim(&verdict.claim_id)
            .into_iter()
            .filter(|e| e.context_id == verdict.context_id)
            .collect();
        let weight = base_weight(ctx, claim, verdict, &claim_context_evidence);

        *weighted_sum.entry(verdict.claim_id.clone()).or_insert(0.0) += verdict.confidence_pct * weight;
        *weight_total.entry(verdict.claim_id.clone()).or_insert(0.0) += weight;
    }

    let mut per_claim_aggregate: HashMap<String, ClaimAggregate> = HashMap::new();
    for claim in claims {
        let total_weight = weight_total.get(&claim.id).copied().unwrap_or(0.0);
        let confidence = if total_weight > 0.0 {
            weighted_sum.get(&claim.id).copied().unwrap_or(0.0) / total_weight
        } else {
            0.0
        };
        let gate = QualityGate::from_confidence_pct(confidence);
        per_claim_aggregate.insert(claim.id.clone(), ClaimAggregate { confidence, gate });
    }

    // Overall confidence: check-worthiness-weighted mean over central
    // claims (falls back to all claims if none are central) — an Open
    // Question the spec leaves unresolved (DESIGN.md).
    let central: Vec<&AtomicClaim> = claims.iter().filter(|c| c.is_central).collect();
    let pool: Vec<&AtomicClaim> = if central.is_empty() { claims.iter().collect() } else { central };
    let (overall_num, overall_den) = pool.iter().fold((0.0f32, 0.0f32), |(num, den), c| {
        let agg_confidence = per_claim_aggregate.get(&c.id).map(|a| a.confidence).unwrap_or(0.0);
        let w = c.check_worthiness.max(0.01);
        (num + agg_confidence * w, den + w)
    });
    let overall_confidence = if overall_den > 0.0 { overall_num / overall_den } else { 0.0 };
    let overall_gate = QualityGate::from_confidence_pct(overall_confidence);

    // Narrative generation (§4.I.3), verdict tier, grounded in claim + verdict ids.
    let claims_json = serde_json::to_string(
        &claims.iter().map(|c| json!({"id": c.id, "text": c.text})).collect::<Vec<_>>(),
    )
    .unwrap_or_default();
    let verdicts_json = serde_json::to_string(
        &verdicts
            .iter()
            .map(|v| {
                // Counter-claims test the thesis's inverse (§4.I.2 "flip
                // polarity … but do not reduce weight"); the narrative is
                // what actually consumes that inversion, so `answerPct` is
                // flipped here for the writer's benefit while the verdict's
                // own stored `answerPct`/`confidencePct` stay untouched.
                let is_counter = claims_by_id.get(v.claim_id.as_str()).map(|c| c.is_counter_claim).unwrap_or(false);
                let effective_answer_pct = if is_counter { 100.0 - v.answer_pct } else { v.answer_pct };
                json!({
                    "claimId": v.claim_id,
                    "contextId": v.context_id,
                    "answerPct": v.answer_pct,
                    "effectiveAnswerPct": effective_answer_pct,
                    "confidencePct": v.confidence_pct,
                    "shortAnswer": v.short_answer,
                })
            })
            .collect::<Vec<_>>(),
    )
    .unwrap_or_default();

    let mut narrative_vars = HashMap::new();
    narrative_vars.insert("claimsJson".to_string(), claims_json);
    narrative_vars.insert("verdictsJson".to_string(), verdicts_json);

    let verdict_narrative = if verdicts.is_empty() {
        String::new()
    } else {
        match ctx
            .call_llm(
                TaskKey::VerdictNarrative,
                "verdict.narrative",
                "You write a grounded fact-check narrative citing claim ids, one paragraph per \
                 analysis context plus an overall summary.",
                &narrative_vars,
                narrative_schema(),
                None,
            )
            .await
        {
            Ok(result) => {
                let summary = str_field(&result.value, "overallSummary");
                let context_paragraphs: Vec<String> = result
                    .value
                    .get("contextNarratives")
                    .and_then(serde_json::Value::as_array)
                    .map(|arr| arr.iter().map(|p| str_field(p, "narrative")).filter(|s| !s.is_empty()).collect())
                    .unwrap_or_default();
                if context_paragraphs.is_empty() {
                    summary
                } else {
                    format!("{summary}\n\n{}", context_paragraphs.join("\n\n"))
                }
            }
            Err(e) => {
                ctx.warnings
                    .push(
                        factharbor_types::AnalysisWarning::new(
                            factharbor_types::WarningType::AnalysisGenerationFailed,
                            format!("narrative generation failed: {e}"),
                        )
                        .with_details(json!({"stage": "aggregation"})),
                    )
                    .await;
                String::new()
            }
        }
    };

    // Coverage matrix (§4.I.5): which (claim, context) pairs were actually evaluated.
    let mut coverage_matrix: CoverageMatrix = HashMap::new();
    for verdict in &verdicts {
        coverage_matrix
            .entry(verdict.claim_id.clone())
            .or_default()
            .insert(verdict.context_id.clone(), true);
    }
    for claim in claims {
        let entry = coverage_matrix.entry(claim.id.clone()).or_default();
        for context in contexts {
            entry.entry(context.id.clone()).or_insert(false);
        }
    }

    let quality_gates = QualityGates {
        overall: overall_gate,
        per_claim: per_claim_aggregate.into_iter().map(|(id, agg)| (id, agg.gate)).collect(),
    };

    let analysis_warnings = ctx.warnings.snapshot().await;

    OverallAssessment {
        status: factharbor_types::JobStatus::Succeeded,
        fatal_reason: None,
        verdict_narrative,
        claim_boundaries: contexts.to_vec(),
        claim_verdicts: verdicts,
        coverage_matrix,
        quality_gates,
        analysis_warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factharbor_types::{ClaimDirection, EvidenceScope};

    fn evidence(id: &str, claim_id: &str, authority: &str, source_type: SourceType) -> EvidenceItem {
        EvidenceItem {
            id: id.to_string(),
            claim_id: claim_id.to_string(),
            statement: "a".repeat(25),
            source_url: "https://example.com".to_string(),
            source_excerpt: "b".repeat(35),
            source_authority: authority.to_string(),
            evidence_basis: String::new(),
            source_type,
            category: String::new(),
            probative_value: ProbativeValue::High,
            claim_direction: ClaimDirection::Supports,
            evidence_scope: None::<EvidenceScope>,
            derivative_claim_unverified: false,
            context_id: "ctx-1".to_string(),
        }
    }

    #[test]
    fn triangulation_requires_two_distinct_authorities_and_types() {
        let a = evidence("e1", "c1", "NOAA", SourceType::GovernmentReport);
        let b = evidence("e2", "c1", "NOAA", SourceType::GovernmentReport);
        assert_eq!(triangulation_score(&[&a, &b]), 0.0);

        let c = evidence("e3", "c1", "Reuters", SourceType::NewsPrimary);
        assert_eq!(triangulation_score(&[&a, &c]), 1.0);
    }

    #[test]
    fn triangulation_is_zero_for_empty_evidence() {
        assert_eq!(triangulation_score(&[]), 0.0);
    }
}
