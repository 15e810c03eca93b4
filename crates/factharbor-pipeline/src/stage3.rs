//! Stage 3 — Boundary Clustering (§4.G).

use std::collections::HashMap;

use factharbor_types::{
    AnalysisContext, ContextStatus, EvidenceScope, TaskKey, WarningType, CTX_GENERAL, CTX_UNSCOPED,
};
use serde_json::json;

use crate::context::{PipelineContext, PipelineState};
use crate::jsonutil::str_field;
use crate::text::name_similarity;
use crate::PipelineError;

fn cluster_schema() -> serde_json::Value {
    json!({
        "required": ["contexts"],
        "properties": {"contexts": {"type": "array"}},
    })
}

fn assign_schema() -> serde_json::Value {
    json!({
        "required": ["assignments"],
        "properties": {"assignments": {"type": "array"}},
    })
}

pub async fn run(ctx: &PipelineContext, state: &mut PipelineState) -> Result<(), PipelineError> {
    if state.evidence.is_empty() {
        return Ok(());
    }

    let claims_json = serde_json::to_string(
        &state
            .claims
            .iter()
            .map(|c| json!({"id": c.id, "text": c.text}))
            .collect::<Vec<_>>(),
    )
    .unwrap_or_default();
    let evidence_json = serde_json::to_string(
        &state
            .evidence
            .iter()
            .map(|e| json!({"id": e.id, "claimId": e.claim_id, "statement": e.statement}))
            .collect::<Vec<_>>(),
    )
    .unwrap_or_default();

    let mut cluster_vars = HashMap::new();
    cluster_vars.insert("claimsJson".to_string(), claims_json);
    cluster_vars.insert("evidenceJson".to_string(), evidence_json.clone());

    let clustered = ctx
        .call_llm(
            TaskKey::BoundaryCluster,
            "boundary.cluster",
            "You derive candidate analysis contexts (institution, jurisdiction, \
             methodology, boundaries, geographic, temporal scope) from evidence.",
            &cluster_vars,
            cluster_schema(),
            None,
        )
        .await
        .map_err(|e| PipelineError::AnalysisGenerationFailed(e.to_string()))?;

    let raw_contexts = clustered
        .value
        .get("contexts")
        .and_then(serde_json::Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut candidates: Vec<AnalysisContext> = raw_contexts
        .iter()
        .map(|raw| AnalysisContext {
            id: ctx.ids.next_context_id(),
            name: str_field(raw, "name"),
            short_name: str_field(raw, "shortName"),
            subject: str_field(raw, "subject"),
            methodology: non_empty(str_field(raw, "methodology")),
            boundaries: non_empty(str_field(raw, "boundaries")),
            geographic: non_empty(str_field(raw, "geographic")),
            temporal: non_empty(str_field(raw, "temporal")),
            status: ContextStatus::Candidate,
            outcome: None,
            constituent_scopes: Vec::new(),
        })
        .collect();

    let merged = merge_similar_contexts(candidates.drain(..).collect());

    let mut assign_vars = HashMap::new();
    assign_vars.insert("evidenceJson".to_string(), evidence_json);
    assign_vars.insert(
        "contextsJson".to_string(),
        serde_json::to_string(
            &merged
                .iter()
                .map(|c| json!({"id": c.id, "name": c.name, "subject": c.subject}))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default(),
    );

    let assigned = ctx
        .call_llm(
            TaskKey::ContextAssign,
            "boundary.context_assign",
            "You assign each evidence item to exactly one context id, or CTX_GENERAL if \
             cross-cutting, or CTX_UNSCOPED if uninferable.",
            &assign_vars,
            assign_schema(),
            None,
        )
        .await
        .map_err(|e| PipelineError::AnalysisGenerationFailed(e.to_string()))?;

    let valid_ids: std::collections::HashSet<String> =
        merged.iter().map(|c| c.id.clone()).collect();

    let mut assignment_by_evidence: HashMap<String, (String, Option<EvidenceScope>)> = HashMap::new();
    if let Some(assignments) = assigned.value.get("assignments").and_then(serde_json::Value::as_array) {
        for a in assignments {
            let evidence_id = str_field(a, "evidenceId");
            if evidence_id.is_empty() {
                continue;
            }
            let context_id = str_field(a, "contextId");
            let scope = a.get("evidenceScope").map(|s| EvidenceScope {
                name: str_field(s, "name"),
                methodology: non_empty(str_field(s, "methodology")),
                boundaries: non_empty(str_field(s, "boundaries")),
                geographic: non_empty(str_field(s, "geographic")),
                temporal: non_empty(str_field(s, "temporal")),
            });
            assignment_by_evidence.insert(evidence_id, (context_id, scope));
        }
    }

    let mut remapped_any = false;
    let evidence_ids: Vec<String> = state.evidence.iter().map(|e| e.id.clone()).collect();
    for evidence_id in evidence_ids {
        let (context_id, scope) = assignment_by_evidence
            .remove(&evidence_id)
            .unwrap_or((CTX_UNSCOPED.to_string(), None));
        let resolved = if context_id == CTX_GENERAL || context_id == CTX_UNSCOPED {
            context_id
        } else if valid_ids.contains(&context_id) {
            context_id
        } else {
            remapped_any = true;
            CTX_GENERAL.to_string()
        };
        state.assign_context(&evidence_id, &resolved, scope);
    }

    if remapped_any {
        ctx.warnings
            .push_simple(
                WarningType::ContextRemap,
                "one or more evidence items referenced an unknown context id; remapped to CTX_GENERAL",
            )
            .await;
    }

    state.contexts = merged;
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Pairwise-merges candidate contexts at semantic similarity ≥ 0.85 (§4.G.2,
/// §8: "∀ pair of contexts (a,b): sim(a,b) < 0.85" must hold on the
/// surviving set). Keeps the more specific (longer) name as the survivor.
fn merge_similar_contexts(mut candidates: Vec<AnalysisContext>) -> Vec<AnalysisContext> {
    let mut merged: Vec<AnalysisContext> = Vec::new();
    'outer: while let Some(mut next) = candidates.pop() {
        for existing in merged.iter_mut() {
            if name_similarity(&existing.name, &next.name) >= AnalysisContext::MERGE_SIMILARITY_THRESHOLD
            {
                if next.name.len() > existing.name.len() {
                    std::mem::swap(existing, &mut next);
                }
                existing.constituent_scopes.push(next.id.clone());
                existing.status = ContextStatus::Merged;
                continue 'outer;
            }
        }
        merged.push(next);
    }
    merged.reverse();
    for ctx in merged.iter_mut() {
        ctx.status = ContextStatus::Finalized;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, name: &str) -> AnalysisContext {
        AnalysisContext {
            id: id.to_string(),
            name: name.to_string(),
            short_name: name.to_string(),
            subject: String::new(),
            methodology: None,
            boundaries: None,
            geographic: None,
            temporal: None,
            status: ContextStatus::Candidate,
            outcome: None,
            constituent_scopes: Vec::new(),
        }
    }

    #[test]
    fn near_identical_names_merge_into_one_context() {
        let merged = merge_similar_contexts(vec![
            candidate("ctx-0001", "Well-to-Wheel methodology"),
            candidate("ctx-0002", "Well-to-Wheel methodology "),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, ContextStatus::Finalized);
    }

    #[test]
    fn distinct_methodologies_stay_separate_contexts() {
        let merged = merge_similar_contexts(vec![
            candidate("ctx-0001", "Well-to-Wheel methodology"),
            candidate("ctx-0002", "Tank-to-Wheel methodology"),
        ]);
        assert_eq!(merged.len(), 2);
        for pair in merged.windows(2) {
            assert!(name_similarity(&pair[0].name, &pair[1].name) < AnalysisContext::MERGE_SIMILARITY_THRESHOLD);
        }
    }

    #[test]
    fn merge_keeps_the_more_specific_longer_name() {
        let merged = merge_similar_contexts(vec![
            candidate("ctx-0001", "EPA report"),
            candidate("ctx-0002", "EPA 2023 annual emissions report"),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "EPA 2023 annual emissions report");
    }

    #[test]
    fn non_empty_turns_blank_strings_into_none() {
        assert_eq!(non_empty(String::new()), None);
        assert_eq!(non_empty("x".to_string()), Some("x".to_string()));
    }
}
