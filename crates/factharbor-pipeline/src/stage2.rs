//! Stage 2 — Research (§4.F).

use std::collections::HashMap;

use factharbor_config::QueryStrategyMode;
use factharbor_types::{
    AtomicClaim, ClaimDirection, EvidenceItem, EvidenceScope, ProbativeValue, SearchOptions,
    SourceType, TaskKey, WarningType,
};
use futures::stream::{self, StreamExt};
use serde_json::json;

use crate::context::PipelineContext;
use crate::jsonutil::{bool_field, f32_field, str_field};
use crate::text::normalize_for_dedup;
use crate::PipelineError;

/// Hits below this relevance score never reach evidence extraction.
const RELEVANCE_THRESHOLD: f32 = 0.5;

const VAGUE_PHRASES: &[&str] = &[
    "some say",
    "many believe",
    "it is said",
    "reportedly",
    "experts suggest",
];

fn parse_source_type(s: &str) -> SourceType {
    match s {
        "peer_reviewed_study" => SourceType::PeerReviewedStudy,
        "fact_check_report" => SourceType::FactCheckReport,
        "government_report" => SourceType::GovernmentReport,
        "legal_document" => SourceType::LegalDocument,
        "news_primary" => SourceType::NewsPrimary,
        "news_secondary" => SourceType::NewsSecondary,
        "expert_statement" => SourceType::ExpertStatement,
        "organization_report" => SourceType::OrganizationReport,
        _ => SourceType::Other,
    }
}

fn parse_probative_value(s: &str) -> ProbativeValue {
    match s {
        "high" => ProbativeValue::High,
        "low" => ProbativeValue::Low,
        _ => ProbativeValue::Medium,
    }
}

fn parse_claim_direction(s: &str) -> ClaimDirection {
    match s {
        "supports" => ClaimDirection::Supports,
        "refutes" => ClaimDirection::Refutes,
        _ => ClaimDirection::Neutral,
    }
}

fn order_queries(raw: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut supporting: Vec<(String, String)> =
        raw.iter().filter(|(_, l)| l == "supporting").cloned().collect();
    let mut refuting: Vec<(String, String)> =
        raw.iter().filter(|(_, l)| l == "refuting").cloned().collect();
    let unlabeled: Vec<(String, String)> = raw
        .into_iter()
        .filter(|(_, l)| l != "supporting" && l != "refuting")
        .collect();

    let mut ordered = Vec::new();
    while !supporting.is_empty() || !refuting.is_empty() {
        if !supporting.is_empty() {
            ordered.push(supporting.remove(0));
        }
        if !refuting.is_empty() {
            ordered.push(refuting.remove(0));
        }
    }
    ordered.extend(unlabeled);
    ordered
}

fn jaccard(a: &str, b: &str) -> f32 {
    let sa: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let sb: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

pub async fn run(
    ctx: &PipelineContext,
    claims: &[AtomicClaim],
) -> Result<Vec<EvidenceItem>, PipelineError> {
    let central_claims: Vec<&AtomicClaim> = claims.iter().filter(|c| c.is_central).collect();
    if central_claims.is_empty() {
        return Ok(Vec::new());
    }

    let mode = match ctx.config.search.query_strategy_mode {
        QueryStrategyMode::Legacy => "legacy",
        QueryStrategyMode::ProCon => "pro_con",
    };
    let max_iterations = ctx.config.pipeline.max_iterations_per_scope;
    let max_total_iterations = ctx.config.pipeline.max_total_iterations;

    let mut all_evidence: Vec<EvidenceItem> = Vec::new();
    let mut total_iterations = 0u32;

    'outer: for claim in &central_claims {
        if ctx.cancel.is_cancelled() {
            break;
        }
        if ctx
            .query_budget
            .all_exhausted(central_claims.iter().map(|c| c.id.as_str()))
        {
            break;
        }

        for _iteration in 0..max_iterations {
            if total_iterations >= max_total_iterations {
                break 'outer;
            }
            if ctx.query_budget.remaining(&claim.id) <= 0 {
                break;
            }
            total_iterations += 1;

            let mut vars = HashMap::new();
            vars.insert("claimText".to_string(), claim.text.clone());
            vars.insert("mode".to_string(), mode.to_string());

            let schema = json!({
                "required": ["queries"],
                "properties": {"queries": {"type": "array"}},
            });
            let generated = ctx
                .call_llm(
                    TaskKey::QueryGenerate,
                    "research.query_generate",
                    "You generate targeted fact-checking search queries.",
                    &vars,
                    schema,
                    None,
                )
                .await;
            let Ok(generated) = generated else { continue };

            let raw_queries: Vec<(String, String)> = generated
                .value
                .get("queries")
                .and_then(serde_json::Value::as_array)
                .map(|a| {
                    a.iter()
                        .map(|q| (str_field(q, "query"), str_field(q, "label")))
                        .filter(|(q, _)| !q.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let queries = order_queries(raw_queries);

            for (query_text, _label) in queries {
                if ctx.query_budget.remaining(&claim.id) <= 0 {
                    break;
                }
                ctx.query_budget.consume(&claim.id, 1);

                let hits = ctx
                    .deps
                    .search
                    .query(&query_text, &claim.id, &SearchOptions::default())
                    .await
                    .unwrap_or_default();

                let concurrency = ctx.config.pipeline.concurrency_limit.max(1);
                let extracted: Vec<EvidenceItem> = stream::iter(hits)
                    .map(|hit| async {
                        classify_and_extract(ctx, claim, &hit).await
                    })
                    .buffer_unordered(concurrency)
                    .filter_map(|x| async { x })
                    .collect()
                    .await;

                all_evidence.extend(extracted);
            }
        }
    }

    // Bounded-concurrency extraction above completes hits in whatever order
    // the LLM gateway happens to resolve them, so ids cannot be minted
    // inside `classify_and_extract` itself (§5: "ordering across parallel
    // calls is never observable by later stages... consume sorted results
    // by stable id", §8 idempotence). Sort by a stable content key first,
    // then mint ids over the now-deterministic order.
    all_evidence.sort_by(|a, b| (&a.source_url, &a.statement).cmp(&(&b.source_url, &b.statement)));
    for item in all_evidence.iter_mut() {
        item.id = ctx.ids.next_evidence_id();
    }

    if ctx
        .query_budget
        .all_exhausted(central_claims.iter().map(|c| c.id.as_str()))
    {
        ctx.warnings
            .push(
                factharbor_types::AnalysisWarning::new(
                    WarningType::QueryBudgetExhausted,
                    "query budget exhausted for all central claims",
                )
                .with_details(json!({
                    "stage": "research",
                    "usage": ctx.query_budget.usage_snapshot(),
                    "failureModeBucket": "research_budget",
                })),
            )
            .await;
    }

    Ok(quality_filter_and_dedup(ctx, all_evidence))
}

async fn classify_and_extract(
    ctx: &PipelineContext,
    claim: &AtomicClaim,
    hit: &factharbor_types::SearchHit,
) -> Option<EvidenceItem> {
    let mut rel_vars = HashMap::new();
    rel_vars.insert("claimText".to_string(), claim.text.clone());
    rel_vars.insert("hitTitle".to_string(), hit.title.clone());
    rel_vars.insert("hitSnippet".to_string(), hit.snippet.clone());

    let rel_schema = json!({
        "required": ["relevance"],
        "properties": {"relevance": {"type": "number"}},
    });
    let relevance = ctx
        .call_llm(
            TaskKey::RelevanceClassify,
            "research.relevance_classify",
            "You rate search-hit relevance to a claim on a 0-1 scale.",
            &rel_vars,
            rel_schema,
            None,
        )
        .await
        .ok()?;
    let score = f32_field(&relevance.value, "relevance", 0.0);
    if score < RELEVANCE_THRESHOLD {
        return None;
    }

    let mut ex_vars = HashMap::new();
    ex_vars.insert("claimText".to_string(), claim.text.clone());
    ex_vars.insert("hitTitle".to_string(), hit.title.clone());
    ex_vars.insert("hitSnippet".to_string(), hit.snippet.clone());
    ex_vars.insert("hitUrl".to_string(), hit.url.clone());

    let ex_schema = json!({
        "required": ["statement", "sourceExcerpt"],
        "properties": {
            "statement": {"type": "string"},
            "sourceExcerpt": {"type": "string"}
        },
        "x-quality-critical": ["statement"]
    });
    let extracted = ctx
        .call_llm(
            TaskKey::EvidenceExtract,
            "research.evidence_extract",
            "You extract one verifiable EvidenceItem from a search hit.",
            &ex_vars,
            ex_schema,
            None,
        )
        .await
        .ok()?;

    let v = &extracted.value;
    Some(EvidenceItem {
        // Minted later, after the concurrent extraction batch is collected
        // and sorted by a stable content key (§5, §8) — see `run`.
        id: String::new(),
        claim_id: claim.id.clone(),
        statement: str_field(v, "statement"),
        source_url: hit.url.clone(),
        source_excerpt: str_field(v, "sourceExcerpt"),
        source_authority: str_field(v, "sourceAuthority"),
        evidence_basis: str_field(v, "evidenceBasis"),
        source_type: parse_source_type(&str_field(v, "sourceType")),
        category: str_field(v, "category"),
        probative_value: parse_probative_value(&str_field(v, "probativeValue")),
        claim_direction: parse_claim_direction(&str_field(v, "claimDirection")),
        evidence_scope: None::<EvidenceScope>,
        derivative_claim_unverified: bool_field(v, "derivativeClaimUnverified", false),
        context_id: factharbor_types::CTX_UNSCOPED.to_string(),
    })
}

fn quality_filter_and_dedup(ctx: &PipelineContext, items: Vec<EvidenceItem>) -> Vec<EvidenceItem> {
    let filter_cfg = &ctx.config.calculation.evidence_filter;
    let mut survivors: Vec<EvidenceItem> = Vec::new();
    let mut normalized_seen: Vec<String> = Vec::new();

    for item in items {
        if item.statement.len() < filter_cfg.min_statement_length {
            continue;
        }
        if filter_cfg.require_source_excerpt
            && item.source_excerpt.len() < filter_cfg.min_excerpt_length
        {
            continue;
        }
        let vague_count = VAGUE_PHRASES
            .iter()
            .filter(|p| item.statement.to_lowercase().contains(*p))
            .count();
        if vague_count > filter_cfg.max_vague_phrase_count {
            continue;
        }

        let normalized = normalize_for_dedup(&item.statement);
        let is_dup = normalized_seen
            .iter()
            .any(|seen| jaccard(seen, &normalized) >= filter_cfg.deduplication_threshold);
        if is_dup {
            continue;
        }
        normalized_seen.push(normalized);
        survivors.push(item);
    }

    survivors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_queries_interleaves_pro_con_then_appends_unlabeled() {
        let raw = vec![
            ("supports A".to_string(), "supporting".to_string()),
            ("supports B".to_string(), "supporting".to_string()),
            ("refutes A".to_string(), "refuting".to_string()),
            ("catch-all".to_string(), "".to_string()),
        ];
        let ordered = order_queries(raw);
        let texts: Vec<&str> = ordered.iter().map(|(q, _)| q.as_str()).collect();
        assert_eq!(
            texts,
            vec!["supports A", "refutes A", "supports B", "catch-all"]
        );
    }

    #[test]
    fn order_queries_never_drops_unlabeled_entries() {
        let raw = vec![("only unlabeled".to_string(), "".to_string())];
        let ordered = order_queries(raw);
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn jaccard_identical_statements_is_one() {
        assert_eq!(jaccard("the sky is blue", "the sky is blue"), 1.0);
    }

    #[test]
    fn jaccard_disjoint_statements_is_zero() {
        assert_eq!(jaccard("the sky is blue", "water boils at sea level"), 0.0);
    }

    #[test]
    fn jaccard_partial_overlap_is_between_zero_and_one() {
        let score = jaccard("the sky is blue today", "the sky is grey today");
        assert!(score > 0.0 && score < 1.0);
    }
}
