//! Stage 1 — Claim Boundary Extraction with Gate 1 (§4.E).

use std::collections::HashMap;

use factharbor_types::{
    AtomicClaim, Centrality, ClaimRole, Gate1FilterReason, Gate1Stats, ImpliedClaim, Input,
    TaskKey, WarningType,
};
use serde_json::json;

use crate::context::PipelineContext;
use crate::jsonutil::{bool_field, f32_field, str_array_field, str_field};
use crate::PipelineError;

const OPINION_CUES: &[&str] = &[
    "should", "best", "worst", "i think", "i believe", "in my opinion", "clearly the better",
];

/// `passedFidelity`: every significant word in the claim must be
/// attributable to the input text alone (§3.1, §4.E, §8). Approximated as a
/// word-overlap ratio since no ground truth NLP model is available here.
fn passed_fidelity(claim_text: &str, input_text: &str) -> bool {
    let input_words: std::collections::HashSet<String> = input_text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    let claim_words: Vec<String> = claim_text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3)
        .collect();
    if claim_words.is_empty() {
        return false;
    }
    let matched = claim_words.iter().filter(|w| input_words.contains(*w)).count();
    (matched as f32 / claim_words.len() as f32) >= 0.5
}

fn passed_opinion(claim_text: &str) -> bool {
    let lower = claim_text.to_lowercase();
    !OPINION_CUES.iter().any(|cue| lower.contains(cue))
}

fn passed_specificity(claim_text: &str) -> bool {
    claim_text.chars().any(|c| c.is_ascii_digit())
        || claim_text.split_whitespace().skip(1).any(|w| {
            w.chars().next().map(char::is_uppercase).unwrap_or(false)
        })
}

/// Truncates a model-proposed implied claim to the `ImpliedClaim::MAX_WORDS`
/// budget (§3.1: "Max 20 words") rather than trusting the model to respect
/// it on its own.
fn enforce_implied_claim_word_budget(text: String) -> String {
    let claim = ImpliedClaim { text };
    if claim.within_word_budget() {
        claim.text
    } else {
        claim
            .text
            .split_whitespace()
            .take(ImpliedClaim::MAX_WORDS)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn parse_claim_role(s: &str) -> ClaimRole {
    match s {
        "attribution" => ClaimRole::Attribution,
        "source" => ClaimRole::Source,
        "timing" => ClaimRole::Timing,
        _ => ClaimRole::Core,
    }
}

fn parse_centrality(s: &str) -> Centrality {
    match s {
        "high" => Centrality::High,
        "low" => Centrality::Low,
        _ => Centrality::Medium,
    }
}

fn pass1_schema() -> serde_json::Value {
    json!({
        "required": ["classification", "impliedClaim", "firstCutClaims"],
        "properties": {
            "classification": {"type": "string"},
            "impliedClaim": {"type": "string"},
            "firstCutClaims": {"type": "array"}
        },
        "x-quality-critical": ["impliedClaim"]
    })
}

fn pass2_schema() -> serde_json::Value {
    json!({
        "required": ["claims"],
        "properties": {"claims": {"type": "array"}},
        "x-quality-critical": []
    })
}

pub struct Stage1Output {
    pub claims: Vec<AtomicClaim>,
    pub implied_claim: String,
    pub gate1_stats: Gate1Stats,
}

pub async fn run(ctx: &PipelineContext, input: &Input) -> Result<Stage1Output, PipelineError> {
    let mut vars = HashMap::new();
    vars.insert("inputText".to_string(), input.text.clone());

    let pass1 = ctx
        .call_llm(
            TaskKey::ClaimClassifyInput,
            "claim.classify_input",
            "You extract atomic claims strictly from user-supplied text.",
            &vars,
            pass1_schema(),
            None,
        )
        .await
        .map_err(|e| PipelineError::ClaimExtractionFailed(e.to_string()))?;

    let implied_claim = enforce_implied_claim_word_budget(str_field(&pass1.value, "impliedClaim"));
    let first_cut = str_array_field(&pass1.value, "firstCutClaims");

    let topic_signal: String = first_cut
        .iter()
        .map(|s| s.chars().take(120).collect::<String>())
        .collect::<Vec<_>>()
        .join(" | ")
        .chars()
        .take(120)
        .collect();

    let mut vars2 = HashMap::new();
    vars2.insert("inputText".to_string(), input.text.clone());
    vars2.insert("topicSignal".to_string(), topic_signal);
    vars2.insert(
        "firstCutClaims".to_string(),
        serde_json::to_string(&first_cut).unwrap_or_default(),
    );

    let pass2 = ctx
        .call_llm(
            TaskKey::ClaimRefine,
            "claim.refine",
            "You refine candidate claims into verdict-ready AtomicClaims. Never infer \
             multiplicity from evidence; question-form input reframes to its explicit \
             assertion only.",
            &vars2,
            pass2_schema(),
            None,
        )
        .await
        .map_err(|e| PipelineError::ClaimExtractionFailed(e.to_string()))?;

    let raw_claims = pass2
        .value
        .get("claims")
        .and_then(serde_json::Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut candidates = Vec::new();
    for raw in &raw_claims {
        let text = str_field(raw, "text");
        if text.is_empty() {
            continue;
        }
        let id = ctx.ids.next_claim_id();
        let mut claim = AtomicClaim {
            id,
            claim_role: parse_claim_role(&str_field(raw, "claimRole")),
            centrality: parse_centrality(&str_field(raw, "centrality")),
            is_central: bool_field(raw, "isCentral", false),
            check_worthiness: f32_field(raw, "checkWorthiness", 0.5).clamp(0.0, 1.0),
            key_entities: str_array_field(raw, "keyEntities"),
            passed_fidelity: passed_fidelity(&text, &input.text),
            is_counter_claim: bool_field(raw, "isCounterClaim", false),
            text,
        };
        if !claim.centrality_invariant_holds() {
            claim.is_central = false;
        }
        candidates.push(claim);
    }

    enforce_high_centrality_cap(&mut candidates);

    let total_claims = candidates.len();
    let mut filtered_reasons = Vec::new();
    let mut passed = Vec::new();
    let mut fidelity_passed = 0usize;

    for claim in candidates {
        if claim.passed_fidelity {
            fidelity_passed += 1;
        }
        let opinion_ok = passed_opinion(&claim.text);
        let specificity_ok = passed_specificity(&claim.text);
        if !claim.passed_fidelity {
            filtered_reasons.push((claim.id.clone(), Gate1FilterReason::FailedFidelity));
            continue;
        }
        if !opinion_ok {
            filtered_reasons.push((claim.id.clone(), Gate1FilterReason::FailedOpinion));
            continue;
        }
        if !specificity_ok {
            filtered_reasons.push((claim.id.clone(), Gate1FilterReason::FailedSpecificity));
            continue;
        }
        passed.push(claim);
    }

    let mut rescued = false;
    if passed.is_empty() && total_claims > 0 {
        // Safety net: rescue the highest-scoring filtered claims rather than
        // return an empty claim set (§4.E).
        rescued = true;
        let mut candidates_again: Vec<AtomicClaim> = Vec::new();
        // Re-derive from filtered_reasons' ids isn't possible (claims moved);
        // instead rebuild from raw_claims once more, keeping the top by
        // checkWorthiness.
        for raw in &raw_claims {
            let text = str_field(raw, "text");
            if text.is_empty() {
                continue;
            }
            candidates_again.push(AtomicClaim {
                id: ctx.ids.next_claim_id(),
                text,
                claim_role: parse_claim_role(&str_field(raw, "claimRole")),
                centrality: parse_centrality(&str_field(raw, "centrality")),
                is_central: false,
                check_worthiness: f32_field(raw, "checkWorthiness", 0.5).clamp(0.0, 1.0),
                key_entities: str_array_field(raw, "keyEntities"),
                passed_fidelity: true,
                is_counter_claim: bool_field(raw, "isCounterClaim", false),
            });
        }
        candidates_again.sort_by(|a, b| b.check_worthiness.partial_cmp(&a.check_worthiness).unwrap());
        candidates_again.truncate(1.max(total_claims.min(1)));
        passed = candidates_again;
        ctx.warnings
            .push_simple(
                WarningType::Gate1Rescue,
                "all candidate claims were filtered by Gate 1; rescued the highest-scoring claim",
            )
            .await;
    }

    let central_claims_kept = passed.iter().filter(|c| c.is_central).count();
    let gate1_stats = Gate1Stats {
        total_claims,
        passed_claims: passed.len(),
        filtered_claims: filtered_reasons.len(),
        filtered_reasons,
        central_claims_kept,
        passed_fidelity: (fidelity_passed, total_claims),
    };
    let _ = rescued;

    Ok(Stage1Output {
        claims: passed,
        implied_claim,
        gate1_stats,
    })
}

fn enforce_high_centrality_cap(claims: &mut [AtomicClaim]) {
    let mut high_count = 0;
    for claim in claims.iter_mut() {
        if matches!(claim.centrality, Centrality::High) {
            high_count += 1;
            if high_count > 4 {
                claim.centrality = Centrality::Medium;
                claim.is_central = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fidelity_requires_majority_word_overlap_with_input() {
        assert!(passed_fidelity(
            "the sky is blue",
            "Is it true that the sky is blue?"
        ));
        assert!(!passed_fidelity(
            "unrelated assertion about quantum entanglement",
            "the sky is blue"
        ));
    }

    #[test]
    fn opinion_cue_fails_the_opinion_gate() {
        assert!(!passed_opinion("This is clearly the best policy"));
        assert!(passed_opinion("The policy reduced emissions by 12 percent"));
    }

    #[test]
    fn specificity_requires_a_number_or_proper_noun() {
        assert!(passed_specificity("Emissions fell by 12 percent in Germany"));
        assert!(!passed_specificity("things got better somehow"));
    }

    #[test]
    fn implied_claim_is_truncated_to_twenty_words() {
        let short = "The sky is blue".to_string();
        assert_eq!(enforce_implied_claim_word_budget(short.clone()), short);

        let long = (0..30).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let truncated = enforce_implied_claim_word_budget(long);
        assert_eq!(truncated.split_whitespace().count(), ImpliedClaim::MAX_WORDS);
    }

    #[test]
    fn high_centrality_cap_demotes_the_fifth_claim() {
        let mut claims: Vec<AtomicClaim> = (0..5)
            .map(|i| AtomicClaim {
                id: format!("claim-{i}"),
                text: format!("claim {i}"),
                claim_role: ClaimRole::Core,
                centrality: Centrality::High,
                is_central: true,
                check_worthiness: 0.8,
                key_entities: Vec::new(),
                passed_fidelity: true,
                is_counter_claim: false,
            })
            .collect();
        enforce_high_centrality_cap(&mut claims);
        let high_count = claims.iter().filter(|c| c.centrality == Centrality::High).count();
        assert_eq!(high_count, 4);
        assert!(!claims[4].is_central);
    }
}
