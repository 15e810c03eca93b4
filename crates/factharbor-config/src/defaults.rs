//! Built-in defaults (§4.A: "every option has a schema and a default").

use std::collections::HashMap;

use crate::schema::*;

pub fn built_in_defaults() -> RawConfigLayer {
    let mut debate_profiles = HashMap::new();
    debate_profiles.insert(
        DebateProfileName::Baseline,
        DebateProfileRoles {
            advocate: "default".into(),
            self_consistency: "default".into(),
            challenger: "default".into(),
            reconciler: "default".into(),
            validation: "default".into(),
        },
    );
    debate_profiles.insert(
        DebateProfileName::TierSplit,
        DebateProfileRoles {
            advocate: "anthropic".into(),
            self_consistency: "anthropic".into(),
            challenger: "openai".into(),
            reconciler: "anthropic".into(),
            validation: "anthropic".into(),
        },
    );
    debate_profiles.insert(
        DebateProfileName::CrossProvider,
        DebateProfileRoles {
            advocate: "anthropic".into(),
            self_consistency: "anthropic".into(),
            challenger: "openai".into(),
            reconciler: "google".into(),
            validation: "anthropic".into(),
        },
    );
    debate_profiles.insert(
        DebateProfileName::MaxDiversity,
        DebateProfileRoles {
            advocate: "anthropic".into(),
            self_consistency: "google".into(),
            challenger: "openai".into(),
            reconciler: "mistral".into(),
            validation: "anthropic".into(),
        },
    );

    let mut source_type_calibration = HashMap::new();
    for (k, v) in [
        ("peer_reviewed_study", 1.0),
        ("fact_check_report", 0.95),
        ("government_report", 0.9),
        ("legal_document", 0.9),
        ("news_primary", 0.8),
        ("news_secondary", 0.65),
        ("expert_statement", 0.75),
        ("organization_report", 0.7),
        ("other", 0.4),
    ] {
        source_type_calibration.insert(k.to_string(), v);
    }

    RawConfigLayer {
        analysis_mode: Some(AnalysisMode::Standard),
        max_iterations_per_scope: Some(4),
        max_total_iterations: Some(24),
        max_total_tokens: Some(400_000),
        enforce_budgets: Some(true),
        query_strategy_mode: Some(QueryStrategyMode::ProCon),
        query_budget_per_claim: Some(6),
        debate_profile: Some(DebateProfileName::Baseline),
        debate_profiles: Some(debate_profiles),
        llm_tiering: Some(true),
        model_understand: Some("understand-tier-default".into()),
        model_extract_evidence: Some("extract-tier-default".into()),
        model_verdict: Some("verdict-tier-default".into()),
        global_provider: Some("default".into()),
        evidence_filter: Some(EvidenceFilterRaw {
            min_statement_length: Some(20),
            max_vague_phrase_count: Some(2),
            require_source_excerpt: Some(true),
            min_excerpt_length: Some(30),
            deduplication_threshold: Some(0.85),
        }),
        verdict_bands: Some(VerdictBandsRaw {
            true_min: Some(86.0),
            mostly_true_min: Some(70.0),
            leaning_true_min: Some(55.0),
            mixed_min: Some(45.0),
            leaning_false_min: Some(30.0),
            mostly_false_min: Some(14.0),
            mixed_confidence_threshold: Some(40.0),
        }),
        probative_value_weights: Some(ProbativeValueWeightsRaw {
            high: Some(1.0),
            medium: Some(0.8),
            low: Some(0.5),
        }),
        source_type_calibration: Some(source_type_calibration),
        contestation_weights: Some(ContestationWeightsRaw {
            established: Some(0.3),
            disputed: Some(0.5),
            opinion: Some(1.0),
            alleged: Some(1.0),
            unknown: Some(1.0),
        }),
        concurrency_limit: Some(4),
        search_timeout_ms: Some(12_000),
    }
}
