//! Raw, partially-specified configuration layer (§4.A). Every field is
//! `Option` so three layers (`active UCM profile`, `profile defaults`,
//! `built-in defaults`) can be parsed independently and merged left-wins,
//! the way `config::loader::ConfigLoader` merges file/env/default layers in
//! the teacher but specialized to FactHarbor's fixed three-layer model
//! instead of an open set of generic sources.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Quick,
    Standard,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategyMode {
    Legacy,
    ProCon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebateProfileName {
    Baseline,
    TierSplit,
    CrossProvider,
    MaxDiversity,
}

/// A closed, enumerated debate-role → provider map. All five roles must be
/// present for a profile to be valid (§4.A: "Profiles define ALL 5 roles
/// explicitly; global provider is never silently inherited for profile
/// semantics").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateProfileRoles {
    pub advocate: String,
    pub self_consistency: String,
    pub challenger: String,
    pub reconciler: String,
    pub validation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceFilterRaw {
    pub min_statement_length: Option<usize>,
    pub max_vague_phrase_count: Option<usize>,
    pub require_source_excerpt: Option<bool>,
    pub min_excerpt_length: Option<usize>,
    pub deduplication_threshold: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictBandsRaw {
    pub true_min: Option<f32>,
    pub mostly_true_min: Option<f32>,
    pub leaning_true_min: Option<f32>,
    pub mixed_min: Option<f32>,
    pub leaning_false_min: Option<f32>,
    pub mostly_false_min: Option<f32>,
    pub mixed_confidence_threshold: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbativeValueWeightsRaw {
    pub high: Option<f32>,
    pub medium: Option<f32>,
    pub low: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContestationWeightsRaw {
    pub established: Option<f32>,
    pub disputed: Option<f32>,
    pub opinion: Option<f32>,
    pub alleged: Option<f32>,
    pub unknown: Option<f32>,
}

/// One configuration layer, fully optional. The three layers described in
/// §4.A are each an instance of this struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfigLayer {
    pub analysis_mode: Option<AnalysisMode>,
    pub max_iterations_per_scope: Option<u32>,
    pub max_total_iterations: Option<u32>,
    pub max_total_tokens: Option<u64>,
    pub enforce_budgets: Option<bool>,
    pub query_strategy_mode: Option<QueryStrategyMode>,
    pub query_budget_per_claim: Option<u32>,
    pub debate_profile: Option<DebateProfileName>,
    pub debate_profiles: Option<HashMap<DebateProfileName, DebateProfileRoles>>,
    pub llm_tiering: Option<bool>,
    pub model_understand: Option<String>,
    pub model_extract_evidence: Option<String>,
    pub model_verdict: Option<String>,
    pub global_provider: Option<String>,
    pub evidence_filter: Option<EvidenceFilterRaw>,
    pub verdict_bands: Option<VerdictBandsRaw>,
    pub probative_value_weights: Option<ProbativeValueWeightsRaw>,
    pub source_type_calibration: Option<HashMap<String, f32>>,
    pub contestation_weights: Option<ContestationWeightsRaw>,
    pub concurrency_limit: Option<usize>,
    pub search_timeout_ms: Option<u64>,
}
