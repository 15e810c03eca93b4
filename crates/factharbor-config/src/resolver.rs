//! Merges the three config layers and exposes typed views (§4.A).

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use crate::defaults::built_in_defaults;
use crate::schema::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config layer: {0}")]
    ParseError(String),
    #[error("debate profile {0:?} is missing role assignments for all 5 roles")]
    IncompleteDebateProfile(DebateProfileName),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub analysis_mode: AnalysisMode,
    pub max_iterations_per_scope: u32,
    pub max_total_iterations: u32,
    pub max_total_tokens: u64,
    pub enforce_budgets: bool,
    pub concurrency_limit: usize,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub query_strategy_mode: QueryStrategyMode,
    pub query_budget_per_claim: u32,
    pub search_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub llm_tiering: bool,
    pub model_understand: String,
    pub model_extract_evidence: String,
    pub model_verdict: String,
    pub global_provider: String,
}

#[derive(Debug, Clone)]
pub struct DebateProfile {
    pub name: DebateProfileName,
    pub roles: DebateProfileRoles,
}

#[derive(Debug, Clone)]
pub struct EvidenceFilterConfig {
    pub min_statement_length: usize,
    pub max_vague_phrase_count: usize,
    pub require_source_excerpt: bool,
    pub min_excerpt_length: usize,
    pub deduplication_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct VerdictBands {
    pub true_min: f32,
    pub mostly_true_min: f32,
    pub leaning_true_min: f32,
    pub mixed_min: f32,
    pub leaning_false_min: f32,
    pub mostly_false_min: f32,
    pub mixed_confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct CalculationConfig {
    pub evidence_filter: EvidenceFilterConfig,
    pub verdict_bands: VerdictBands,
    pub probative_value_weights: HashMap<String, f32>,
    pub source_type_calibration: HashMap<String, f32>,
    pub contestation_weights: HashMap<String, f32>,
}

/// The fully-merged, fully-typed configuration a job is run with.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub pipeline: PipelineConfig,
    pub search: SearchConfig,
    pub prompt: PromptConfig,
    pub calculation: CalculationConfig,
    pub debate_profile: DebateProfile,
    /// Set when a layer failed validation and the resolver fell back to
    /// last-known-good (§4.A). The caller/pipeline emits a `config_fallback`
    /// warning when this is `Some`.
    pub fallback_reason: Option<String>,
}

fn merge_layer(base: RawConfigLayer, override_layer: RawConfigLayer) -> RawConfigLayer {
    RawConfigLayer {
        analysis_mode: override_layer.analysis_mode.or(base.analysis_mode),
        max_iterations_per_scope: override_layer
            .max_iterations_per_scope
            .or(base.max_iterations_per_scope),
        max_total_iterations: override_layer
            .max_total_iterations
            .or(base.max_total_iterations),
        max_total_tokens: override_layer.max_total_tokens.or(base.max_total_tokens),
        enforce_budgets: override_layer.enforce_budgets.or(base.enforce_budgets),
        query_strategy_mode: override_layer
            .query_strategy_mode
            .or(base.query_strategy_mode),
        query_budget_per_claim: override_layer
            .query_budget_per_claim
            .or(base.query_budget_per_claim),
        debate_profile: override_layer.debate_profile.or(base.debate_profile),
        debate_profiles: override_layer.debate_profiles.or(base.debate_profiles),
        llm_tiering: override_layer.llm_tiering.or(base.llm_tiering),
        model_understand: override_layer.model_understand.or(base.model_understand),
        model_extract_evidence: override_layer
            .model_extract_evidence
            .or(base.model_extract_evidence),
        model_verdict: override_layer.model_verdict.or(base.model_verdict),
        global_provider: override_layer.global_provider.or(base.global_provider),
        evidence_filter: override_layer.evidence_filter.or(base.evidence_filter),
        verdict_bands: override_layer.verdict_bands.or(base.verdict_bands),
        probative_value_weights: override_layer
            .probative_value_weights
            .or(base.probative_value_weights),
        source_type_calibration: override_layer
            .source_type_calibration
            .or(base.source_type_calibration),
        contestation_weights: override_layer
            .contestation_weights
            .or(base.contestation_weights),
        concurrency_limit: override_layer.concurrency_limit.or(base.concurrency_limit),
        search_timeout_ms: override_layer.search_timeout_ms.or(base.search_timeout_ms),
    }
}

/// Resolve the three config layers, left wins (§4.A): `active_profile` beats
/// `profile_defaults` beats the built-in defaults.
pub fn resolve(
    active_profile: Option<RawConfigLayer>,
    profile_defaults: Option<RawConfigLayer>,
    last_known_good: Option<&ResolvedConfig>,
) -> Result<ResolvedConfig, ConfigError> {
    let merged = built_in_defaults();
    let merged = match profile_defaults {
        Some(layer) => merge_layer(merged, layer),
        None => merged,
    };
    let merged = match active_profile {
        Some(layer) => merge_layer(merged, layer),
        None => merged,
    };

    match typecheck(merged) {
        Ok(resolved) => Ok(resolved),
        Err(e) => {
            warn!(error = %e, "config layer invalid, falling back to last-known-good");
            match last_known_good {
                Some(good) => {
                    let mut fallback = good.clone();
                    fallback.fallback_reason = Some(e.to_string());
                    Ok(fallback)
                }
                None => {
                    // No prior good config: fall back to pure built-in defaults.
                    let mut resolved = typecheck(built_in_defaults())?;
                    resolved.fallback_reason = Some(e.to_string());
                    Ok(resolved)
                }
            }
        }
    }
}

fn typecheck(layer: RawConfigLayer) -> Result<ResolvedConfig, ConfigError> {
    let evidence_filter_raw = layer.evidence_filter.unwrap_or_default();
    let verdict_bands_raw = layer.verdict_bands.unwrap_or_default();
    let pv_raw = layer.probative_value_weights.unwrap_or_default();
    let cw_raw = layer.contestation_weights.unwrap_or_default();

    let mut probative_value_weights = HashMap::new();
    probative_value_weights.insert("high".to_string(), pv_raw.high.unwrap_or(1.0));
    probative_value_weights.insert("medium".to_string(), pv_raw.medium.unwrap_or(0.8));
    probative_value_weights.insert("low".to_string(), pv_raw.low.unwrap_or(0.5));

    let mut contestation_weights = HashMap::new();
    contestation_weights.insert("established".to_string(), cw_raw.established.unwrap_or(0.3));
    contestation_weights.insert("disputed".to_string(), cw_raw.disputed.unwrap_or(0.5));
    contestation_weights.insert("opinion".to_string(), cw_raw.opinion.unwrap_or(1.0));
    contestation_weights.insert("alleged".to_string(), cw_raw.alleged.unwrap_or(1.0));
    contestation_weights.insert("unknown".to_string(), cw_raw.unknown.unwrap_or(1.0));

    let debate_profile_name = layer.debate_profile.unwrap_or(DebateProfileName::Baseline);
    let debate_profiles = layer.debate_profiles.unwrap_or_default();
    let roles = debate_profiles
        .get(&debate_profile_name)
        .cloned()
        .ok_or(ConfigError::IncompleteDebateProfile(debate_profile_name))?;

    Ok(ResolvedConfig {
        pipeline: PipelineConfig {
            analysis_mode: layer.analysis_mode.unwrap_or(AnalysisMode::Standard),
            max_iterations_per_scope: layer.max_iterations_per_scope.unwrap_or(4),
            max_total_iterations: layer.max_total_iterations.unwrap_or(24),
            max_total_tokens: layer.max_total_tokens.unwrap_or(400_000),
            enforce_budgets: layer.enforce_budgets.unwrap_or(true),
            concurrency_limit: layer.concurrency_limit.unwrap_or(4),
        },
        search: SearchConfig {
            query_strategy_mode: layer.query_strategy_mode.unwrap_or(QueryStrategyMode::ProCon),
            query_budget_per_claim: layer.query_budget_per_claim.unwrap_or(6),
            search_timeout_ms: layer.search_timeout_ms.unwrap_or(12_000),
        },
        prompt: PromptConfig {
            llm_tiering: layer.llm_tiering.unwrap_or(true),
            model_understand: layer
                .model_understand
                .unwrap_or_else(|| "understand-tier-default".into()),
            model_extract_evidence: layer
                .model_extract_evidence
                .unwrap_or_else(|| "extract-tier-default".into()),
            model_verdict: layer
                .model_verdict
                .unwrap_or_else(|| "verdict-tier-default".into()),
            global_provider: layer.global_provider.unwrap_or_else(|| "default".into()),
        },
        calculation: CalculationConfig {
            evidence_filter: EvidenceFilterConfig {
                min_statement_length: evidence_filter_raw.min_statement_length.unwrap_or(20),
                max_vague_phrase_count: evidence_filter_raw.max_vague_phrase_count.unwrap_or(2),
                require_source_excerpt: evidence_filter_raw
                    .require_source_excerpt
                    .unwrap_or(true),
                min_excerpt_length: evidence_filter_raw.min_excerpt_length.unwrap_or(30),
                deduplication_threshold: evidence_filter_raw
                    .deduplication_threshold
                    .unwrap_or(0.85),
            },
            verdict_bands: VerdictBands {
                true_min: verdict_bands_raw.true_min.unwrap_or(86.0),
                mostly_true_min: verdict_bands_raw.mostly_true_min.unwrap_or(70.0),
                leaning_true_min: verdict_bands_raw.leaning_true_min.unwrap_or(55.0),
                mixed_min: verdict_bands_raw.mixed_min.unwrap_or(45.0),
                leaning_false_min: verdict_bands_raw.leaning_false_min.unwrap_or(30.0),
                mostly_false_min: verdict_bands_raw.mostly_false_min.unwrap_or(14.0),
                mixed_confidence_threshold: verdict_bands_raw
                    .mixed_confidence_threshold
                    .unwrap_or(40.0),
            },
            probative_value_weights,
            source_type_calibration: layer.source_type_calibration.unwrap_or_default(),
            contestation_weights,
        },
        debate_profile: DebateProfile {
            name: debate_profile_name,
            roles,
        },
        fallback_reason: None,
    })
}
