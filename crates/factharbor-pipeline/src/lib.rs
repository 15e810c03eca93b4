//! The ClaimAssessmentBoundary pipeline: `analyze()` runs the five stages
//! over one input and returns the `OverallAssessment` every job produces,
//! success or failure (§6, §7).

pub mod context;
pub mod error;
pub mod ids;
pub mod jsonutil;
pub mod metrics;
pub mod prompts;
pub mod stage1;
pub mod stage2;
pub mod stage3;
pub mod stage4;
pub mod stage5;
pub mod text;
pub mod workflow;

use std::time::Instant;

use factharbor_config::ResolvedConfig;
use factharbor_types::{
    AnalysisWarning, CancellationToken, Input, JobStatus, OverallAssessment, QualityGates,
    WarningType,
};

pub use context::{PipelineContext, PipelineDeps, PipelineState};
pub use error::PipelineError;
pub use metrics::AnalysisMetrics;

/// `analyze()`'s return value: the job's `OverallAssessment` plus the
/// metrics snapshot accumulated alongside it (§4.J). `OverallAssessment`
/// alone is what a caller persists to durable storage; `AnalysisMetrics` is
/// what an operator dashboards.
pub struct AnalysisRun {
    pub assessment: OverallAssessment,
    pub metrics: AnalysisMetrics,
}

fn failed_run(reason: impl Into<String>, warnings: Vec<AnalysisWarning>) -> OverallAssessment {
    OverallAssessment {
        status: JobStatus::Failed,
        fatal_reason: Some(reason.into()),
        verdict_narrative: String::new(),
        claim_boundaries: Vec::new(),
        claim_verdicts: Vec::new(),
        coverage_matrix: Default::default(),
        quality_gates: QualityGates {
            overall: factharbor_types::QualityGate::Insufficient,
            per_claim: Default::default(),
        },
        analysis_warnings: warnings,
    }
}

/// Runs the full pipeline end to end (§6): Stage 1 claim extraction, Stage 2
/// research, Stage 3 boundary clustering, Stage 4 verdict debate, Stage 5
/// aggregation. Any job-fatal error (§7) short-circuits into a `Failed`
/// assessment carrying every warning accumulated up to that point; stage-
/// and local-recoverable failures are absorbed inside the stages themselves
/// and surface only as warnings.
pub async fn analyze(
    input: Input,
    config: ResolvedConfig,
    deps: PipelineDeps,
    cancel: CancellationToken,
) -> AnalysisRun {
    let ctx = PipelineContext::new(deps, config, cancel);
    let mut state = context::PipelineState::default();

    if let Some(reason) = ctx.config.fallback_reason.clone() {
        ctx.warnings
            .push_simple(WarningType::ConfigFallback, format!("config fallback: {reason}"))
            .await;
    }

    macro_rules! checkpoint {
        ($cancelled_at:expr) => {
            if ctx.cancel.is_cancelled() {
                ctx.warnings
                    .push_simple(WarningType::JobCancelled, format!("job cancelled during {}", $cancelled_at))
                    .await;
                let warnings = ctx.warnings.snapshot().await;
                return AnalysisRun {
                    assessment: failed_run("job_cancelled", warnings),
                    metrics: build_metrics(&ctx, Default::default()),
                };
            }
        };
    }

    checkpoint!("stage1");

    let stage1_started = Instant::now();
    let stage1 = match stage1::run(&ctx, &input).await {
        Ok(out) => out,
        Err(e) => {
            let warnings = ctx.warnings.snapshot().await;
            return AnalysisRun {
                assessment: failed_run(e.to_string(), warnings),
                metrics: build_metrics(&ctx, Default::default()),
            };
        }
    };
    ctx.phases.record("stage1", stage1_started.elapsed().as_millis() as u64);
    let gate1_stats = stage1.gate1_stats.clone();
    state.claims = stage1.claims;
    state.implied_claim = Some(stage1.implied_claim);

    checkpoint!("stage2");

    let stage2_started = Instant::now();
    state.evidence = match stage2::run(&ctx, &state.claims).await {
        Ok(out) => out,
        Err(e) => {
            let warnings = ctx.warnings.snapshot().await;
            return AnalysisRun {
                assessment: failed_run(e.to_string(), warnings),
                metrics: build_metrics(&ctx, gate1_stats),
            };
        }
    };
    ctx.phases.record("stage2", stage2_started.elapsed().as_millis() as u64);

    checkpoint!("stage3");

    let stage3_started = Instant::now();
    if let Err(e) = stage3::run(&ctx, &mut state).await {
        let warnings = ctx.warnings.snapshot().await;
        return AnalysisRun {
            assessment: failed_run(e.to_string(), warnings),
            metrics: build_metrics(&ctx, gate1_stats),
        };
    }
    ctx.phases.record("stage3", stage3_started.elapsed().as_millis() as u64);

    checkpoint!("stage4");

    let stage4_started = Instant::now();
    state.verdicts = stage4::run(&ctx, &state.claims, &state.evidence).await;
    ctx.phases.record("stage4", stage4_started.elapsed().as_millis() as u64);

    checkpoint!("stage5");

    let stage5_started = Instant::now();
    let taken_verdicts = std::mem::take(&mut state.verdicts);
    let assessment = stage5::run(&ctx, &input, &state, taken_verdicts).await;
    ctx.phases.record("stage5", stage5_started.elapsed().as_millis() as u64);

    let metrics = build_metrics(&ctx, gate1_stats);
    AnalysisRun { assessment, metrics }
}

fn build_metrics(ctx: &PipelineContext, gate1_stats: factharbor_types::Gate1Stats) -> AnalysisMetrics {
    AnalysisMetrics {
        phase_timings: ctx.phases.snapshot(),
        llm_calls: ctx.metrics.llm_calls.load(std::sync::atomic::Ordering::Relaxed),
        search_queries: ctx.query_budget.usage_snapshot().values().sum(),
        gate1_stats,
        total_tokens: ctx.metrics.total_tokens.load(std::sync::atomic::Ordering::Relaxed),
        baseless_adjustment_rate: ctx.metrics.baseless_adjustment_rate(),
        query_budget_usage: ctx.query_budget.usage_snapshot(),
    }
}
