//! Job-fatal error taxonomy (§7: "Job-fatal: cannot load config, cannot run
//! Pass 2 even with fallback tier, cancellation propagated, catastrophic
//! prompt-registry failure"). Local-recoverable and stage-recoverable
//! failures never reach this type — they're absorbed as warnings inside the
//! gateways and stages.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PipelineError {
    #[error("claim_extraction_failed: {0}")]
    ClaimExtractionFailed(String),
    #[error("job_cancelled")]
    Cancelled,
    #[error("analysis_generation_failed: {0}")]
    AnalysisGenerationFailed(String),
}
