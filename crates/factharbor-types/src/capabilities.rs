//! The three external capability contracts the pipeline core consumes
//! (§6): `LlmCall`, `Search`, `Reliability`, plus `Clock` for deterministic
//! timestamps in tests. Everything else in the repository (HTTP surface,
//! job queue, persistence, the reliability-scoring service itself, concrete
//! provider adapters) is an external collaborator and out of scope
//! (spec.md §1) — only these contracts are.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;

use crate::WarningsCollector;

/// Model routing tier (§4.A `llmTiering`, §4.C "tier routing").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Understand,
    Extract,
    Verdict,
}

/// Debate role a verdict-tier call is being made on behalf of (§4.A
/// `debateProfile`, §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateRole {
    Advocate,
    SelfConsistency,
    Challenger,
    Reconciler,
    Validation,
}

/// Every distinct kind of LLM call the pipeline issues. Each has a fixed
/// tier (§4.C.1) so the gateway can resolve `(task, tier, provider)` without
/// the caller re-stating it on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKey {
    ClaimClassifyInput,
    ClaimRefine,
    QueryGenerate,
    RelevanceClassify,
    EvidenceExtract,
    BoundaryCluster,
    ContextAssign,
    DebateAdvocate,
    DebateSelfConsistency,
    DebateChallenge,
    DebateReconcile,
    DebateValidate,
    VerdictNarrative,
}

impl TaskKey {
    pub fn tier(self) -> ModelTier {
        match self {
            TaskKey::ClaimClassifyInput
            | TaskKey::QueryGenerate
            | TaskKey::RelevanceClassify
            | TaskKey::BoundaryCluster
            | TaskKey::ContextAssign => ModelTier::Understand,
            TaskKey::EvidenceExtract => ModelTier::Extract,
            TaskKey::ClaimRefine
            | TaskKey::DebateAdvocate
            | TaskKey::DebateSelfConsistency
            | TaskKey::DebateChallenge
            | TaskKey::DebateReconcile
            | TaskKey::DebateValidate
            | TaskKey::VerdictNarrative => ModelTier::Verdict,
        }
    }

    pub fn debate_role(self) -> Option<DebateRole> {
        match self {
            TaskKey::DebateAdvocate => Some(DebateRole::Advocate),
            TaskKey::DebateSelfConsistency => Some(DebateRole::SelfConsistency),
            TaskKey::DebateChallenge => Some(DebateRole::Challenger),
            TaskKey::DebateReconcile => Some(DebateRole::Reconciler),
            TaskKey::DebateValidate => Some(DebateRole::Validation),
            _ => None,
        }
    }
}

/// One structured LLM call request (§4.C).
#[derive(Debug, Clone)]
pub struct LlmCallRequest {
    pub task_key: TaskKey,
    pub prompt_hash: String,
    pub system: String,
    pub user: String,
    /// JSON schema the response must validate against.
    pub schema: Value,
    /// Explicit provider for this call (e.g. a debate role's configured
    /// provider); `None` means "use the gateway's global default".
    pub provider_override: Option<String>,
}

/// The envelope carried alongside every structured result (§4.C, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCallEnvelope {
    pub prompt_hash: String,
    pub configured_provider: String,
    pub provider: String,
    pub model: String,
    pub tokens: u32,
    pub was_total_refusal: bool,
}

#[derive(Debug, Clone)]
pub struct StructuredResult {
    pub value: Value,
    pub envelope: LlmCallEnvelope,
}

#[derive(Debug, Error)]
pub enum LlmCallError {
    #[error("call cancelled")]
    Cancelled,
    #[error("schema unrecoverable after retries: {0}")]
    SchemaUnrecoverable(String),
    #[error("credentials missing for provider {0}")]
    CredentialsMissing(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait LlmCall: Send + Sync {
    async fn call(
        &self,
        request: LlmCallRequest,
        warnings: &WarningsCollector,
        cancel: &CancellationToken,
    ) -> Result<StructuredResult, LlmCallError>;
}

/// A single search hit (§4.D, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryLabel {
    Supporting,
    Refuting,
    Unlabeled,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub domain_whitelist: Option<Vec<String>>,
    pub domain_blacklist: Option<Vec<String>>,
    pub date_restrict: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum SearchCallError {
    #[error("search timed out")]
    Timeout,
    #[error("search transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Search: Send + Sync {
    async fn query(
        &self,
        query: &str,
        claim_id: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchCallError>;
}

/// Reliability evaluation result (§6) — a pure calibration input, never a
/// gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityResult {
    pub score: Option<f32>,
    pub source_type: Option<String>,
    pub factual_rating: Option<String>,
}

#[async_trait]
pub trait Reliability: Send + Sync {
    async fn evaluate(&self, domain: &str) -> anyhow::Result<ReliabilityResult>;
}

/// Wall-clock abstraction so stages can be driven with a frozen clock in
/// tests (§8 idempotence property).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Job-level cancellation token (§5 "every LLM and search call is a
/// suspension point"). Cloning shares the same underlying flag; cancelling
/// any clone cancels all of them.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
