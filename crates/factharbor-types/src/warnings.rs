//! The closed `AnalysisWarning` vocabulary (§3.1, §6) and a thread-safe,
//! append-only collector for it. Modeled after `council`'s append-only
//! warnings/metrics handling, but implemented with a plain `Mutex<Vec<_>>`
//! rather than a broadcast channel since a single job never shares its
//! collector across jobs (§5 "no cross-job sharing").

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningType {
    QueryBudgetExhausted,
    DebateProviderFallback,
    BaselessAdversarialChallenge,
    SchemaRepairApplied,
    LowConsistency,
    Gate1Rescue,
    ContextRemap,
    SearchTimeout,
    JobCancelled,
    ConfigFallback,
    PromptRenderError,
    AnalysisGenerationFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisWarning {
    #[serde(rename = "type")]
    pub warning_type: WarningType,
    pub message: String,
    pub details: Option<Value>,
}

impl AnalysisWarning {
    pub fn new(warning_type: WarningType, message: impl Into<String>) -> Self {
        Self {
            warning_type,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Append-only warnings sink shared (by reference) across every stage and
/// every parallel call within a stage (§5: "Warnings collector is
/// append-only and safe to share across parallel calls").
#[derive(Debug, Clone, Default)]
pub struct WarningsCollector {
    inner: Arc<Mutex<Vec<AnalysisWarning>>>,
}

impl WarningsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, warning: AnalysisWarning) {
        tracing::warn!(warning_type = ?warning.warning_type, message = %warning.message, "analysis warning emitted");
        self.inner.lock().await.push(warning);
    }

    pub async fn push_simple(&self, warning_type: WarningType, message: impl Into<String>) {
        self.push(AnalysisWarning::new(warning_type, message)).await;
    }

    pub async fn snapshot(&self) -> Vec<AnalysisWarning> {
        self.inner.lock().await.clone()
    }

    pub async fn drain(&self) -> Vec<AnalysisWarning> {
        std::mem::take(&mut *self.inner.lock().await)
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
