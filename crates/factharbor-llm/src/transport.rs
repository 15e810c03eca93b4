//! The raw provider-adapter boundary. Concrete LLM providers (Anthropic,
//! OpenAI, Google, Mistral, ...) are external collaborators out of scope
//! here (spec.md §1); `ProviderTransport` is the seam the gateway sits on
//! top of, analogous to `council::contracts`'s model-call trait.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct RawCompletion {
    pub value: Value,
    pub tokens: u32,
}

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("provider credentials missing")]
    CredentialsMissing,
    #[error("provider request timed out")]
    Timeout,
    #[error("provider transport error: {0}")]
    Other(String),
}

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn complete(
        &self,
        provider: &str,
        model: &str,
        system: &str,
        user: &str,
        schema: &Value,
    ) -> Result<RawCompletion, TransportError>;
}

/// Checked before a call is dispatched so a missing-credentials provider
/// override never reaches the transport at all (§4.C.6).
pub trait CredentialStore: Send + Sync {
    fn has_credentials(&self, provider: &str) -> bool;
}

/// All providers considered configured; convenient for tests and for
/// deployments that manage credentials entirely outside the process.
pub struct AlwaysCredentialed;

impl CredentialStore for AlwaysCredentialed {
    fn has_credentials(&self, _provider: &str) -> bool {
        true
    }
}
