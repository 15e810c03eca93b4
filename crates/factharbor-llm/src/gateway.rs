//! Tiered LLM gateway (§4.C): the only concrete `LlmCall` implementation.
//! Sits between the pipeline core and a `ProviderTransport`, handling tier
//! routing, schema-aware retry, total-refusal fallback, provider fallback,
//! and cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use factharbor_types::{
    AnalysisWarning, CancellationToken, LlmCall, LlmCallEnvelope, LlmCallError, LlmCallRequest,
    ModelTier, StructuredResult, WarningType, WarningsCollector,
};

use crate::circuit::{BreakerPool, CircuitError};
use crate::schema::{is_total_refusal, validate_and_fill};
use crate::transport::{CredentialStore, ProviderTransport, TransportError};

const MAX_SCHEMA_RETRIES: u32 = 2;

fn tier_rank(tier: ModelTier) -> u8 {
    match tier {
        ModelTier::Extract => 0,
        ModelTier::Understand => 1,
        ModelTier::Verdict => 2,
    }
}

fn tier_from_rank(rank: u8) -> ModelTier {
    match rank {
        0 => ModelTier::Extract,
        1 => ModelTier::Understand,
        _ => ModelTier::Verdict,
    }
}

/// Static routing table: tier -> model name, global default provider, and
/// the breaker pool shared across every call.
pub struct GatewayConfig {
    pub tier_models: HashMap<ModelTier, String>,
    pub global_provider: String,
}

pub struct LlmGateway {
    config: GatewayConfig,
    transport: Arc<dyn ProviderTransport>,
    credentials: Arc<dyn CredentialStore>,
    breakers: BreakerPool,
}

impl LlmGateway {
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn ProviderTransport>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            transport,
            credentials,
            breakers: BreakerPool::new(),
        }
    }

    fn resolve_provider(
        &self,
        request: &LlmCallRequest,
        warnings_fallback: &mut Option<AnalysisWarning>,
    ) -> (String, String) {
        let configured = request
            .provider_override
            .clone()
            .unwrap_or_else(|| self.config.global_provider.clone());

        if self.credentials.has_credentials(&configured) {
            return (configured.clone(), configured);
        }

        *warnings_fallback = Some(
            AnalysisWarning::new(
                WarningType::DebateProviderFallback,
                format!(
                    "provider `{configured}` has no configured credentials; falling back to `{}`",
                    self.config.global_provider
                ),
            )
            .with_details(serde_json::json!({
                "configuredProvider": configured,
                "actualProvider": self.config.global_provider,
                "taskKey": format!("{:?}", request.task_key),
            })),
        );
        (configured, self.config.global_provider.clone())
    }

    fn model_for(&self, tier: ModelTier) -> String {
        self.config
            .tier_models
            .get(&tier)
            .cloned()
            .unwrap_or_else(|| format!("{:?}", tier).to_lowercase())
    }

    async fn invoke(
        &self,
        provider: &str,
        model: &str,
        system: &str,
        user: &str,
        schema: &serde_json::Value,
    ) -> Result<crate::transport::RawCompletion, TransportError> {
        let breaker = self.breakers.get(&format!("{provider}:{model}")).await;
        match breaker
            .execute(|| self.transport.complete(provider, model, system, user, schema))
            .await
        {
            Ok(completion) => Ok(completion),
            Err(CircuitError::Open) => Err(TransportError::Other("circuit open".to_string())),
            Err(CircuitError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl LlmCall for LlmGateway {
    async fn call(
        &self,
        request: LlmCallRequest,
        warnings: &WarningsCollector,
        cancel: &CancellationToken,
    ) -> Result<StructuredResult, LlmCallError> {
        if cancel.is_cancelled() {
            return Err(LlmCallError::Cancelled);
        }

        let mut provider_fallback_warning = None;
        let (configured_provider, provider) =
            self.resolve_provider(&request, &mut provider_fallback_warning);
        if let Some(w) = provider_fallback_warning {
            warnings.push(w).await;
        }

        let tier = request.task_key.tier();
        let mut rank = tier_rank(tier);
        let mut model = self.model_for(tier_from_rank(rank));
        let mut user_message = request.user.clone();
        let mut fell_back_for_refusal = false;

        for attempt in 0..=MAX_SCHEMA_RETRIES {
            if cancel.is_cancelled() {
                return Err(LlmCallError::Cancelled);
            }

            let completion = self
                .invoke(&provider, &model, &request.system, &user_message, &request.schema)
                .await;

            let completion = match completion {
                Ok(c) => c,
                Err(TransportError::CredentialsMissing) => {
                    return Err(LlmCallError::CredentialsMissing(provider));
                }
                Err(e) => {
                    if attempt >= MAX_SCHEMA_RETRIES {
                        return Err(LlmCallError::Transport(e.to_string()));
                    }
                    warn!(attempt, error = %e, "llm transport call failed, retrying");
                    continue;
                }
            };

            let mut value = completion.value;
            let outcome = validate_and_fill(&request.schema, &mut value);
            let total_refusal = is_total_refusal(&request.schema, &value);

            if total_refusal && !fell_back_for_refusal {
                fell_back_for_refusal = true;
                rank = rank.saturating_sub(1);
                model = self.model_for(tier_from_rank(rank));
                user_message = format!(
                    "{}\n\nThis requires a concrete fact-checking judgment; do not leave the \
                     assessment fields blank.",
                    request.user
                );
                warnings
                    .push_simple(
                        WarningType::DebateProviderFallback,
                        format!(
                            "task {:?} returned a total refusal; retrying on smaller tier {:?}",
                            request.task_key,
                            tier_from_rank(rank)
                        ),
                    )
                    .await;
                continue;
            }

            if !outcome.is_valid() {
                if attempt >= MAX_SCHEMA_RETRIES {
                    return Err(LlmCallError::SchemaUnrecoverable(outcome.describe()));
                }
                if !outcome.missing.is_empty() {
                    warnings
                        .push_simple(
                            WarningType::SchemaRepairApplied,
                            format!(
                                "task {:?} attempt {attempt}: filled missing fields [{}]",
                                request.task_key,
                                outcome.missing.join(", ")
                            ),
                        )
                        .await;
                }
                user_message = format!(
                    "{}\n\nYour previous response was invalid: {}. Return a complete object.",
                    request.user,
                    outcome.describe()
                );
                continue;
            }

            if attempt > 0 {
                info!(attempt, task = ?request.task_key, "llm call recovered after retry");
            }

            return Ok(StructuredResult {
                value,
                envelope: LlmCallEnvelope {
                    prompt_hash: request.prompt_hash,
                    configured_provider,
                    provider,
                    model,
                    tokens: completion.tokens,
                    was_total_refusal: total_refusal && fell_back_for_refusal,
                },
            });
        }

        Err(LlmCallError::SchemaUnrecoverable(
            "exhausted retries without a valid response".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use factharbor_types::{LlmCallRequest, TaskKey};

    use crate::transport::{AlwaysCredentialed, RawCompletion};

    struct ScriptedTransport {
        responses: Vec<serde_json::Value>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ProviderTransport for ScriptedTransport {
        async fn complete(
            &self,
            _provider: &str,
            _model: &str,
            _system: &str,
            _user: &str,
            _schema: &serde_json::Value,
        ) -> Result<RawCompletion, TransportError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let value = self.responses.get(i).cloned().unwrap_or_else(|| self.responses.last().unwrap().clone());
            Ok(RawCompletion { value, tokens: 10 })
        }
    }

    fn gateway_with(transport: ScriptedTransport) -> LlmGateway {
        let mut tier_models = HashMap::new();
        tier_models.insert(ModelTier::Verdict, "big-model".to_string());
        tier_models.insert(ModelTier::Understand, "mid-model".to_string());
        tier_models.insert(ModelTier::Extract, "small-model".to_string());
        LlmGateway::new(
            GatewayConfig { tier_models, global_provider: "anthropic".to_string() },
            Arc::new(transport),
            Arc::new(AlwaysCredentialed),
        )
    }

    fn request(schema: serde_json::Value, provider_override: Option<&str>) -> LlmCallRequest {
        LlmCallRequest {
            task_key: TaskKey::DebateAdvocate,
            prompt_hash: "hash".to_string(),
            system: "sys".to_string(),
            user: "user".to_string(),
            schema,
            provider_override: provider_override.map(|s| s.to_string()),
        }
    }

    // Total-refusal fallback, schema repair, and provider-override fallback
    // are covered in depth by `factharbor_llm::lib`'s own gateway tests;
    // this module only adds the cancellation path that's specific to this
    // transport mock.
    #[tokio::test]
    async fn cancelled_token_short_circuits_before_any_call() {
        let gateway = gateway_with(ScriptedTransport { responses: vec![], calls: AtomicU32::new(0) });
        let warnings = WarningsCollector::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = gateway
            .call(request(serde_json::json!({"required": []}), None), &warnings, &cancel)
            .await;
        assert!(matches!(result, Err(LlmCallError::Cancelled)));
    }
}
