//! LLM Gateway (§4.C): tiered model routing, schema-aware retry,
//! total-refusal fallback, provider fallback, and cancellation, layered in
//! front of a `ProviderTransport`. Concrete provider adapters are external
//! collaborators (spec.md §1) — this crate only owns the gateway behavior.

mod circuit;
mod gateway;
mod schema;
mod transport;

pub use gateway::{GatewayConfig, LlmGateway};
pub use transport::{AlwaysCredentialed, CredentialStore, ProviderTransport, RawCompletion, TransportError};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use factharbor_types::{
        CancellationToken, LlmCall, LlmCallError, LlmCallRequest, ModelTier, TaskKey,
        WarningsCollector,
    };

    use super::*;

    fn claim_schema() -> serde_json::Value {
        json!({
            "required": ["claimText", "centrality"],
            "properties": {
                "claimText": {"type": "string"},
                "centrality": {"type": "string"}
            },
            "x-quality-critical": ["claimText"]
        })
    }

    struct ScriptedTransport {
        responses: std::sync::Mutex<Vec<Result<RawCompletion, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<RawCompletion, TransportError>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }
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
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(TransportError::Other("no scripted response left".to_string()));
            }
            responses.remove(0)
        }
    }

    fn gateway(transport: ScriptedTransport) -> LlmGateway {
        let mut tier_models = HashMap::new();
        tier_models.insert(ModelTier::Understand, "mid-tier-model".to_string());
        tier_models.insert(ModelTier::Extract, "budget-model".to_string());
        tier_models.insert(ModelTier::Verdict, "premium-model".to_string());
        LlmGateway::new(
            GatewayConfig {
                tier_models,
                global_provider: "anthropic".to_string(),
            },
            Arc::new(transport),
            Arc::new(AlwaysCredentialed),
        )
    }

    fn request() -> LlmCallRequest {
        LlmCallRequest {
            task_key: TaskKey::ClaimRefine,
            prompt_hash: "abc123".to_string(),
            system: "system prompt".to_string(),
            user: "user prompt".to_string(),
            schema: claim_schema(),
            provider_override: None,
        }
    }

    #[tokio::test]
    async fn successful_call_returns_structured_result_with_envelope() {
        let gw = gateway(ScriptedTransport::new(vec![Ok(RawCompletion {
            value: json!({"claimText": "the sky is blue", "centrality": "central"}),
            tokens: 42,
        })]));
        let warnings = WarningsCollector::new();
        let cancel = CancellationToken::new();

        let result = gw.call(request(), &warnings, &cancel).await.unwrap();
        assert_eq!(result.value["claimText"], json!("the sky is blue"));
        assert_eq!(result.envelope.model, "premium-model");
        assert!(!result.envelope.was_total_refusal);
        assert!(warnings.is_empty().await);
    }

    #[tokio::test]
    async fn missing_required_field_triggers_schema_repair_then_succeeds() {
        let gw = gateway(ScriptedTransport::new(vec![
            Ok(RawCompletion {
                value: json!({"claimText": "the sky is blue"}),
                tokens: 10,
            }),
            Ok(RawCompletion {
                value: json!({"claimText": "the sky is blue", "centrality": "central"}),
                tokens: 12,
            }),
        ]));
        let warnings = WarningsCollector::new();
        let cancel = CancellationToken::new();

        let result = gw.call(request(), &warnings, &cancel).await.unwrap();
        assert_eq!(result.value["centrality"], json!("central"));
        let snapshot = warnings.snapshot().await;
        assert!(snapshot
            .iter()
            .any(|w| matches!(w.warning_type, factharbor_types::WarningType::SchemaRepairApplied)));
    }

    #[tokio::test]
    async fn total_refusal_falls_back_to_smaller_tier_once() {
        let gw = gateway(ScriptedTransport::new(vec![
            Ok(RawCompletion {
                value: json!({"claimText": "   ", "centrality": "central"}),
                tokens: 5,
            }),
            Ok(RawCompletion {
                value: json!({"claimText": "the sky is blue", "centrality": "central"}),
                tokens: 8,
            }),
        ]));
        let warnings = WarningsCollector::new();
        let cancel = CancellationToken::new();

        let result = gw.call(request(), &warnings, &cancel).await.unwrap();
        assert!(result.envelope.was_total_refusal);
        assert_eq!(result.envelope.model, "mid-tier-model");
    }

    #[tokio::test]
    async fn provider_override_without_credentials_falls_back_with_warning() {
        struct NoCreds;
        impl CredentialStore for NoCreds {
            fn has_credentials(&self, provider: &str) -> bool {
                provider == "anthropic"
            }
        }

        let mut tier_models = HashMap::new();
        tier_models.insert(ModelTier::Verdict, "premium-model".to_string());
        let gw = LlmGateway::new(
            GatewayConfig {
                tier_models,
                global_provider: "anthropic".to_string(),
            },
            Arc::new(ScriptedTransport::new(vec![Ok(RawCompletion {
                value: json!({"claimText": "x", "centrality": "central"}),
                tokens: 1,
            })])),
            Arc::new(NoCreds),
        );

        let warnings = WarningsCollector::new();
        let cancel = CancellationToken::new();
        let mut req = request();
        req.provider_override = Some("mistral".to_string());

        let result = gw.call(req, &warnings, &cancel).await.unwrap();
        assert_eq!(result.envelope.configured_provider, "mistral");
        assert_eq!(result.envelope.provider, "anthropic");
        let snapshot = warnings.snapshot().await;
        assert!(snapshot
            .iter()
            .any(|w| matches!(w.warning_type, factharbor_types::WarningType::DebateProviderFallback)));
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_cancelled_not_failed() {
        let gw = gateway(ScriptedTransport::new(vec![]));
        let warnings = WarningsCollector::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = gw.call(request(), &warnings, &cancel).await.unwrap_err();
        assert!(matches!(err, LlmCallError::Cancelled));
    }
}
