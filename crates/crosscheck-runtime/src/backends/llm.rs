//! Provider-backed adapters and their construction from config.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::traits::{AdapterOutcome, BackendAdapter};
use crate::config::BackendConfig;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, ProviderRegistry};

/// Adapter sending each prompt as a single user message to an LLM provider.
pub struct LlmBackend {
    name: String,
    provider: Arc<dyn LlmProvider>,

    /// Model settings; the timeout is replaced by the caller's on each call
    settings: CompletionConfig,
}

impl LlmBackend {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LlmProvider>, settings: CompletionConfig) -> Self {
        Self {
            name: name.into(),
            provider,
            settings,
        }
    }
}

impl std::fmt::Debug for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmBackend")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("model", &self.settings.model)
            .finish()
    }
}

#[async_trait]
impl BackendAdapter for LlmBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, prompt: &str, timeout: Duration, cancel: CancellationToken) -> AdapterOutcome {
        let config = CompletionConfig {
            timeout,
            ..self.settings.clone()
        };
        let started = Instant::now();
        let call = self.provider.complete(vec![ChatMessage::user(prompt)], &config);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(backend = %self.name, "Backend call cancelled");
                return AdapterOutcome::failure(format!("{} call cancelled", self.name));
            }
            result = tokio::time::timeout(timeout, call) => {
                result.unwrap_or(Err(ProviderError::Timeout(timeout)))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(response) => {
                tracing::debug!(
                    backend = %self.name,
                    model = %response.model,
                    tokens = response.usage.total(),
                    elapsed_ms,
                    "Backend call succeeded"
                );
                AdapterOutcome::success(response.content.trim())
            }
            Err(e) => {
                tracing::warn!(backend = %self.name, error = %e, elapsed_ms, "Backend call failed");
                AdapterOutcome::failure(format!("{} call failed: {}", self.name, e))
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.provider.health_check().await
    }
}

/// Stand-in for a backend whose provider could not be built.
///
/// Every call fails with the construction error, so a misconfigured slot
/// shows up in the verdict instead of aborting wiring.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    name: String,
    reason: String,
}

impl UnavailableBackend {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BackendAdapter for UnavailableBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _prompt: &str, _timeout: Duration, _cancel: CancellationToken) -> AdapterOutcome {
        AdapterOutcome::failure(format!("{} is unavailable: {}", self.name, self.reason))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

/// Build the adapter for one configured backend.
///
/// Falls back to [`UnavailableBackend`] when the provider cannot be created.
pub fn build_backend(config: &BackendConfig, registry: &ProviderRegistry) -> Arc<dyn BackendAdapter> {
    match registry.create(&config.provider, &config.options) {
        Ok(provider) => {
            let settings = config.completion_config(CompletionConfig::default().timeout);
            Arc::new(LlmBackend::new(config.name.clone(), provider, settings))
        }
        Err(e) => {
            tracing::warn!(
                backend = %config.name,
                provider = %config.provider,
                error = %e,
                "Backend unavailable"
            );
            Arc::new(UnavailableBackend::new(config.name.clone(), e.to_string()))
        }
    }
}
