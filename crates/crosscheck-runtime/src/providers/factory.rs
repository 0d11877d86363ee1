//! Provider factories and the registry that resolves them by type name.
//!
//! A backend in the config file names its provider type
//! (e.g. `openai-compatible`) and carries a free-form `options` table. The
//! registry maps the type name to a factory, which validates the options and
//! builds the provider.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("openai-compatible", &backend.options)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{LlmProvider, ProviderError};

/// Factory for creating LLM providers from backend options.
pub trait ProviderFactory: Send + Sync {
    /// Unique identifier for this provider type.
    fn provider_type(&self) -> &'static str;

    /// Create a provider instance from backend options.
    fn create(&self, options: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Validate options without creating a provider.
    fn validate_options(&self, options: &JsonValue) -> Result<(), ProviderError>;

    /// Human-readable description of this provider.
    fn description(&self) -> &'static str {
        "LLM Provider"
    }
}

/// Registry of available provider factories.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory, replacing any with the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Create a provider from its type name and options.
    pub fn create(
        &self,
        provider_type: &str,
        options: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.factory(provider_type)?.create(options)
    }

    /// Validate options for a provider type.
    pub fn validate(&self, provider_type: &str, options: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_options(options)
    }

    /// List available provider types.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Each registered type with its factory's description.
    pub fn descriptions(&self) -> Vec<(&str, &'static str)> {
        self.factories
            .iter()
            .map(|(name, factory)| (name.as_str(), factory.description()))
            .collect()
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })
    }

    /// Create a registry with all built-in providers registered.
    #[cfg(feature = "openai-compat")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::OpenAiCompatibleFactory));
        registry
    }

    /// Create a registry with all built-in providers registered.
    #[cfg(not(feature = "openai-compat"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    /// Replies with the model name it was configured for.
    struct EchoModel {
        label: String,
    }

    #[async_trait]
    impl LlmProvider for EchoModel {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: format!("{} saw {} message(s)", config.model, messages.len()),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                finish_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.label
        }
    }

    /// Requires a `label` option, like a real provider requires a base URL.
    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn provider_type(&self) -> &'static str {
            "echo"
        }

        fn create(&self, options: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            self.validate_options(options)?;
            let label = options["label"].as_str().unwrap_or_default().to_string();
            Ok(Arc::new(EchoModel { label }))
        }

        fn validate_options(&self, options: &JsonValue) -> Result<(), ProviderError> {
            match options["label"].as_str() {
                Some(label) if !label.is_empty() => Ok(()),
                _ => Err(ProviderError::NotConfigured("echo needs a label".to_string())),
            }
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));
        registry
    }

    #[tokio::test]
    async fn test_create_by_type_name() {
        let registry = registry();
        assert_eq!(registry.available_types(), vec!["echo"]);

        let provider = registry
            .create("echo", &serde_json::json!({"label": "judge-echo"}))
            .unwrap();
        assert_eq!(provider.name(), "judge-echo");

        let reply = provider
            .complete(vec![ChatMessage::user("q")], &CompletionConfig::default())
            .await
            .unwrap();
        assert_eq!(reply.content, "qwen-turbo saw 1 message(s)");
    }

    #[test]
    fn test_unknown_type_lists_available() {
        let err = registry()
            .create("zhipu-native", &serde_json::json!({}))
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("Unknown provider type: 'zhipu-native'"), "{err}");
        assert!(err.contains("echo"), "{err}");
    }

    #[test]
    fn test_validate_delegates_to_factory() {
        let registry = registry();
        assert!(registry.validate("echo", &serde_json::json!({"label": "x"})).is_ok());
        assert!(registry.validate("echo", &serde_json::json!({})).is_err());
        assert!(registry.create("echo", &serde_json::json!({"label": ""})).is_err());
    }

    #[test]
    fn test_descriptions_fall_back_to_default() {
        assert_eq!(registry().descriptions(), vec![("echo", "LLM Provider")]);
    }

    #[test]
    fn test_debug_lists_types() {
        assert!(format!("{:?}", registry()).contains("echo"));
    }

    #[cfg(feature = "openai-compat")]
    #[test]
    fn test_defaults_register_openai_compatible() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.available_types(), vec!["openai-compatible"]);

        let (_, description) = registry.descriptions()[0];
        assert!(description.starts_with("OpenAI-compatible"), "{description}");
    }
}
