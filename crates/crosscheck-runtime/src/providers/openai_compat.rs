//! OpenAI-compatible chat-completions provider.
//!
//! Most hosted model vendors expose `POST {base_url}/chat/completions` with
//! bearer authentication (DashScope's compatible mode, Zhipu's open
//! platform, OpenAI itself), so one provider covers all of them.
//!
//! ## Options
//! ```json
//! {
//!   "base_url": "https://dashscope.aliyuncs.com/compatible-mode/v1",
//!   "api_key_env": "DASHSCOPE_API_KEY",   // or "api_key": "sk-..."
//! }
//! ```

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable consulted when the options name none.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Base URL used when the options name none.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Longest slice of an error body kept in diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Provider for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatibleProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiCompatibleProvider {
    /// Create a provider with an explicit key and base URL.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_credential(
            ApiCredential::new(api_key, CredentialSource::Programmatic, "API key"),
            base_url.into(),
        )
    }

    /// Create from backend options with environment fallback for the key.
    pub fn from_options(options: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_options(options, DEFAULT_API_KEY_ENV, "API key")?;
        tracing::debug!(source = %credential.source(), "API key loaded");
        let base_url = options["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();
        Self::with_credential(credential, base_url)
    }

    fn with_credential(credential: ApiCredential, base_url: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        Ok(Self {
            credential,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Best-effort human-readable message from an error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = ChatRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        // Only expose the credential here, at the point of use
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthError);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))?;

        let usage = body.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: body.model.unwrap_or_else(|| config.model.clone()),
            finish_reason: choice.finish_reason,
        })
    }

    async fn health_check(&self) -> bool {
        // Only checks that a key is present; no network round trip.
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

/// Factory registered under `openai-compatible`.
pub struct OpenAiCompatibleFactory;

impl ProviderFactory for OpenAiCompatibleFactory {
    fn provider_type(&self) -> &'static str {
        "openai-compatible"
    }

    fn create(&self, options: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_options(options)?;
        Ok(Arc::new(OpenAiCompatibleProvider::from_options(options)?))
    }

    fn validate_options(&self, options: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(options, DEFAULT_API_KEY_ENV) {
            let env_var = options["api_key_env"].as_str().unwrap_or(DEFAULT_API_KEY_ENV);
            return Err(ProviderError::NotConfigured(format!(
                "API key required: set 'api_key' in the backend options or the {} environment variable",
                env_var
            )));
        }

        if let Some(url) = options["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "OpenAI-compatible chat completions (DashScope, Zhipu, OpenAI, ...)"
    }
}
