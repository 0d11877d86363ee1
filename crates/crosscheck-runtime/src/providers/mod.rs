//! LLM provider abstractions for crosscheck-runtime.
//!
//! Providers speak to a concrete chat-completion API. Backend adapters
//! (see [`crate::backends`]) wrap a provider and turn its errors into the
//! text-or-failure outcomes the orchestrator consumes.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "openai-compat")]
mod openai_compat;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "openai-compat")]
pub use openai_compat::{OpenAiCompatibleFactory, OpenAiCompatibleProvider};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "qwen-turbo".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model that served the request
    pub model: String,

    /// Why generation stopped
    pub finish_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping LLM backends.
///
/// Only backend adapters call providers. The synthesizer never does.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is healthy.
    async fn health_check(&self) -> bool;

    /// Get provider name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_creation() {
        let user = ChatMessage::user("What is 12 * 8?");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, "What is 12 * 8?");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_provider_error_messages() {
        let err = ProviderError::ApiError {
            status: 500,
            message: "upstream exploded".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 500 - upstream exploded");
        assert!(ProviderError::Timeout(Duration::from_secs(3))
            .to_string()
            .contains("3s"));
    }
}
