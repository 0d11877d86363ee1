//! Backend adapter trait and its outcome type.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of one backend call: text on success, a diagnostic otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOutcome {
    pub text: String,
    pub ok: bool,
}

impl AdapterOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ok: true,
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            text: diagnostic.into(),
            ok: false,
        }
    }
}

/// A model that can be asked one prompt at a time.
///
/// # Contract
/// - MUST NOT panic on backend failure; report `ok = false` instead
/// - MUST give up once `timeout` has elapsed
/// - SHOULD stop promptly once `cancel` fires
/// - MUST NOT keep state between calls that affects later answers
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Display name used in verdicts and logs.
    fn name(&self) -> &str;

    /// Send `prompt` and wait for the reply.
    async fn invoke(&self, prompt: &str, timeout: Duration, cancel: CancellationToken)
        -> AdapterOutcome;

    /// Whether the backend looks usable. Used for diagnostics only.
    async fn health_check(&self) -> bool {
        true
    }
}
