//! Runtime configuration.
//!
//! Loaded from YAML; every field has a default, so a file only needs to
//! name what it changes:
//!
//! ```yaml
//! answer_timeout: 45s
//! judges:
//!   second:
//!     name: GLM judge
//!     model: glm-4-plus
//!     options:
//!       base_url: https://open.bigmodel.cn/api/paas/v4
//!       api_key_env: ZHIPU_API_KEY
//! ```
//!
//! API keys never live in these structs directly; `options.api_key` or the
//! variable named by `options.api_key_env` is read by the provider into an
//! [`ApiCredential`](crate::providers::ApiCredential).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::providers::{CompletionConfig, ProviderRegistry};

/// Provider type used when a backend names none.
pub const DEFAULT_PROVIDER: &str = "openai-compatible";

const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const DASHSCOPE_KEY_ENV: &str = "DASHSCOPE_API_KEY";
const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
const ZHIPU_KEY_ENV: &str = "ZHIPU_API_KEY";

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Deadline for the whole answer phase
    #[serde(with = "duration_str")]
    pub answer_timeout: Duration,

    /// Deadline for the whole judge phase
    #[serde(with = "duration_str")]
    pub judge_timeout: Duration,

    pub answerers: AnswererConfigs,
    pub judges: JudgeConfigs,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            answer_timeout: Duration::from_secs(30),
            judge_timeout: Duration::from_secs(30),
            answerers: AnswererConfigs::default(),
            judges: JudgeConfigs::default(),
        }
    }
}

/// The two answering backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnswererConfigs {
    pub a: BackendConfig,
    pub b: BackendConfig,
}

impl Default for AnswererConfigs {
    fn default() -> Self {
        Self {
            a: BackendConfig::dashscope("Qwen", "qwen-turbo", 0.1),
            b: BackendConfig::zhipu("GLM", "glm-4-flash", 0.1),
        }
    }
}

/// The two judging backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JudgeConfigs {
    pub first: BackendConfig,
    pub second: BackendConfig,
}

impl Default for JudgeConfigs {
    fn default() -> Self {
        Self {
            first: BackendConfig::dashscope("Qwen judge", "qwen-plus", 0.0),
            second: BackendConfig::zhipu("GLM judge", "glm-4", 0.0),
        }
    }
}

/// One backend: a display name, a provider type and the model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Display name shown in verdicts and logs
    pub name: String,

    /// Provider type registered in the
    /// [`ProviderRegistry`](crate::providers::ProviderRegistry)
    #[serde(default = "default_provider")]
    pub provider: String,

    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Provider-specific options (base_url, api_key_env, ...)
    #[serde(default = "empty_options")]
    pub options: JsonValue,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn empty_options() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl BackendConfig {
    fn openai_compatible(name: &str, model: &str, temperature: f32, base_url: &str, key_env: &str) -> Self {
        Self {
            name: name.to_string(),
            provider: default_provider(),
            model: model.to_string(),
            temperature,
            max_tokens: default_max_tokens(),
            options: serde_json::json!({
                "base_url": base_url,
                "api_key_env": key_env,
            }),
        }
    }

    fn dashscope(name: &str, model: &str, temperature: f32) -> Self {
        Self::openai_compatible(name, model, temperature, DASHSCOPE_BASE_URL, DASHSCOPE_KEY_ENV)
    }

    fn zhipu(name: &str, model: &str, temperature: f32) -> Self {
        Self::openai_compatible(name, model, temperature, ZHIPU_BASE_URL, ZHIPU_KEY_ENV)
    }

    /// Completion settings for one call under `timeout`.
    pub fn completion_config(&self, timeout: Duration) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout,
        }
    }

    fn problems(&self, slot: &str, out: &mut Vec<String>) {
        if self.name.trim().is_empty() {
            out.push(format!("{slot}: name must not be empty"));
        }
        if self.provider.trim().is_empty() {
            out.push(format!("{slot}: provider must not be empty"));
        }
        if self.model.trim().is_empty() {
            out.push(format!("{slot}: model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            out.push(format!(
                "{slot}: temperature {} is outside 0.0..=2.0",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            out.push(format!("{slot}: max_tokens must be positive"));
        }
        if !self.options.is_object() {
            out.push(format!("{slot}: options must be a mapping"));
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check the configuration, reporting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.answer_timeout.is_zero() {
            problems.push("answer_timeout must be positive".to_string());
        }
        if self.judge_timeout.is_zero() {
            problems.push("judge_timeout must be positive".to_string());
        }

        for (slot, backend) in self.backends() {
            backend.problems(slot, &mut problems);
        }

        if self.answerers.a.name.trim() == self.answerers.b.name.trim() {
            problems.push(format!(
                "answerers a and b share the name '{}'",
                self.answerers.a.name
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Problems the registry finds with each backend's provider settings,
    /// such as an unknown type or a missing API key.
    ///
    /// Nothing is built and no network call is made.
    pub fn provider_problems(&self, registry: &ProviderRegistry) -> Vec<String> {
        self.backends()
            .into_iter()
            .filter_map(|(slot, backend)| {
                registry
                    .validate(&backend.provider, &backend.options)
                    .err()
                    .map(|e| format!("{slot} ({}): {e}", backend.name))
            })
            .collect()
    }

    /// Every configured backend, labeled by slot.
    pub fn backends(&self) -> [(&'static str, &BackendConfig); 4] {
        [
            ("answerer a", &self.answerers.a),
            ("answerer b", &self.answerers.b),
            ("judge 1", &self.judges.first),
            ("judge 2", &self.judges.second),
        ]
    }
}

/// `Duration` as a humantime string ("30s", "1m 30s").
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
