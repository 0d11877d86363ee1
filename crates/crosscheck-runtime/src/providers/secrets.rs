//! Credential handling for backend providers.
//!
//! API keys are wrapped in [`ApiCredential`] as soon as they are read, so
//! they never show up in `Debug`/`Display` output, logs, or error messages.
//!
//! ## Lookup order
//!
//! Backend options (the `options` table of a backend in the config file)
//! are consulted first:
//!
//! 1. `api_key`: the key itself
//! 2. `api_key_env`: name of an environment variable holding the key
//! 3. the provider's default environment variable
//!
//! ```ignore
//! let cred = ApiCredential::from_options(&options, "DASHSCOPE_API_KEY", "DashScope API key")?;
//! request.bearer_auth(cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Option key holding an inline API key.
pub const API_KEY_OPTION: &str = "api_key";

/// Option key naming the environment variable that holds the API key.
pub const API_KEY_ENV_OPTION: &str = "api_key_env";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Inline in the backend options
    Config,
    /// Environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` show `[REDACTED]`; the value is zeroed on drop by
/// `secrecy`, and can only be read through [`ApiCredential::expose`].
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from an environment variable.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        match std::env::var(env_var) {
            Ok(v) if !v.trim().is_empty() => Ok(Self::new(v, CredentialSource::Environment, name)),
            _ => Err(ProviderError::NotConfigured(format!(
                "{} not set: configure the '{}' environment variable",
                name, env_var
            ))),
        }
    }

    /// Load a credential from backend options, falling back to the
    /// environment.
    ///
    /// `default_env` is used when the options do not name a variable.
    pub fn from_options(
        options: &JsonValue,
        default_env: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = options[API_KEY_OPTION].as_str() {
            if !value.trim().is_empty() {
                return Ok(Self::new(value, CredentialSource::Config, name));
            }
        }

        let env_var = Self::env_var_name(options, default_env);
        Self::from_env(env_var, name).map_err(|_| {
            ProviderError::NotConfigured(format!(
                "{} required: set '{}' in the backend options or the {} environment variable",
                name, API_KEY_OPTION, env_var
            ))
        })
    }

    /// Check whether a credential could be loaded, without loading it.
    pub fn is_available(options: &JsonValue, default_env: &str) -> bool {
        let inline = options[API_KEY_OPTION]
            .as_str()
            .is_some_and(|v| !v.trim().is_empty());
        inline
            || std::env::var(Self::env_var_name(options, default_env))
                .is_ok_and(|v| !v.trim().is_empty())
    }

    fn env_var_name<'a>(options: &'a JsonValue, default_env: &'a str) -> &'a str {
        options[API_KEY_ENV_OPTION].as_str().unwrap_or(default_env)
    }

    /// Expose the credential value at the point of use.
    ///
    /// Never store the returned slice.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
