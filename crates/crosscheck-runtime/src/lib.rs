//! # crosscheck-runtime
//!
//! Async half of crosscheck: calls the answering and judging backends and
//! hands their output to the deterministic fusion in `crosscheck-core`.
//!
//! ## Important
//!
//! Backends only ever produce data. Every transport, authentication or
//! timeout failure becomes a failed [`AdapterOutcome`], and the only errors
//! a caller sees are the three [`VerificationError`] variants.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crosscheck_runtime::{
//!     ProviderRegistry, RuntimeConfig, VerificationEvent, VerificationOrchestrator,
//!     VerificationRequest,
//! };
//! use futures::StreamExt;
//!
//! let config = RuntimeConfig::from_yaml_file("crosscheck.yaml")?;
//! let orchestrator = VerificationOrchestrator::from_config(&config, &ProviderRegistry::with_defaults())?;
//!
//! let mut events = orchestrator.run_verification(VerificationRequest::new("What is 12 * 8?", true));
//! while let Some(event) = events.next().await {
//!     match event {
//!         VerificationEvent::Progress(p) => eprintln!("[{}/4] {}", p.phase_index, p.message),
//!         VerificationEvent::Verdict(v) => println!("{}", v.direct_answer),
//!         VerificationEvent::Failed(e) => eprintln!("{e}"),
//!     }
//! }
//! ```

pub mod backends;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod sink;

pub use backends::{build_backend, AdapterOutcome, BackendAdapter, LlmBackend, UnavailableBackend};
pub use config::{AnswererConfigs, BackendConfig, ConfigError, JudgeConfigs, RuntimeConfig};
pub use orchestrator::{
    NoProgress, ProgressNotifier, RuntimeError, VerificationError, VerificationEvent,
    VerificationOrchestrator, VerificationOrchestratorBuilder, VerificationRequest,
    VerificationStream,
};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};

// Re-exported so adapters outside this crate can honor cancellation.
pub use tokio_util::sync::CancellationToken;
