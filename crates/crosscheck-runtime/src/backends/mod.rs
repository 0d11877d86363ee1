//! Backend adapters: the only place the orchestrator talks to models.
//!
//! Each answering or judging slot is an [`Arc<dyn BackendAdapter>`]. An
//! adapter turns every failure (transport, authentication, timeout,
//! cancellation) into an [`AdapterOutcome`] with `ok = false`, so the
//! orchestrator never sees an `Err` from a backend.

mod llm;
mod traits;

pub use llm::{build_backend, LlmBackend, UnavailableBackend};
pub use traits::{AdapterOutcome, BackendAdapter};
