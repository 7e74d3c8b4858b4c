//! Inference runtime for pocketllm.
//!
//! - [`InferenceRuntime`] owns the single native context and its state
//!   machine (load, switch, release, failure accounting).
//! - [`GenerationOrchestrator`] serializes generation requests, maps load
//!   and token progress onto one 0-100 signal and enforces idle and hard
//!   timeouts.
//! - [`EventBus`] fans events out to reliable and lossy subscribers.
//! - [`AppServices`] wires it all together over a set of repositories.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod error;
pub mod events;
pub mod integrity;
pub mod orchestrator;
pub mod runtime;

pub use bootstrap::{AppServices, StartupReport};
pub use error::RuntimeError;
pub use events::EventBus;
pub use integrity::{GGUF_MAGIC, verify_model_file};
pub use orchestrator::GenerationOrchestrator;
pub use orchestrator::progress::{generation_percent, load_percent};
pub use runtime::InferenceRuntime;
