//! Language model client
//!
//! - `ChatBackend`: Ollama-compatible chat API with retry and capped
//!   exponential backoff for transient failures
//! - `ContradictionProbe`: structured contradiction check returning strictly
//!   `{"contradicts": bool, "reason": string}`
//!
//! The backend implements `mnemo_core::LanguageModel`, so every consumer
//! (probe, reply synthesis, tests) is backend-agnostic.

pub mod backend;
pub mod probe;

pub use backend::{ChatBackend, ChatBackendConfig};
pub use probe::{ContradictionProbe, ContradictionVerdict};
