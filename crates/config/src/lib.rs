//! Configuration for the layered memory system
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (MNEMO_ prefix, `__` section separator)
//! - Runtime overrides via the typed structs
//!
//! Every layer takes its own config section; `Settings` aggregates them and
//! validates cross-section consistency (embedding dimensions, thresholds in
//! range, non-zero caps) before any service is constructed.

pub mod settings;

pub use settings::{
    load_settings, CanonicalConfig, CortexConfig, DomainEngineConfig, EmbeddingConfig,
    EnforcerConfig, HealingConfig, LlmConfig, MeshConfig, OptimizerConfig, Settings,
    SnapshotPaths, StoreConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
