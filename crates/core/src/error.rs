//! Error types shared across all memory layers

use thiserror::Error;

/// Result alias used throughout the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across layer boundaries
///
/// Variants map to failure kinds, not to the component that produced them:
/// the routing log records the layer, the error records the meaning.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A fact was rejected by the adaptive schema (forbidden pattern,
    /// unknown key below the learning threshold, value too long).
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A hard cap was reached (total facts, per-domain facts, dynamic
    /// domains).
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Vector store, embedder, LLM or other external backend failure.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The LLM contradiction probe could not produce a usable verdict.
    #[error("contradiction check failed: {0}")]
    ContradictionCheckFailed(String),

    /// Competing values for one (domain, key) carry identical support.
    #[error("conflict unresolvable for {domain}.{key}")]
    ConflictUnresolvable { domain: String, key: String },

    /// An optimizer adjustment could not be judged against its baseline.
    #[error("optimization inconclusive: {0}")]
    OptimizationInconclusive(String),

    /// The graph store is unreachable; callers proceed without it.
    #[error("graph unavailable: {0}")]
    GraphUnavailable(String),

    /// Invalid configuration detected before services were constructed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Snapshot file could not be written or read.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Stable kind tag for the routing log
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SchemaViolation(_) => ErrorKind::SchemaViolation,
            Error::LimitExceeded(_) => ErrorKind::LimitExceeded,
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::ContradictionCheckFailed(_) => ErrorKind::ContradictionCheckFailed,
            Error::ConflictUnresolvable { .. } => ErrorKind::ConflictUnresolvable,
            Error::OptimizationInconclusive(_) => ErrorKind::OptimizationInconclusive,
            Error::GraphUnavailable(_) => ErrorKind::GraphUnavailable,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Persistence(_) => ErrorKind::Persistence,
            Error::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Whether the enclosing turn may continue with a fallback
    ///
    /// Non-critical layers swallow these with a log entry; only enforcer
    /// and commit failures abort the decision path.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BackendUnavailable(_)
                | Error::ContradictionCheckFailed(_)
                | Error::GraphUnavailable(_)
                | Error::OptimizationInconclusive(_)
        )
    }
}

/// Stable error kind tags, serialized into routing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    SchemaViolation,
    LimitExceeded,
    BackendUnavailable,
    ContradictionCheckFailed,
    ConflictUnresolvable,
    OptimizationInconclusive,
    GraphUnavailable,
    Configuration,
    Persistence,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = Error::SchemaViolation("forbidden key".to_string());
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);

        let err = Error::ConflictUnresolvable {
            domain: "identity".to_string(),
            key: "name".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ConflictUnresolvable);
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::BackendUnavailable("qdrant down".to_string()).is_recoverable());
        assert!(Error::GraphUnavailable("timeout".to_string()).is_recoverable());
        assert!(!Error::SchemaViolation("password".to_string()).is_recoverable());
        assert!(!Error::LimitExceeded("max facts".to_string()).is_recoverable());
    }
}
