//! Canonical memory core
//!
//! Stores canonical facts keyed by `(domain, key)` with an embedded vector
//! for similarity queries, guarded by an adaptive schema that learns new
//! domains and keys from repeated valid usage.
//!
//! Lookup precedence when multiple candidates exist:
//! exact `(domain, key)` match > fuzzy-normalized key match >
//! domain-restricted vector match.
//!
//! Fact aggregation lives in the healing layer; this crate only validates,
//! stores and retrieves. It never computes observation weights.

pub mod schema;
pub mod store;

pub use schema::{AdaptiveSchema, KeyDecision, SchemaSnapshot};
pub use store::{CanonicalStore, FactDraft};
