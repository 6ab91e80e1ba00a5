//! Meta-learning cortex
//!
//! Observes `(question, domain, score, patterns, helpful)` tuples and
//! discovers which reasoning patterns generalize across domains. Learning
//! is two-level:
//!
//! - per domain: success statistics per pattern plus a threshold delta
//!   that makes well-performing domains easier to activate
//! - cross-domain: a normalized pattern with positive observations in
//!   enough distinct domains becomes *universal*, with confidence equal
//!   to its minimum per-domain success rate
//!
//! Universal patterns earn a fixed activation bonus in domains with no
//! local history, and can optionally be grounded into the graph store as
//! symbolic nodes. State serializes to a JSON snapshot so learning
//! survives restart.

pub mod cortex;
pub mod normalize;

pub use cortex::{CortexSnapshot, CrossDomainPattern, MetaCortex, PatternObservation, PatternStats};
pub use normalize::normalize_pattern;
