//! Self-healing truth layer
//!
//! Owns raw observations and the aggregation that turns them into
//! canonical facts. The canonical store is a consumer of the aggregation
//! result and never sees how weights are computed.
//!
//! Write path for an asserted fact:
//! register observation -> detect conflicts -> reweight -> commit winner ->
//! propagate invalidation to dependents.
//!
//! The load-bearing property is test isolation: a CLI-test observation
//! carries weight 0.1 x 0.1 = 0.01, so no volume of test writes can unseat
//! a single real user statement.

pub mod causality;
pub mod confidence;
pub mod engine;
pub mod ledger;
pub mod resolution;
pub mod weights;

pub use causality::CausalityGraph;
pub use confidence::ConfidenceAdjuster;
pub use engine::TruthEngine;
pub use ledger::ObservationLedger;
pub use resolution::{pick_winner, support_weights, ValueSupport, WinnerKind};
pub use weights::{temporal_factor, AggregationWeights};
