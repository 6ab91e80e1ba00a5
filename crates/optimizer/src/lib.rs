//! Self-optimizing layer
//!
//! Four sub-layers around a read-copy-update parameter snapshot:
//!
//! - `SystemObserver`: bounded ring buffers of runtime metrics
//! - `MetaEvaluator`: proposes bounded adjustments (max 20% per cycle)
//!   for metrics outside their degradation thresholds
//! - `ParameterAdapter`: publishes a fresh parameter snapshot atomically
//! - `EffectivenessTracker`: after the evaluation window, compares post
//!   metrics to the baseline and anchors or reverts every adjustment
//!
//! Safety rule: no adjustment is ever left unresolved past two
//! evaluation windows; by then it is forced to ANCHORED or REVERTED.

pub mod adjust;
pub mod metrics;
pub mod optimizer;
pub mod params;

pub use adjust::{Adjustment, AdjustmentResult};
pub use metrics::{MetricKind, SystemObserver};
pub use optimizer::SelfOptimizer;
pub use params::{ParameterStore, TuningParams};
