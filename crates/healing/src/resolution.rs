//! Weighted conflict resolution
//!
//! Pure functions over an observation set: compute per-value support,
//! then pick the winner. Tie-break order: higher support weight, more
//! supporting observations, newest observation.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use mnemo_core::{Authority, Observation};

use crate::weights::{temporal_factor, AggregationWeights};

/// Two supports closer than this are a tie
const WEIGHT_EPSILON: f64 = 1e-9;

/// Aggregated support for one candidate value
#[derive(Debug, Clone)]
pub struct ValueSupport {
    pub value: String,
    pub weight: f64,
    pub supporters: usize,
    pub newest: DateTime<Utc>,
    /// Strongest authority among supporting observations
    pub max_authority: Authority,
}

/// How the winner was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerKind {
    /// Strictly more weighted support than every rival
    ByWeight,
    /// Weight tied; won on supporter count or recency
    ByTieBreak,
}

/// Per-value weighted support over a set of observations
pub fn support_weights(
    observations: &[Observation],
    weights: &AggregationWeights,
) -> Vec<ValueSupport> {
    let mut by_value: HashMap<&str, ValueSupport> = HashMap::new();

    for obs in observations {
        let contribution = weights.authority(obs.authority)
            * weights.source(obs.source)
            * temporal_factor(obs.age_days());

        by_value
            .entry(obs.value.as_str())
            .and_modify(|support| {
                support.weight += contribution;
                support.supporters += 1;
                support.newest = support.newest.max(obs.timestamp);
                support.max_authority = support.max_authority.max(obs.authority);
            })
            .or_insert_with(|| ValueSupport {
                value: obs.value.clone(),
                weight: contribution,
                supporters: 1,
                newest: obs.timestamp,
                max_authority: obs.authority,
            });
    }

    let mut supports: Vec<ValueSupport> = by_value.into_values().collect();
    supports.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.supporters.cmp(&a.supporters))
            .then_with(|| b.newest.cmp(&a.newest))
    });
    supports
}

/// Pick the winning value from sorted supports
///
/// Returns `None` for an empty set. `ByTieBreak` means the top weights
/// were indistinguishable and the conflict should stay open for review.
pub fn pick_winner(supports: &[ValueSupport]) -> Option<(&ValueSupport, WinnerKind)> {
    let winner = supports.first()?;
    let kind = match supports.get(1) {
        Some(runner_up) if (winner.weight - runner_up.weight).abs() < WEIGHT_EPSILON => {
            WinnerKind::ByTieBreak
        },
        _ => WinnerKind::ByWeight,
    };
    Some((winner, kind))
}
