//! Metric observation
//!
//! Bounded ring buffers per metric kind; old samples drop silently.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Tracked runtime metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Enforcer overrides per turn
    OverrideRate,
    /// Conflicts per hour
    ConflictRate,
    /// Validated correct truths
    Accuracy,
    /// Domain engine confidence
    DomainQuality,
    /// Useful retrievals per retrieval
    MemoryHitRate,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::OverrideRate,
        MetricKind::ConflictRate,
        MetricKind::Accuracy,
        MetricKind::DomainQuality,
        MetricKind::MemoryHitRate,
    ];

    /// Whether higher values are better for this metric
    pub fn higher_is_better(&self) -> bool {
        matches!(
            self,
            MetricKind::Accuracy | MetricKind::DomainQuality | MetricKind::MemoryHitRate
        )
    }

    /// Degradation threshold from the design table
    pub fn degraded(&self, value: f64) -> bool {
        match self {
            MetricKind::OverrideRate => value > 0.30,
            MetricKind::ConflictRate => value > 5.0,
            MetricKind::Accuracy => value < 0.70,
            MetricKind::DomainQuality => value < 0.80,
            MetricKind::MemoryHitRate => value < 0.50,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::OverrideRate => "override_rate",
            MetricKind::ConflictRate => "conflict_rate",
            MetricKind::Accuracy => "accuracy",
            MetricKind::DomainQuality => "domain_quality",
            MetricKind::MemoryHitRate => "memory_hit_rate",
        }
    }
}

#[derive(Debug, Clone)]
struct Sample {
    value: f64,
    #[allow(dead_code)]
    at: DateTime<Utc>,
}

/// Rolling metric buffers
pub struct SystemObserver {
    capacity: usize,
    buffers: RwLock<HashMap<MetricKind, VecDeque<Sample>>>,
}

impl SystemObserver {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: RwLock::new(HashMap::new()),
        }
    }

    /// Record one sample; the oldest drops silently at capacity
    pub fn record(&self, kind: MetricKind, value: f64) {
        let mut buffers = self.buffers.write();
        let buffer = buffers.entry(kind).or_default();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(Sample {
            value,
            at: Utc::now(),
        });
    }

    /// Rolling mean, or None when no samples exist
    pub fn average(&self, kind: MetricKind) -> Option<f64> {
        let buffers = self.buffers.read();
        let buffer = buffers.get(&kind)?;
        if buffer.is_empty() {
            return None;
        }
        Some(buffer.iter().map(|s| s.value).sum::<f64>() / buffer.len() as f64)
    }

    /// Snapshot of all current averages
    pub fn snapshot(&self) -> HashMap<MetricKind, f64> {
        MetricKind::ALL
            .iter()
            .filter_map(|kind| self.average(*kind).map(|avg| (*kind, avg)))
            .collect()
    }

    pub fn sample_count(&self, kind: MetricKind) -> usize {
        self.buffers
            .read()
            .get(&kind)
            .map(|b| b.len())
            .unwrap_or(0)
    }
}
