//! Canonical facts, raw observations, and conflicts
//!
//! A `Fact` is the single accepted value for a `(domain, key)` pair. An
//! `Observation` is one data point that is not yet truth; facts are only
//! created by aggregating observations. A `Conflict` records the moment two
//! non-deprecated facts disagreed and how the disagreement was settled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How durable the claim's origin considers itself
///
/// Ordered weakest to strongest; `Ord` follows declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authority {
    Test,
    #[default]
    ShortTerm,
    MediumTerm,
    Stable,
    LongTerm,
}

/// Where a claim came from, independent of its authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationSource {
    CliTest,
    #[default]
    ChatUser,
    MemoryEnhancement,
    IngestDoc,
    SystemDefault,
}

/// Lifecycle status of a fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactStatus {
    #[default]
    Active,
    Stable,
    Suspect,
    Deprecated,
}

impl FactStatus {
    /// Active and Stable facts are the canonical truth for their key
    pub fn is_canonical(&self) -> bool {
        matches!(self, FactStatus::Active | FactStatus::Stable)
    }
}

/// Broad shape of what a fact asserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FactType {
    Identity,
    #[default]
    Attribute,
    Preference,
    Relation,
    Event,
}

/// One canonical statement, owned by the canonical store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: Uuid,
    pub domain: String,
    pub key: String,
    pub value: String,
    pub fact_type: FactType,
    /// Belief strength in [0, 1]; moves only on reinforcement, refutation
    /// or decay, never spontaneously.
    pub confidence: f64,
    pub authority: Authority,
    pub status: FactStatus,
    pub source: ObservationSource,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Number of observations supporting the current value
    pub support_count: u32,
}

impl Fact {
    pub fn new(
        domain: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            key: key.into(),
            value: value.into(),
            fact_type: FactType::default(),
            confidence: 1.0,
            authority: Authority::default(),
            status: FactStatus::Active,
            source: ObservationSource::default(),
            created_at: now,
            last_accessed_at: now,
            support_count: 1,
        }
    }

    pub fn with_fact_type(mut self, fact_type: FactType) -> Self {
        self.fact_type = fact_type;
        self
    }

    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_source(mut self, source: ObservationSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Whether this fact is the accepted truth for its key
    pub fn is_canonical(&self) -> bool {
        self.status.is_canonical()
    }

    /// Refresh the access timestamp on read
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    /// Age of the fact in whole days
    pub fn age_days(&self) -> i64 {
        (Utc::now() - self.created_at).num_days()
    }

    /// Days since the fact was last retrieved
    pub fn idle_days(&self) -> i64 {
        (Utc::now() - self.last_accessed_at).num_days()
    }
}

/// A single data point that is not yet truth, owned by the healing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub domain: String,
    pub key: String,
    pub value: String,
    pub source: ObservationSource,
    pub authority: Authority,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        domain: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        source: ObservationSource,
        authority: Authority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            key: key.into(),
            value: value.into(),
            source,
            authority,
            timestamp: Utc::now(),
        }
    }

    /// Age in whole days, floored at zero for clock skew
    pub fn age_days(&self) -> i64 {
        (Utc::now() - self.timestamp).num_days().max(0)
    }
}

/// How a conflict was settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolution {
    /// One value carried strictly more weighted support
    WeightedSupport,
    /// Support tied; the newest value won and losers were marked suspect
    NewestWins,
}

/// A detected disagreement between non-deprecated facts for one key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    pub domain: String,
    pub key: String,
    pub competing_values: Vec<String>,
    /// The value that won, once resolved
    pub resolution: Option<String>,
    pub resolution_kind: Option<ConflictResolution>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Ties remain open for manual review even after a winner is picked
    pub open: bool,
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    pub fn new(
        domain: impl Into<String>,
        key: impl Into<String>,
        competing_values: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            key: key.into(),
            competing_values,
            resolution: None,
            resolution_kind: None,
            resolved_at: None,
            open: true,
            detected_at: Utc::now(),
        }
    }

    /// Record the winning value
    pub fn resolve(&mut self, winner: impl Into<String>, kind: ConflictResolution) {
        self.resolution = Some(winner.into());
        self.resolved_at = Some(Utc::now());
        // Tie-broken conflicts stay open for review
        self.open = kind == ConflictResolution::NewestWins;
        self.resolution_kind = Some(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_ordering() {
        assert!(Authority::Test < Authority::ShortTerm);
        assert!(Authority::ShortTerm < Authority::MediumTerm);
        assert!(Authority::MediumTerm < Authority::Stable);
        assert!(Authority::Stable < Authority::LongTerm);
    }

    #[test]
    fn test_fact_builder() {
        let fact = Fact::new("identity", "name", "Morten")
            .with_fact_type(FactType::Identity)
            .with_authority(Authority::LongTerm)
            .with_confidence(1.5);

        assert_eq!(fact.domain, "identity");
        assert_eq!(fact.key, "name");
        assert_eq!(fact.value, "Morten");
        assert_eq!(fact.authority, Authority::LongTerm);
        // Confidence clamps to [0, 1]
        assert_eq!(fact.confidence, 1.0);
        assert!(fact.is_canonical());
    }

    #[test]
    fn test_status_canonical() {
        assert!(FactStatus::Active.is_canonical());
        assert!(FactStatus::Stable.is_canonical());
        assert!(!FactStatus::Suspect.is_canonical());
        assert!(!FactStatus::Deprecated.is_canonical());
    }

    #[test]
    fn test_conflict_resolution() {
        let mut conflict = Conflict::new(
            "identity",
            "name",
            vec!["Morten".to_string(), "Morpheus".to_string()],
        );
        assert!(conflict.open);

        conflict.resolve("Morten", ConflictResolution::WeightedSupport);
        assert_eq!(conflict.resolution.as_deref(), Some("Morten"));
        assert!(!conflict.open);

        let mut tie = Conflict::new("identity", "city", vec!["Oslo".into(), "Bergen".into()]);
        tie.resolve("Bergen", ConflictResolution::NewestWins);
        // Tie-breaks stay open for manual review
        assert!(tie.open);
    }

    #[test]
    fn test_observation_age() {
        let obs = Observation::new(
            "identity",
            "name",
            "Morten",
            ObservationSource::ChatUser,
            Authority::ShortTerm,
        );
        assert_eq!(obs.age_days(), 0);
    }
}
