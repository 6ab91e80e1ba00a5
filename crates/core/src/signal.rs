//! Domain classification signal

use serde::{Deserialize, Serialize};

/// Sentinel domain returned when no candidate clears the threshold
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// One ranked candidate domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDomain {
    pub domain: String,
    pub score: f64,
}

/// Per-turn classification result, transient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSignal {
    pub domain: String,
    pub confidence: f64,
    /// Remaining candidates, best first
    pub secondary_domains: Vec<ScoredDomain>,
}

impl DomainSignal {
    pub fn new(domain: impl Into<String>, confidence: f64) -> Self {
        Self {
            domain: domain.into(),
            confidence,
            secondary_domains: Vec::new(),
        }
    }

    /// Classification that failed to clear the confidence threshold
    pub fn unknown(ranked: Vec<ScoredDomain>) -> Self {
        let confidence = ranked.first().map(|s| s.score).unwrap_or(0.0);
        Self {
            domain: UNKNOWN_DOMAIN.to_string(),
            confidence,
            secondary_domains: ranked,
        }
    }

    pub fn with_secondary(mut self, secondary: Vec<ScoredDomain>) -> Self {
        self.secondary_domains = secondary;
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.domain == UNKNOWN_DOMAIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_signal() {
        let signal = DomainSignal::unknown(vec![
            ScoredDomain {
                domain: "identity".to_string(),
                score: 0.55,
            },
            ScoredDomain {
                domain: "family".to_string(),
                score: 0.31,
            },
        ]);

        assert!(signal.is_unknown());
        assert_eq!(signal.confidence, 0.55);
        assert_eq!(signal.secondary_domains.len(), 2);
    }

    #[test]
    fn test_confident_signal() {
        let signal = DomainSignal::new("identity", 0.91);
        assert!(!signal.is_unknown());
        assert!(signal.secondary_domains.is_empty());
    }
}
