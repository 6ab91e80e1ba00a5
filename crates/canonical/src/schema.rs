//! Adaptive schema
//!
//! The schema starts from a core set of domains and grows monotonically:
//! unknown domains and keys become known after enough valid usage, fuzzy
//! near-misses normalize onto known keys, and numbered keys
//! (`child_1`, `child_2`, ...) are recognized by pattern. Nothing learned
//! is ever removed.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use mnemo_config::CanonicalConfig;
use mnemo_core::{Error, Result};

/// Substrings that always reject a key, whatever the schema knows
const FORBIDDEN_KEY_SUBSTRINGS: &[&str] = &[
    "password",
    "passwd",
    "api_key",
    "apikey",
    "secret",
    "token",
    "ssn",
    "bank_account",
];

/// Value patterns that always reject: SSN-like and bank-account-like numbers
static SSN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("static regex"));
static ACCOUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{10,18}\b").expect("static regex"));

/// `<prefix>_<digits>` keys, e.g. `child_2`
static NUMBERED_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z][a-z0-9_]*?)_(\d+)$").expect("static regex"));

/// Outcome of validating a key against the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDecision {
    /// Key accepted as-is
    Accepted,
    /// Key accepted after fuzzy normalization onto a known key
    Normalized(String),
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
struct DomainEntry {
    keys: HashSet<String>,
    dynamic: bool,
}

/// Serializable schema state for the snapshot file
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SchemaSnapshot {
    domains: HashMap<String, DomainEntry>,
    domain_usage: HashMap<String, u32>,
    key_usage: HashMap<String, u32>,
}

struct SchemaState {
    domains: HashMap<String, DomainEntry>,
    /// Usage counters for unknown domains, keyed by domain name
    domain_usage: HashMap<String, u32>,
    /// Usage counters for unknown keys, keyed by "domain/key"
    key_usage: HashMap<String, u32>,
    dynamic_count: usize,
}

/// Adaptive schema with serialized mutation
///
/// All counter updates and auto-creation run under one mutex so concurrent
/// writers cannot double-create a domain.
pub struct AdaptiveSchema {
    config: CanonicalConfig,
    state: Mutex<SchemaState>,
}

impl AdaptiveSchema {
    pub fn new(config: CanonicalConfig) -> Self {
        let mut domains = HashMap::new();
        for domain in &config.core_domains {
            domains.insert(
                domain.clone(),
                DomainEntry {
                    keys: HashSet::new(),
                    dynamic: false,
                },
            );
        }

        Self {
            config,
            state: Mutex::new(SchemaState {
                domains,
                domain_usage: HashMap::new(),
                key_usage: HashMap::new(),
                dynamic_count: 0,
            }),
        }
    }

    /// Validate `(domain, key, value)` and learn from the attempt
    ///
    /// Returns the accepted key (possibly normalized). Rejections are
    /// `SchemaViolation`; breached hard caps are `LimitExceeded`.
    pub fn admit(&self, domain: &str, key: &str, value: &str) -> Result<KeyDecision> {
        let key = key.to_lowercase();
        let domain = domain.to_lowercase();

        self.check_forbidden(&key, value)?;

        if value.len() > self.config.max_fact_length {
            return Err(Error::SchemaViolation(format!(
                "value for '{}' exceeds {} characters",
                key, self.config.max_fact_length
            )));
        }

        let mut state = self.state.lock();

        if !state.domains.contains_key(&domain) {
            let count = state
                .domain_usage
                .entry(domain.clone())
                .and_modify(|c| *c += 1)
                .or_insert(1);

            if *count < self.config.creation_threshold {
                return Err(Error::SchemaViolation(format!(
                    "unknown domain '{}' below learning threshold ({}/{})",
                    domain, count, self.config.creation_threshold
                )));
            }

            if state.dynamic_count >= self.config.max_dynamic_domains {
                return Err(Error::LimitExceeded(format!(
                    "dynamic domain cap ({}) reached",
                    self.config.max_dynamic_domains
                )));
            }

            state.domains.insert(
                domain.clone(),
                DomainEntry {
                    keys: HashSet::new(),
                    dynamic: true,
                },
            );
            state.dynamic_count += 1;
            tracing::debug!(domain = %domain, "Auto-created dynamic domain");
        }

        // Known key: accepted directly
        if state.domains[&domain].keys.contains(&key) {
            return Ok(KeyDecision::Accepted);
        }

        // First key in a domain seeds the key set
        if state.domains[&domain].keys.is_empty() {
            if let Some(entry) = state.domains.get_mut(&domain) {
                entry.keys.insert(key.clone());
            }
            return Ok(KeyDecision::Accepted);
        }

        // Numbered variant of a known base key
        if let Some(caps) = NUMBERED_KEY.captures(&key) {
            let prefix = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            let known = {
                let entry = &state.domains[&domain];
                entry.keys.contains(&prefix)
                    || entry.keys.iter().any(|k| {
                        NUMBERED_KEY
                            .captures(k)
                            .and_then(|c| c.get(1))
                            .map(|m| m.as_str() == prefix)
                            .unwrap_or(false)
                    })
            };
            if known {
                if let Some(entry) = state.domains.get_mut(&domain) {
                    entry.keys.insert(key.clone());
                }
                return Ok(KeyDecision::Accepted);
            }
        }

        // Fuzzy normalization onto a known key
        let best = state.domains[&domain]
            .keys
            .iter()
            .map(|k| (k.clone(), normalized_similarity(&key, k)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((known_key, similarity)) = best {
            if similarity >= self.config.fuzzy_similarity_threshold {
                tracing::debug!(
                    key = %key,
                    normalized = %known_key,
                    similarity,
                    "Fuzzy-normalized key onto known key"
                );
                return Ok(KeyDecision::Normalized(known_key));
            }
        }

        // Unknown key: count usage and learn at the threshold
        let usage_key = format!("{}/{}", domain, key);
        let count = state
            .key_usage
            .entry(usage_key)
            .and_modify(|c| *c += 1)
            .or_insert(1);

        if *count >= self.config.key_learning_threshold {
            if let Some(entry) = state.domains.get_mut(&domain) {
                entry.keys.insert(key.clone());
            }
            tracing::debug!(domain = %domain, key = %key, "Auto-learned key");
            return Ok(KeyDecision::Accepted);
        }

        Err(Error::SchemaViolation(format!(
            "unknown key '{}' in domain '{}' below learning threshold ({}/{})",
            key, domain, count, self.config.key_learning_threshold
        )))
    }

    fn check_forbidden(&self, key: &str, value: &str) -> Result<()> {
        for forbidden in FORBIDDEN_KEY_SUBSTRINGS {
            if key.contains(forbidden) {
                return Err(Error::SchemaViolation(format!(
                    "key '{}' matches forbidden pattern '{}'",
                    key, forbidden
                )));
            }
        }
        if SSN_PATTERN.is_match(value) {
            return Err(Error::SchemaViolation(
                "value matches SSN-like pattern".to_string(),
            ));
        }
        if ACCOUNT_PATTERN.is_match(value) {
            return Err(Error::SchemaViolation(
                "value matches account-number-like pattern".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a domain is currently known (core or learned)
    pub fn knows_domain(&self, domain: &str) -> bool {
        self.state.lock().domains.contains_key(&domain.to_lowercase())
    }

    /// Whether a key is currently known within a domain
    pub fn knows_key(&self, domain: &str, key: &str) -> bool {
        self.state
            .lock()
            .domains
            .get(&domain.to_lowercase())
            .map(|d| d.keys.contains(&key.to_lowercase()))
            .unwrap_or(false)
    }

    /// All currently known domains
    pub fn domains(&self) -> Vec<String> {
        self.state.lock().domains.keys().cloned().collect()
    }

    /// Number of auto-created domains
    pub fn dynamic_domain_count(&self) -> usize {
        self.state.lock().dynamic_count
    }

    /// Serialize current state
    pub fn snapshot(&self) -> SchemaSnapshot {
        let state = self.state.lock();
        SchemaSnapshot {
            domains: state.domains.clone(),
            domain_usage: state.domain_usage.clone(),
            key_usage: state.key_usage.clone(),
        }
    }

    /// Write state to a snapshot file, atomically (write-temp-then-rename)
    pub fn persist(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| Error::Persistence(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Persistence(e.to_string()))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| Error::Persistence(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Restore learned state from a snapshot file
    ///
    /// Core domains from the config are always present; the snapshot can
    /// only add to them (schema growth is monotone).
    pub fn restore(&self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| Error::Persistence(e.to_string()))?;
        let snapshot: SchemaSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| Error::Persistence(e.to_string()))?;

        let mut state = self.state.lock();
        for (domain, entry) in snapshot.domains {
            match state.domains.get_mut(&domain) {
                Some(existing) => existing.keys.extend(entry.keys),
                None => {
                    if entry.dynamic {
                        state.dynamic_count += 1;
                    }
                    state.domains.insert(domain, entry);
                },
            }
        }
        state.domain_usage.extend(snapshot.domain_usage);
        state.key_usage.extend(snapshot.key_usage);
        Ok(())
    }
}

/// Normalized edit-distance similarity in [0, 1]
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (prev[j] + cost)
                .min(prev[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AdaptiveSchema {
        AdaptiveSchema::new(CanonicalConfig::default())
    }

    #[test]
    fn test_core_domain_first_key_accepted() {
        let schema = schema();
        let decision = schema.admit("identity", "name", "Morten").unwrap();
        assert_eq!(decision, KeyDecision::Accepted);
        assert!(schema.knows_key("identity", "name"));
    }

    #[test]
    fn test_forbidden_keys_always_rejected() {
        let schema = schema();
        for key in ["password", "api_key", "bank_account_number", "ssn"] {
            let result = schema.admit("identity", key, "value");
            assert!(
                matches!(result, Err(Error::SchemaViolation(_))),
                "key '{}' should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_ssn_like_value_rejected() {
        let schema = schema();
        let result = schema.admit("identity", "note", "my number is 123-45-6789");
        assert!(matches!(result, Err(Error::SchemaViolation(_))));
    }

    #[test]
    fn test_overlong_value_rejected() {
        let schema = schema();
        let long = "x".repeat(501);
        let result = schema.admit("identity", "bio", &long);
        assert!(matches!(result, Err(Error::SchemaViolation(_))));
    }

    #[test]
    fn test_unknown_key_learns_at_threshold() {
        let schema = schema();
        // Seed the domain with a first key so later keys are "unknown"
        schema.admit("identity", "name", "Morten").unwrap();

        assert!(schema.admit("identity", "research_area", "cosmology").is_err());
        assert!(schema.admit("identity", "research_area", "cosmology").is_err());
        // Third sighting crosses the threshold
        assert!(schema.admit("identity", "research_area", "cosmology").is_ok());
        // And the key persists
        assert!(schema.knows_key("identity", "research_area"));
        assert!(schema.admit("identity", "research_area", "cosmology").is_ok());
    }

    #[test]
    fn test_unknown_domain_learns_at_threshold() {
        let schema = schema();
        assert!(schema.admit("astronomy", "telescope", "refractor").is_err());
        assert!(schema.admit("astronomy", "telescope", "refractor").is_err());
        assert!(schema.admit("astronomy", "telescope", "refractor").is_ok());
        assert!(schema.knows_domain("astronomy"));
        assert_eq!(schema.dynamic_domain_count(), 1);
    }

    #[test]
    fn test_dynamic_domain_cap() {
        let mut config = CanonicalConfig::default();
        config.max_dynamic_domains = 1;
        config.creation_threshold = 1;
        let schema = AdaptiveSchema::new(config);

        assert!(schema.admit("astronomy", "telescope", "x").is_ok());
        let result = schema.admit("geology", "rock", "basalt");
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_fuzzy_normalization() {
        let schema = schema();
        schema.admit("identity", "favorite_color", "blue").unwrap();

        // One edit away: similarity above 0.85 -> normalized
        let decision = schema.admit("identity", "favorit_color", "blue").unwrap();
        assert_eq!(decision, KeyDecision::Normalized("favorite_color".to_string()));
    }

    #[test]
    fn test_fuzzy_below_threshold_takes_new_key_path() {
        let schema = schema();
        schema.admit("identity", "name", "Morten").unwrap();

        // 'age' is far from 'name': falls through to the learning counter
        let result = schema.admit("identity", "age", "44");
        assert!(matches!(result, Err(Error::SchemaViolation(_))));
    }

    #[test]
    fn test_numbered_keys_recognized() {
        let schema = schema();
        schema.admit("family", "child_1", "Anna").unwrap();
        // Numbered siblings of a seen numbered key are accepted directly
        assert!(schema.admit("family", "child_2", "Ben").is_ok());
        assert!(schema.admit("family", "child_3", "Cleo").is_ok());
    }

    #[test]
    fn test_similarity_metric() {
        assert_eq!(normalized_similarity("name", "name"), 1.0);
        assert!(normalized_similarity("favorite_color", "favorit_color") > 0.85);
        assert!(normalized_similarity("name", "age") <= 0.5);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");

        let schema = schema();
        schema.admit("identity", "name", "Morten").unwrap();
        for _ in 0..3 {
            let _ = schema.admit("astronomy", "telescope", "refractor");
        }
        schema.persist(&path).unwrap();

        let restored = AdaptiveSchema::new(CanonicalConfig::default());
        restored.restore(&path).unwrap();
        assert!(restored.knows_key("identity", "name"));
        assert!(restored.knows_domain("astronomy"));
        assert_eq!(restored.dynamic_domain_count(), 1);
    }
}
