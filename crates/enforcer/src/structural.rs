//! Structural contradiction fast path (stage A)
//!
//! Settles the cheap cases without an LLM round-trip: uncertainty against
//! a durable fact, number mismatch, negated fact value, and named-entity
//! mismatch for the same key. Anything else is inconclusive and goes to
//! the probe.

use once_cell::sync::Lazy;
use regex::Regex;

use mnemo_core::{Authority, Fact, FactStatus};

static UNCERTAINTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(i don'?t know|i do not know|not sure|no idea|can'?t recall|cannot recall|unsure|don'?t have that information)\b",
    )
    .expect("static regex")
});

static NEGATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(not|never|no longer|isn'?t|aren'?t|wasn'?t|weren'?t)\b").expect("static regex")
});

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static regex"));

/// Stage A outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralVerdict {
    /// Definite contradiction with a human-readable reason
    Contradiction(String),
    /// Draft agrees with the fact
    Consistent,
    /// The fast path cannot settle this pair
    Inconclusive,
}

/// Check one draft against one fact
pub fn structural_check(draft: &str, fact: &Fact) -> StructuralVerdict {
    let draft_lower = draft.to_lowercase();
    let value_lower = fact.value.to_lowercase();

    // Uncertainty counts as contradiction only against durable memory
    if UNCERTAINTY.is_match(draft) {
        if fact.authority == Authority::LongTerm || fact.status == FactStatus::Stable {
            return StructuralVerdict::Contradiction(format!(
                "draft expresses uncertainty but '{}' is durably recorded as '{}'",
                fact.key, fact.value
            ));
        }
        return StructuralVerdict::Consistent;
    }

    if draft_lower.contains(&value_lower) {
        // Value present but negated is a contradiction
        if let Some(position) = draft_lower.find(&value_lower) {
            let preceding = &draft_lower[..position];
            let clause_start = preceding.rfind(['.', ';', '?', '!']).map(|i| i + 1).unwrap_or(0);
            if NEGATION.is_match(&preceding[clause_start..]) {
                return StructuralVerdict::Contradiction(format!(
                    "draft negates the recorded value '{}'",
                    fact.value
                ));
            }
        }
        return StructuralVerdict::Consistent;
    }

    // Number mismatch for the same key
    let fact_numbers: Vec<&str> = NUMBER.find_iter(&fact.value).map(|m| m.as_str()).collect();
    if !fact_numbers.is_empty() {
        let draft_numbers: Vec<&str> = NUMBER.find_iter(draft).map(|m| m.as_str()).collect();
        if !draft_numbers.is_empty() && fact_numbers.iter().all(|n| !draft_numbers.contains(n)) {
            return StructuralVerdict::Contradiction(format!(
                "draft states {:?} but '{}' is recorded as '{}'",
                draft_numbers, fact.key, fact.value
            ));
        }
    }

    // Named-entity mismatch: the draft talks about this key but names a
    // different proper noun
    if mentions_key(&draft_lower, &fact.key) && starts_uppercase(&fact.value) {
        let draft_entities = proper_nouns(draft);
        if !draft_entities.is_empty() {
            return StructuralVerdict::Contradiction(format!(
                "draft names {:?} for '{}' but memory says '{}'",
                draft_entities, fact.key, fact.value
            ));
        }
    }

    StructuralVerdict::Inconclusive
}

/// Whether the draft references the fact's key concept
fn mentions_key(draft_lower: &str, key: &str) -> bool {
    key.split('_')
        .filter(|part| part.len() > 2 && part.parse::<u32>().is_err())
        .any(|part| draft_lower.contains(part))
}

fn starts_uppercase(value: &str) -> bool {
    value.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// Capitalized tokens past the first word, excluding "I"
fn proper_nouns(text: &str) -> Vec<String> {
    text.split_whitespace()
        .skip(1)
        .filter(|word| {
            let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
            trimmed.len() > 1
                && trimmed != "I"
                && trimmed.chars().next().map(char::is_uppercase).unwrap_or(false)
        })
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric()).to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(key: &str, value: &str) -> Fact {
        Fact::new("identity", key, value)
    }

    fn durable_fact(key: &str, value: &str) -> Fact {
        Fact::new("identity", key, value).with_authority(Authority::LongTerm)
    }

    #[test]
    fn test_uncertainty_against_durable_fact() {
        let fact = durable_fact("name", "Morten");
        let verdict = structural_check("I don't know", &fact);
        assert!(matches!(verdict, StructuralVerdict::Contradiction(_)));
    }

    #[test]
    fn test_uncertainty_against_weak_fact_stands() {
        let fact = fact("name", "Morten");
        let verdict = structural_check("I'm not sure about that", &fact);
        assert_eq!(verdict, StructuralVerdict::Consistent);
    }

    #[test]
    fn test_matching_value_is_consistent() {
        let fact = durable_fact("name", "Morten");
        let verdict = structural_check("Your name is Morten.", &fact);
        assert_eq!(verdict, StructuralVerdict::Consistent);
    }

    #[test]
    fn test_negated_value_contradicts() {
        let fact = durable_fact("name", "Morten");
        let verdict = structural_check("Your name is not Morten.", &fact);
        assert!(matches!(verdict, StructuralVerdict::Contradiction(_)));
    }

    #[test]
    fn test_number_mismatch() {
        let fact = fact("age", "44");
        let verdict = structural_check("You are 29 years old.", &fact);
        assert!(matches!(verdict, StructuralVerdict::Contradiction(_)));
    }

    #[test]
    fn test_number_agreement() {
        let fact = fact("age", "44");
        let verdict = structural_check("You are 44 years old.", &fact);
        assert_eq!(verdict, StructuralVerdict::Consistent);
    }

    #[test]
    fn test_entity_mismatch_same_key() {
        let fact = durable_fact("name", "Morten");
        let verdict = structural_check("Your name is Morpheus.", &fact);
        assert!(matches!(verdict, StructuralVerdict::Contradiction(_)));
    }

    #[test]
    fn test_unrelated_draft_inconclusive() {
        let fact = fact("location", "Oslo");
        let verdict = structural_check("The weather is lovely today.", &fact);
        assert_eq!(verdict, StructuralVerdict::Inconclusive);
    }
}
