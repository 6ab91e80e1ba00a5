//! User assertion extraction
//!
//! Pattern-matches user statements into `(domain, key, value)` assertions
//! that the router registers as CHAT_USER observations.

use once_cell::sync::Lazy;
use regex::Regex;

/// One extracted user assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAssertion {
    pub domain: String,
    pub key: String,
    pub value: String,
}

struct AssertionPattern {
    regex: Regex,
    domain: &'static str,
    /// Fixed key, or None when the key comes from capture group 1
    key: Option<&'static str>,
}

static PATTERNS: Lazy<Vec<AssertionPattern>> = Lazy::new(|| {
    vec![
        // Proper-noun captures stay case-sensitive so trailing lowercase
        // words ("... and I live ...") never leak into the value
        AssertionPattern {
            regex: Regex::new(r"\b[Mm]y name is ([A-Z][\w-]+(?: [A-Z][\w-]+)?)")
                .expect("static regex"),
            domain: "identity",
            key: Some("name"),
        },
        AssertionPattern {
            regex: Regex::new(r"\b[Ii] am called ([A-Z][\w-]+)").expect("static regex"),
            domain: "identity",
            key: Some("name"),
        },
        AssertionPattern {
            regex: Regex::new(r"\b[Ii] live in ([A-Z][\w-]+(?: [A-Z][\w-]+)?)")
                .expect("static regex"),
            domain: "identity",
            key: Some("location"),
        },
        AssertionPattern {
            regex: Regex::new(r"(?i)\bi am (\d{1,3}) years old\b").expect("static regex"),
            domain: "identity",
            key: Some("age"),
        },
        AssertionPattern {
            regex: Regex::new(r"(?i)\bmy favorite (\w+) is ([\w ]+?)(?:[.!,]|$)").expect("static regex"),
            domain: "preferences",
            key: None,
        },
        AssertionPattern {
            regex: Regex::new(r"(?i)\bi work as (?:an? )?([\w ]+?)(?:[.!,]|$)").expect("static regex"),
            domain: "professional",
            key: Some("occupation"),
        },
        AssertionPattern {
            regex: Regex::new(r"(?i)\bi have (\d{1,2}) (?:kids|children)\b").expect("static regex"),
            domain: "family",
            key: Some("child_count"),
        },
    ]
});

/// Extract all recognized assertions from a user message
pub fn extract_assertions(message: &str) -> Vec<ExtractedAssertion> {
    let mut assertions = Vec::new();

    for pattern in PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(message) {
            let assertion = match pattern.key {
                Some(key) => {
                    let Some(value) = caps.get(1) else { continue };
                    ExtractedAssertion {
                        domain: pattern.domain.to_string(),
                        key: key.to_string(),
                        value: value.as_str().trim().to_string(),
                    }
                },
                None => {
                    let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
                        continue;
                    };
                    ExtractedAssertion {
                        domain: pattern.domain.to_string(),
                        key: format!("favorite_{}", key.as_str().to_lowercase()),
                        value: value.as_str().trim().to_string(),
                    }
                },
            };
            if !assertions.contains(&assertion) {
                assertions.push(assertion);
            }
        }
    }

    assertions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_assertion() {
        let assertions = extract_assertions("Hi, my name is Morten Rand.");
        assert_eq!(assertions.len(), 1);
        assert_eq!(assertions[0].domain, "identity");
        assert_eq!(assertions[0].key, "name");
        assert_eq!(assertions[0].value, "Morten Rand");
    }

    #[test]
    fn test_favorite_assertion() {
        let assertions = extract_assertions("my favorite color is deep blue");
        assert_eq!(assertions.len(), 1);
        assert_eq!(assertions[0].domain, "preferences");
        assert_eq!(assertions[0].key, "favorite_color");
        assert_eq!(assertions[0].value, "deep blue");
    }

    #[test]
    fn test_occupation_assertion() {
        let assertions = extract_assertions("I work as an astrophysicist.");
        assert_eq!(assertions.len(), 1);
        assert_eq!(assertions[0].key, "occupation");
        assert_eq!(assertions[0].value, "astrophysicist");
    }

    #[test]
    fn test_multiple_assertions() {
        let assertions =
            extract_assertions("My name is Morten and I live in Oslo. I have 3 children.");
        assert_eq!(assertions.len(), 3);
        let keys: Vec<&str> = assertions.iter().map(|a| a.key.as_str()).collect();
        assert!(keys.contains(&"name"));
        assert!(keys.contains(&"location"));
        assert!(keys.contains(&"child_count"));
    }

    #[test]
    fn test_no_assertions_in_questions() {
        assert!(extract_assertions("What is my name?").is_empty());
        assert!(extract_assertions("Hello there!").is_empty());
    }
}
