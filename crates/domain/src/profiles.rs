//! Domain profiles
//!
//! A profile carries the exemplar phrases and keywords that anchor a
//! domain. Keyword matching is whole-word (`\bkw\b`), never substring.

use regex::Regex;

/// One classifiable domain
#[derive(Debug, Clone)]
pub struct DomainProfile {
    pub name: String,
    /// Short phrases typical of the domain, embedded for the semantic
    /// signal
    pub exemplars: Vec<String>,
    pub keywords: Vec<String>,
    compiled: Vec<Regex>,
}

impl DomainProfile {
    pub fn new(
        name: impl Into<String>,
        exemplars: Vec<&str>,
        keywords: Vec<&str>,
    ) -> Self {
        let keywords: Vec<String> = keywords.into_iter().map(String::from).collect();
        let compiled = keywords
            .iter()
            .filter_map(|kw| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).ok())
            .collect();

        Self {
            name: name.into(),
            exemplars: exemplars.into_iter().map(String::from).collect(),
            keywords,
            compiled,
        }
    }

    /// Count whole-word keyword hits in `text`
    pub fn keyword_hits(&self, text: &str) -> usize {
        self.compiled.iter().filter(|re| re.is_match(text)).count()
    }

    /// Keyword signal normalized to [0, 1]; two hits saturate
    pub fn keyword_score(&self, text: &str) -> f64 {
        (self.keyword_hits(text) as f64 / 2.0).min(1.0)
    }

    /// Built-in profiles for the core domains
    pub fn core_profiles() -> Vec<DomainProfile> {
        vec![
            DomainProfile::new(
                "identity",
                vec![
                    "my name is",
                    "what is my name",
                    "i am called",
                    "where do i live",
                    "how old am i",
                ],
                vec!["name", "called", "age", "live", "born", "birthday"],
            ),
            DomainProfile::new(
                "family",
                vec![
                    "my children are",
                    "who are my children",
                    "my wife and kids",
                    "my family members",
                ],
                vec![
                    "family", "children", "child", "kids", "wife", "husband", "partner",
                    "mother", "father", "son", "daughter", "sister", "brother",
                ],
            ),
            DomainProfile::new(
                "preferences",
                vec![
                    "my favorite color is",
                    "i really like",
                    "i prefer tea over coffee",
                    "what do i enjoy",
                ],
                vec!["favorite", "like", "prefer", "love", "enjoy", "hate"],
            ),
            DomainProfile::new(
                "professional",
                vec![
                    "i work as an engineer",
                    "my job title",
                    "my research area",
                    "where do i work",
                ],
                vec![
                    "job", "work", "career", "research", "profession", "company",
                    "colleague", "office",
                ],
            ),
            DomainProfile::new(
                "assistant",
                vec![
                    "remind me tomorrow",
                    "can you help me with",
                    "schedule a meeting",
                ],
                vec!["remind", "reminder", "help", "schedule", "task", "assistant"],
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_matching() {
        let profile = DomainProfile::new("identity", vec![], vec!["name"]);
        assert_eq!(profile.keyword_hits("what is my name"), 1);
        // Substring hits do not count
        assert_eq!(profile.keyword_hits("unnamed variable"), 0);
        assert_eq!(profile.keyword_hits("the names of things"), 0);
    }

    #[test]
    fn test_case_insensitive() {
        let profile = DomainProfile::new("identity", vec![], vec!["name"]);
        assert_eq!(profile.keyword_hits("My NAME is Morten"), 1);
    }

    #[test]
    fn test_keyword_score_saturates() {
        let profile = DomainProfile::new("family", vec![], vec!["children", "wife", "son"]);
        assert_eq!(profile.keyword_score("text with none"), 0.0);
        assert_eq!(profile.keyword_score("my children"), 0.5);
        assert_eq!(profile.keyword_score("my wife and children and son"), 1.0);
    }

    #[test]
    fn test_core_profiles_present() {
        let profiles = DomainProfile::core_profiles();
        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"identity"));
        assert!(names.contains(&"family"));
        assert!(names.contains(&"preferences"));
        assert!(names.contains(&"professional"));
        assert!(names.contains(&"assistant"));
    }
}
