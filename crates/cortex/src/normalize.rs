//! Pattern normalization
//!
//! Lowercase, collapse whitespace, and stem-like suffix stripping so
//! trivially different surface forms fold onto one pattern.

/// Normalize one pattern string
pub fn normalize_pattern(pattern: &str) -> String {
    pattern
        .to_lowercase()
        .split_whitespace()
        .map(strip_suffix)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip common inflection suffixes from a token (stem-like, not a real
/// stemmer)
fn strip_suffix(token: &str) -> String {
    for suffix in ["ing", "edly", "ed", "es", "s"] {
        if let Some(stem) = token.strip_suffix(suffix) {
            // Avoid over-stripping short tokens ("is" -> "i")
            if stem.len() >= 3 {
                return stem.to_string();
            }
        }
    }
    token.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(normalize_pattern("  Compare  ALTERNATIVES "), "compare alternativ");
    }

    #[test]
    fn test_suffix_stripping() {
        assert_eq!(normalize_pattern("comparing"), "compar");
        assert_eq!(normalize_pattern("compared"), "compar");
        assert_eq!(normalize_pattern("compares"), "compar");
    }

    #[test]
    fn test_short_tokens_untouched() {
        assert_eq!(normalize_pattern("is"), "is");
        assert_eq!(normalize_pattern("was"), "was");
    }

    #[test]
    fn test_variants_collapse() {
        let a = normalize_pattern("weighing tradeoffs");
        let b = normalize_pattern("Weigh Tradeoff");
        assert_eq!(a, b);
    }
}
