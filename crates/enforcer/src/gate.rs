//! Fact-check gate
//!
//! Cheap rule-based filter deciding whether a turn is worth checking at
//! all. Identity questions and factual-claim shapes pass; pure small talk
//! does not.

use once_cell::sync::Lazy;
use regex::Regex;

/// who/what/where/when/which/how-many questions
static QUESTION_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(who|what|where|when|which|how many|how old)\b").expect("static regex")
});

/// "X is Y" style claims, in the user message or the draft
static CLAIM_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(my|your|his|her|their)\s+\w+(?:\s+\w+)?\s+(is|are|was|were)\b")
        .expect("static regex")
});

/// Small-talk openers that never need a fact check on their own
static SMALL_TALK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(hello|hi|hey|good (morning|afternoon|evening)|thanks|thank you|bye|goodbye|how are you)[\s!,.?]*$")
        .expect("static regex")
});

/// Whether this turn should run the contradiction check
pub fn should_check_facts(user_message: &str, draft: &str) -> bool {
    if SMALL_TALK.is_match(user_message) {
        return false;
    }

    QUESTION_SHAPE.is_match(user_message)
        || CLAIM_SHAPE.is_match(user_message)
        || CLAIM_SHAPE.is_match(draft)
}
