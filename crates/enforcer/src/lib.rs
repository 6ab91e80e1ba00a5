//! Adaptive memory enforcer
//!
//! The decisive per-turn component. Given the user message, the model's
//! draft reply and the retrieved canonical facts, it decides between
//! exactly two outcomes:
//!
//! - OVERRIDE: the draft disagrees with canonical memory; reply with a
//!   synthesized answer grounded in the contradicting fact(s)
//! - TRUST_LLM: the draft stands unchanged
//!
//! There is deliberately no augment path. Contradiction checking is
//! two-stage: a structural fast path (numbers, negation, named entities,
//! uncertainty against durable facts) and an LLM probe for anything the
//! fast path cannot settle. Probe failure falls back to the structural
//! outcome.

pub mod enforcer;
pub mod extract;
pub mod gate;
pub mod structural;

pub use enforcer::{Decision, EnforcementOutcome, MemoryEnforcer};
pub use extract::{extract_assertions, ExtractedAssertion};
pub use gate::should_check_facts;
pub use structural::{structural_check, StructuralVerdict};
