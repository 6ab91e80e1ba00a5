//! Dynamic domain engine
//!
//! Classifies turn text into a domain by combining five normalized
//! signals with fixed weights:
//!
//! | signal                         | weight |
//! |--------------------------------|--------|
//! | semantic similarity to exemplars | 0.40 |
//! | whole-word keyword hits          | 0.15 |
//! | learned domain transitions       | 0.20 |
//! | rolling prior over recent turns  | 0.10 |
//! | token entropy (disambiguator)    | 0.15 |
//!
//! The entropy signal contributes 0 for texts under the token minimum and
//! otherwise boosts the leading candidate. Exemplar embeddings are cached
//! in an LRU keyed by the exemplar set (not the domain id), so profile
//! edits invalidate naturally.

pub mod engine;
pub mod exemplar_cache;
pub mod profiles;

pub use engine::DomainEngine;
pub use exemplar_cache::ExemplarCache;
pub use profiles::DomainProfile;
