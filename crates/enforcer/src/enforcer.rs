//! Override/trust decision

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::BTreeMap;

use mnemo_config::EnforcerConfig;
use mnemo_core::Fact;
use mnemo_llm::ContradictionProbe;

use crate::gate::should_check_facts;
use crate::structural::{structural_check, StructuralVerdict};

static NUMBERED_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)_(\d+)$").expect("static regex"));

/// The enforcer's verdict for one turn
#[derive(Debug, Clone)]
pub enum Decision {
    /// Replace the draft with a memory-grounded reply
    Override {
        reply: String,
        reason: String,
        /// `(domain, key)` of each fact that grounded the reply
        grounded_keys: Vec<(String, String)>,
    },
    /// Return the draft unchanged
    TrustLlm,
}

impl Decision {
    pub fn is_override(&self) -> bool {
        matches!(self, Decision::Override { .. })
    }
}

/// Decision plus bookkeeping for the routing log
#[derive(Debug, Clone)]
pub struct EnforcementOutcome {
    pub decision: Decision,
    pub facts_checked: usize,
    /// Stage B failures that fell back to stage A
    pub probe_failures: usize,
}

/// Adaptive memory enforcer
pub struct MemoryEnforcer {
    config: RwLock<EnforcerConfig>,
    probe: Option<ContradictionProbe>,
}

impl MemoryEnforcer {
    pub fn new(config: EnforcerConfig, probe: Option<ContradictionProbe>) -> Self {
        Self {
            config: RwLock::new(config),
            probe,
        }
    }

    /// Publish a new default strictness (optimizer sync-point)
    pub fn set_default_strictness(&self, strictness: f64) {
        self.config.write().default_strictness = strictness.clamp(0.0, 1.0);
    }

    /// Publish a new strictness for one domain (optimizer sync-point)
    pub fn set_strictness(&self, domain: &str, strictness: f64) {
        self.config
            .write()
            .domain_strictness
            .insert(domain.to_string(), strictness.clamp(0.0, 1.0));
    }

    pub fn strictness_for(&self, domain: &str) -> f64 {
        let config = self.config.read();
        config
            .domain_strictness
            .get(domain)
            .copied()
            .unwrap_or(config.default_strictness)
    }

    /// Decide between override and trust for one turn
    pub async fn enforce(
        &self,
        user_message: &str,
        draft: &str,
        facts: &[Fact],
    ) -> EnforcementOutcome {
        if facts.is_empty() || !should_check_facts(user_message, draft) {
            return EnforcementOutcome {
                decision: Decision::TrustLlm,
                facts_checked: 0,
                probe_failures: 0,
            };
        }

        let mut probe_failures = 0;

        // Numbered-key groups first: a draft that names only part of an
        // enumeration is overridden with the full list
        if let Some(decision) = self.check_numbered_groups(user_message, draft, facts) {
            return EnforcementOutcome {
                decision,
                facts_checked: facts.len(),
                probe_failures,
            };
        }

        let mut contradicted: Vec<(&Fact, String)> = Vec::new();

        for fact in facts {
            let verdict = match structural_check(draft, fact) {
                StructuralVerdict::Contradiction(reason) => Some(reason),
                StructuralVerdict::Consistent => None,
                StructuralVerdict::Inconclusive => match &self.probe {
                    Some(probe) => {
                        match probe.check(draft, &fact.key, &fact.value).await {
                            Ok(verdict) if verdict.contradicts => Some(verdict.reason),
                            Ok(_) => None,
                            Err(e) => {
                                // Stage B unavailable: stage A outcome stands
                                tracing::warn!(key = %fact.key, "Contradiction probe failed: {}", e);
                                probe_failures += 1;
                                None
                            },
                        }
                    },
                    None => None,
                },
            };

            if let Some(reason) = verdict {
                if self.passes_strictness(fact) {
                    contradicted.push((fact, reason));
                }
            }
        }

        if contradicted.is_empty() {
            return EnforcementOutcome {
                decision: Decision::TrustLlm,
                facts_checked: facts.len(),
                probe_failures,
            };
        }

        // Strongest fact leads the synthesized reply
        contradicted.sort_by(|a, b| {
            b.0.confidence
                .partial_cmp(&a.0.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let reply = contradicted
            .iter()
            .map(|(fact, _)| synthesize_sentence(fact))
            .collect::<Vec<_>>()
            .join(" ");
        let reason = contradicted
            .iter()
            .map(|(_, reason)| reason.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let grounded_keys = contradicted
            .iter()
            .map(|(fact, _)| (fact.domain.clone(), fact.key.clone()))
            .collect();

        EnforcementOutcome {
            decision: Decision::Override {
                reply,
                reason,
                grounded_keys,
            },
            facts_checked: facts.len(),
            probe_failures,
        }
    }

    /// Full strictness overrides on any contradiction; below that the
    /// fact must clear the confidence threshold
    fn passes_strictness(&self, fact: &Fact) -> bool {
        let strictness = self.strictness_for(&fact.domain);
        if strictness >= 1.0 {
            return true;
        }
        let config = self.config.read();
        fact.confidence >= config.override_confidence_threshold
    }

    /// Incomplete enumeration check over numbered keys
    fn check_numbered_groups(
        &self,
        user_message: &str,
        draft: &str,
        facts: &[Fact],
    ) -> Option<Decision> {
        let message_lower = user_message.to_lowercase();
        let draft_lower = draft.to_lowercase();

        // prefix -> (index, fact) sorted by index
        let mut groups: BTreeMap<(String, String), BTreeMap<u32, &Fact>> = BTreeMap::new();
        for fact in facts {
            if let Some(caps) = NUMBERED_KEY.captures(&fact.key) {
                let Some(prefix) = caps.get(1).map(|m| m.as_str().to_string()) else {
                    continue;
                };
                let Some(index) = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) else {
                    continue;
                };
                groups
                    .entry((fact.domain.clone(), prefix))
                    .or_default()
                    .insert(index, fact);
            }
        }

        for ((domain, prefix), group) in groups {
            if group.len() < 2 {
                continue;
            }
            let plural = pluralize(&prefix);
            let referenced = message_lower.contains(&prefix)
                || message_lower.contains(&plural)
                || draft_lower.contains(&prefix)
                || draft_lower.contains(&plural);
            if !referenced {
                continue;
            }

            let strongest = group
                .values()
                .map(|f| f.confidence)
                .fold(0.0f64, f64::max);
            let strictness = self.strictness_for(&domain);
            if strictness < 1.0
                && strongest < self.config.read().override_confidence_threshold
            {
                continue;
            }

            let missing = group
                .values()
                .any(|fact| !draft_lower.contains(&fact.value.to_lowercase()));
            if !missing {
                continue;
            }

            let values: Vec<&str> = group.values().map(|f| f.value.as_str()).collect();
            let reply = format!("Your {} are {}.", plural, join_list(&values));
            let grounded_keys = group
                .values()
                .map(|f| (f.domain.clone(), f.key.clone()))
                .collect();

            return Some(Decision::Override {
                reply,
                reason: format!(
                    "draft names only part of the recorded {} ({} entries)",
                    plural,
                    group.len()
                ),
                grounded_keys,
            });
        }

        None
    }
}

/// One grounded sentence for a single fact
fn synthesize_sentence(fact: &Fact) -> String {
    let key = NUMBERED_KEY
        .captures(&fact.key)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(&fact.key)
        .replace('_', " ");
    format!("Your {} is {}.", key, fact.value)
}

fn pluralize(word: &str) -> String {
    match word {
        "child" => "children".to_string(),
        "person" => "people".to_string(),
        _ if word.ends_with('s') => word.to_string(),
        _ => format!("{}s", word),
    }
}

fn join_list(values: &[&str]) -> String {
    match values {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{} and {}", first, second),
        _ => {
            let (last, rest) = values.split_last().expect("len > 2");
            format!("{}, and {}", rest.join(", "), last)
        },
    }
}
