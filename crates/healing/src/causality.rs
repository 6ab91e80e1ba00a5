//! Fact dependency tracking
//!
//! `A depends on B` means invalidating B must at least cast doubt on A.
//! On deprecation the graph walks dependents transitively, marking them
//! SUSPECT (not DEPRECATED: they may be independently reinforced) and
//! recording the cause.

use dashmap::DashMap;
use std::collections::HashSet;
use uuid::Uuid;

/// Directed dependency graph among facts
#[derive(Default)]
pub struct CausalityGraph {
    /// dependency -> facts that depend on it
    dependents: DashMap<Uuid, Vec<Uuid>>,
    /// dependent -> the invalidated fact that cast doubt on it
    causes: DashMap<Uuid, Uuid>,
}

impl CausalityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` depends on `dependency`
    pub fn add_dependency(&self, dependent: Uuid, dependency: Uuid) {
        let mut entry = self.dependents.entry(dependency).or_default();
        if !entry.contains(&dependent) {
            entry.push(dependent);
        }
    }

    /// Facts directly depending on `fact`
    pub fn dependents_of(&self, fact: Uuid) -> Vec<Uuid> {
        self.dependents.get(&fact).map(|e| e.clone()).unwrap_or_default()
    }

    /// Walk all transitive dependents of an invalidated fact
    ///
    /// Returns the affected ids; the caller marks them SUSPECT. The cause
    /// recorded for each is the originally invalidated fact.
    pub fn propagate_invalidation(&self, invalidated: Uuid) -> Vec<Uuid> {
        let mut affected = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::new();
        visited.insert(invalidated);
        let mut stack = vec![invalidated];

        while let Some(current) = stack.pop() {
            for dependent in self.dependents_of(current) {
                if visited.insert(dependent) {
                    self.causes.insert(dependent, invalidated);
                    affected.push(dependent);
                    stack.push(dependent);
                }
            }
        }

        affected
    }

    /// The invalidation that cast doubt on `fact`, if any
    pub fn cause_of(&self, fact: Uuid) -> Option<Uuid> {
        self.causes.get(&fact).map(|e| *e)
    }

    /// Whether any dependent of `fact` is still awaiting invalidation
    /// review (used to gate purging deprecated facts)
    pub fn has_dependents(&self, fact: Uuid) -> bool {
        self.dependents
            .get(&fact)
            .map(|e| !e.is_empty())
            .unwrap_or(false)
    }
}
