// Dependency Graph (§4.3): two mirrored maps, owned exclusively by the
// updates worker. No synchronization beyond single-writer discipline is
// needed because nothing else ever touches this type.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::kind::KindId;
use crate::property::EOptionP;
use crate::result::{Continuation, Hint};

pub type DependerKey<E> = (E, KindId);

struct DependerEntry<E: Entity> {
    continuation: Continuation<E>,
    hint: Hint,
}

/// Owned exclusively by the updates worker. `dependees[(e,k)]` is the set
/// of `EOptionP`s the computation for `(e,k)` last observed; `dependers`
/// maps a dependee key to every depender currently suspended on it.
/// Invariant 5 (every edge has a reciprocal) is maintained by only ever
/// mutating both maps together, in `set_dependencies` and `clear_depender`.
pub struct DependencyGraph<E: Entity> {
    dependees: HashMap<DependerKey<E>, Vec<EOptionP<E>>>,
    dependers: HashMap<DependerKey<E>, HashMap<DependerKey<E>, DependerEntry<E>>>,
}

impl<E: Entity> DependencyGraph<E> {
    pub fn new() -> Self {
        DependencyGraph { dependees: HashMap::new(), dependers: HashMap::new() }
    }

    pub fn dependees_of(&self, depender: &DependerKey<E>) -> Option<&[EOptionP<E>]> {
        self.dependees.get(depender).map(|v| v.as_slice())
    }

    /// Replaces `depender`'s dependency set wholesale: tears down the old
    /// reciprocal edges (if any) and installs the new ones both ways.
    pub fn set_dependencies(
        &mut self,
        depender: DependerKey<E>,
        dependees: Vec<EOptionP<E>>,
        continuation: Continuation<E>,
        hint: Hint,
    ) {
        self.clear_depender(&depender);
        for dependee in &dependees {
            let dependee_key = (dependee.entity().clone(), dependee.kind());
            self.dependers.entry(dependee_key).or_default().insert(
                depender.clone(),
                DependerEntry { continuation: continuation.clone(), hint },
            );
        }
        self.dependees.insert(depender, dependees);
    }

    /// Tears down `depender`'s outgoing edges and their reciprocals,
    /// without touching anything that depends on `depender` itself. Used
    /// both when a depender finalizes (Invariant 4: final results carry no
    /// dependencies) and right before installing a fresh dependency set.
    pub fn clear_depender(&mut self, depender: &DependerKey<E>) {
        if let Some(old_dependees) = self.dependees.remove(depender) {
            for dependee in old_dependees {
                let dependee_key = (dependee.entity().clone(), dependee.kind());
                if let Some(entries) = self.dependers.get_mut(&dependee_key) {
                    entries.remove(depender);
                    if entries.is_empty() {
                        self.dependers.remove(&dependee_key);
                    }
                }
            }
        }
    }

    /// Every `(depender, continuation, hint)` currently suspended on
    /// `dependee`, removed from the graph as part of being returned — the
    /// caller is about to resume each of them, which will either finalize
    /// (installing no dependencies) or install a fresh set.
    pub fn take_dependers_of(&mut self, dependee: &DependerKey<E>) -> Vec<(DependerKey<E>, Continuation<E>, Hint)> {
        let Some(entries) = self.dependers.remove(dependee) else { return Vec::new() };
        entries
            .into_iter()
            .map(|(depender, entry)| {
                self.dependees.remove(&depender);
                (depender, entry.continuation, entry.hint)
            })
            .collect()
    }

    pub fn has_dependers(&self, dependee: &DependerKey<E>) -> bool {
        self.dependers.get(dependee).is_some_and(|m| !m.is_empty())
    }

    /// Every `(depender, dependee)` edge currently in the graph, restricted
    /// to kinds for which `include_kind` returns true on both ends — used
    /// by the phase controller to build the subgraph it searches for
    /// closed SCCs (§4.7).
    pub fn edges(&self, mut include_kind: impl FnMut(KindId) -> bool) -> Vec<(DependerKey<E>, DependerKey<E>)> {
        let mut edges = Vec::new();
        for (depender, dependees) in &self.dependees {
            if !include_kind(depender.1) {
                continue;
            }
            for dependee in dependees {
                let dependee_key = (dependee.entity().clone(), dependee.kind());
                if include_kind(dependee_key.1) {
                    edges.push((depender.clone(), dependee_key));
                }
            }
        }
        edges
    }

    pub fn dependers_with_no_value(&self, kind: KindId) -> impl Iterator<Item = DependerKey<E>> + '_ {
        self.dependers.keys().filter(move |(_, k)| *k == kind).cloned()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.dependees.is_empty() && self.dependers.is_empty()
    }
}

impl<E: Entity> Default for DependencyGraph<E> {
    fn default() -> Self {
        Self::new()
    }
}
