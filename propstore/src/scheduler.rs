// Phase Controller / Quiescence (§4.7): fallback injection, closed-SCC
// resolution, and leftover finalization run in that order, and the whole
// sequence repeats until a round makes no progress at all. Invoked only
// from the updates worker, in response to `Update::RunQuiescenceRound`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::dispatcher::{self, UpdatesWorkerState};
use crate::entity::Entity;
use crate::kind::KindId;
use crate::property::EOptionP;
use crate::result::PropertyComputationResult;
use crate::scc;
use crate::store::{PropertyStore, StoreInner};

type Pending<E> = VecDeque<(PropertyComputationResult<E>, bool)>;

/// Runs exactly one round. Each of the three sub-steps only runs if the
/// ones before it made no progress — a closed cycle is never searched for
/// while a fallback could still resolve things more cheaply, and leftovers
/// are never finalized while a cycle might still account for them.
pub(crate) fn run_round<E: Entity>(store: &Arc<StoreInner<E>>, state: &mut UpdatesWorkerState<E>) -> bool {
    let mut pending: Pending<E> = VecDeque::new();

    let mut progress = inject_fallbacks(store, state, &mut pending);
    dispatcher::drain_pending(store, state, &mut pending);

    if !progress {
        progress = resolve_closed_sccs(store, state, &mut pending);
        dispatcher::drain_pending(store, state, &mut pending);
    }

    if !progress {
        progress = finalize_leftovers(store, state, &mut pending);
        dispatcher::drain_pending(store, state, &mut pending);
    }

    progress
}

/// For every non-delayed kind, any dependee `(entity, kind)` that has
/// dependers but never received a value is given its kind's fallback.
fn inject_fallbacks<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    pending: &mut Pending<E>,
) -> bool {
    let delayed = store.delayed_kinds.lock().clone();
    let kind_ids: Vec<KindId> = {
        let registry = store.kinds.lock();
        (0..registry.len()).filter_map(|i| registry.get(i as KindId).map(|k| k.id)).collect()
    };

    let mut injected = false;
    for kind in kind_ids {
        if delayed.get(kind) {
            continue;
        }
        let waiting: Vec<E> = state
            .graph
            .dependers_with_no_value(kind)
            .filter(|(entity, k)| store.table.get(entity, *k).is_none())
            .map(|(entity, _)| entity)
            .collect();
        if waiting.is_empty() {
            continue;
        }
        let descriptor = match store.kinds.lock().get(kind).cloned() {
            Some(d) => d,
            None => continue,
        };
        let handle = PropertyStore::from_inner(store.clone());
        for entity in waiting {
            let value = (descriptor.fallback)(&handle, &entity);
            store.stats.fallbacks_used.fetch_add(1, Ordering::Relaxed);
            store.config.tracer.fallback_used(&entity, kind);
            dispatcher::finalize(store, state, pending, entity, kind, value);
            injected = true;
        }
    }
    injected
}

/// Builds the subgraph restricted to non-delayed kinds and looks for closed
/// SCCs in it. Each member's own kind resolves its own final value, given
/// the whole cycle's current bounds as context.
fn resolve_closed_sccs<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    pending: &mut Pending<E>,
) -> bool {
    let delayed = store.delayed_kinds.lock().clone();
    let edge_list = state.graph.edges(|k| !delayed.get(k));
    if edge_list.is_empty() {
        return false;
    }

    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    let mut edge_map: HashMap<(E, KindId), Vec<(E, KindId)>> = HashMap::new();
    for (depender, dependee) in edge_list {
        if seen.insert(depender.clone()) {
            nodes.push(depender.clone());
        }
        if seen.insert(dependee.clone()) {
            nodes.push(dependee.clone());
        }
        edge_map.entry(depender).or_default().push(dependee);
    }

    let sccs = scc::closed_sccs(&nodes, &edge_map);
    if sccs.is_empty() {
        return false;
    }

    let handle = PropertyStore::from_inner(store.clone());
    let mut resolved_groups = Vec::with_capacity(sccs.len());
    for members in sccs {
        let eps: Vec<EOptionP<E>> = members
            .iter()
            .map(|(e, k)| store.table.get(e, *k).unwrap_or_else(|| EOptionP::epk(e.clone(), *k)))
            .collect();
        let mut resolved = Vec::with_capacity(members.len());
        for (entity, kind) in &members {
            let descriptor = match store.kinds.lock().get(*kind).cloned() {
                Some(d) => d,
                None => continue,
            };
            let value = (descriptor.resolve_cycle)(&handle, &eps);
            resolved.push((entity.clone(), *kind, value));
        }
        if !resolved.is_empty() {
            resolved_groups.push(resolved);
        }
    }
    if resolved_groups.is_empty() {
        return false;
    }
    pending.push_back((PropertyComputationResult::CSCCsResult(resolved_groups), false));
    true
}

/// Any non-final, collaboratively-refined value that has no outstanding
/// dependees left to wait on is finalized at its current upper bound —
/// nothing further is ever going to refine it (§4.7 third round).
fn finalize_leftovers<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    pending: &mut Pending<E>,
) -> bool {
    let delayed = store.delayed_kinds.lock().clone();
    let computed: Vec<KindId> = store.computed_kinds.lock().iter().collect();

    let mut leftovers = Vec::new();
    for kind in computed {
        if delayed.get(kind) {
            continue;
        }
        for eps in store.table.entities(kind) {
            if eps.is_final() {
                continue;
            }
            let key = (eps.entity().clone(), kind);
            let still_waiting = state.graph.dependees_of(&key).map(|d| !d.is_empty()).unwrap_or(false);
            if still_waiting {
                continue;
            }
            if let Some(ub) = eps.ub() {
                leftovers.push((eps.entity().clone(), kind, ub.clone()));
            }
        }
    }
    if leftovers.is_empty() {
        return false;
    }
    for (entity, kind, value) in leftovers {
        dispatcher::finalize(store, state, pending, entity, kind, value);
    }
    true
}
