// Result Dispatcher (§4.5), the single-writer heart of the store. Every
// function in this module either runs on the updates worker thread or is
// called transitively from something that does — nothing here takes a lock
// on the dependency graph because nothing else ever touches it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use propstore_base::ContractViolation;

use crate::depgraph::{DependencyGraph, DependerKey};
use crate::entity::Entity;
use crate::kind::KindId;
use crate::property::{EOptionP, PropertyRef};
use crate::result::{Continuation, Hint, PropertyComputationResult};
use crate::store::StoreInner;
use crate::task::ComputeTask;

/// Once the compute queue holds at least this many tasks, a `Cheap`
/// continuation is scheduled instead of inlined — the load-bearing but
/// correctness-irrelevant distinction from §4.5.
const INLINE_QUEUE_THRESHOLD: usize = 64;

/// State touched only by the updates worker: the dependency graph, which
/// kinds have already had their lazy computation triggered for which
/// entities, and which `(entity, kind)` pairs are `force`d.
pub(crate) struct UpdatesWorkerState<E: Entity> {
    pub graph: DependencyGraph<E>,
    pub triggered_lazy: HashMap<KindId, HashSet<E>>,
    pub forced: HashSet<DependerKey<E>>,
}

impl<E: Entity> UpdatesWorkerState<E> {
    pub fn new() -> Self {
        UpdatesWorkerState { graph: DependencyGraph::new(), triggered_lazy: HashMap::new(), forced: HashSet::new() }
    }
}

type Pending<E> = VecDeque<(PropertyComputationResult<E>, bool)>;

fn result_key<E: Entity>(result: &PropertyComputationResult<E>) -> Option<DependerKey<E>> {
    match result {
        PropertyComputationResult::Result { entity, kind, .. } => Some((entity.clone(), *kind)),
        PropertyComputationResult::PartialResult { entity, kind, .. } => Some((entity.clone(), *kind)),
        PropertyComputationResult::IntermediateResult { entity, kind, .. } => Some((entity.clone(), *kind)),
        PropertyComputationResult::IdempotentResult { entity, kind, .. } => Some((entity.clone(), *kind)),
        PropertyComputationResult::ExternalResult { entity, kind, .. } => Some((entity.clone(), *kind)),
        _ => None,
    }
}

/// The single funnel every computed result passes through (§6
/// `handle_result`). `force_evaluation` marks the result's primary
/// `(entity, kind)` pair as forced before dispatching it.
pub(crate) fn handle_result<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    result: PropertyComputationResult<E>,
    force_evaluation: bool,
    force_depender_notification: bool,
) {
    if force_evaluation {
        if let Some(key) = result_key(&result) {
            state.forced.insert(key);
        }
    }
    let mut pending: Pending<E> = VecDeque::new();
    pending.push_back((result, force_depender_notification));
    drain_pending(store, state, &mut pending);
}

/// Drains a local stack of results to dispatch, inlining cheap follow-ups
/// in the same call instead of round-tripping through the task queue.
pub(crate) fn drain_pending<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    pending: &mut Pending<E>,
) {
    while let Some((result, force_depender_notification)) = pending.pop_front() {
        dispatch_one(store, state, pending, result, force_depender_notification);
    }
}

fn dispatch_one<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    pending: &mut Pending<E>,
    result: PropertyComputationResult<E>,
    force_depender_notification: bool,
) {
    use PropertyComputationResult::*;
    match result {
        NoResult => {}

        Result { entity, kind, value } => finalize(store, state, pending, entity, kind, value),

        MultiResult(list) => {
            for (entity, kind, value) in list {
                finalize(store, state, pending, entity, kind, value);
            }
        }

        PartialResult { entity, kind, update } => {
            let current = store.table.get(&entity, kind).and_then(|eps| eps.ub().cloned());
            match update(current) {
                Some(new_value) => finalize(store, state, pending, entity, kind, new_value),
                None => {
                    store.stats.useless_partial.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        IntermediateResult { entity, kind, lb, ub, seen_dependees, continuation, hint, force_depender_notification: carried } => {
            handle_intermediate(
                store,
                state,
                pending,
                entity,
                kind,
                lb,
                ub,
                seen_dependees,
                continuation,
                hint,
                force_depender_notification || carried,
            );
        }

        IncrementalResult { result, follow_ups, hint } => {
            pending.push_back((*result, force_depender_notification));
            for (computation, entity) in follow_ups {
                schedule_or_run_initial(store, pending, entity, computation, hint);
            }
        }

        Results(list) => {
            for r in list {
                pending.push_back((r, force_depender_notification));
            }
        }

        IdempotentResult { entity, kind, value } => match store.table.get(&entity, kind) {
            None => finalize(store, state, pending, entity, kind, value),
            Some(existing) => {
                store.stats.redundant_idempotent.fetch_add(1, Ordering::Relaxed);
                if let Some(existing_final) = existing.as_final() {
                    if !existing_final.value_eq(value.as_ref()) {
                        // Open Question (resolved, see DESIGN.md): an unequal
                        // existing value is logged, not a contract violation.
                        tracing::debug!(
                            target: "propstore",
                            ?entity, kind,
                            "idempotent result disagreed with existing value; keeping existing"
                        );
                    }
                }
            }
        },

        ExternalResult { entity, kind, value } => {
            finalize(store, state, pending, entity, kind, value);
        }

        CSCCsResult(sccs) => {
            for members in &sccs {
                for (entity, kind, _) in members {
                    state.graph.clear_depender(&(entity.clone(), *kind));
                }
            }
            let member_keys: Vec<(E, KindId)> =
                sccs.iter().flatten().map(|(e, k, _)| (e.clone(), *k)).collect();
            store.config.tracer.cycle_resolved(&member_keys);
            store.stats.resolved_sccs.fetch_add(sccs.len() as u64, Ordering::Relaxed);
            for members in sccs {
                for (entity, kind, value) in members {
                    finalize(store, state, pending, entity, kind, value);
                }
            }
        }
    }
}

fn schedule_or_run_initial<E: Entity>(
    store: &Arc<StoreInner<E>>,
    pending: &mut Pending<E>,
    entity: E,
    computation: crate::result::ComputationFn<E>,
    hint: Hint,
) {
    // Unlike `run_or_schedule_continuation`, an `IncrementalResult` follow-up
    // is inlined when the queue is *not* short: if nothing is backed up
    // there are idle compute workers to pick this up on its own, so the
    // updates worker keeps moving rather than doing the follow-up's work
    // itself (§4.5 IncrementalResult handling).
    if hint == Hint::Cheap && store.compute_queue.len() >= INLINE_QUEUE_THRESHOLD {
        let handle = crate::store::PropertyStore::from_inner(store.clone());
        let result = computation(&handle, entity);
        pending.push_back((result, false));
    } else {
        store.jobs.increment();
        store.stats.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
        store.compute_queue.push_back(ComputeTask::Initial { entity, computation });
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_intermediate<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    pending: &mut Pending<E>,
    entity: E,
    kind: KindId,
    lb: PropertyRef,
    ub: PropertyRef,
    seen_dependees: Vec<EOptionP<E>>,
    continuation: Continuation<E>,
    hint: Hint,
    force_depender_notification: bool,
) {
    let depender_key = (entity.clone(), kind);

    // Step 1: has any seen dependee been refined since the continuation
    // observed it? If so the dependency set we'd register is stale —
    // abandon it and rerun the continuation against the newer value,
    // carrying `force_depender_notification` forward so it is not lost.
    for seen in &seen_dependees {
        if let Some(current) = store.table.get(seen.entity(), seen.kind()) {
            if !eps_bounds_eq(&current, seen) {
                run_or_schedule_continuation(
                    store,
                    pending,
                    depender_key,
                    continuation,
                    hint,
                    current,
                    force_depender_notification,
                );
                return;
            }
        }
    }

    if store.config.debug_assertions {
        if let Some(prev) = store.table.get(&entity, kind) {
            if let (Some(prev_lb), Some(prev_ub)) = (prev.lb(), prev.ub()) {
                let monotone = prev_lb.le(lb.as_ref()) && ub.le(prev_ub.as_ref());
                if !monotone {
                    report_contract_violation(
                        store,
                        ContractViolation::NonMonotonicUpdate {
                            detail: format!("entity={:?} kind={}", entity, kind).into(),
                        },
                    );
                    return;
                }
            }
        }
    }

    if lb.value_eq(ub.as_ref()) {
        // A final bound from an IntermediateResult goes through the same
        // already-final check as every other finalization path (Invariant 3).
        finalize(store, state, pending, entity, kind, ub);
        return;
    }

    let new_eps = EOptionP::intermediate(entity.clone(), kind, lb.clone(), ub.clone());

    let relevant = match store.table.get(&entity, kind) {
        None => true,
        Some(prev) => !eps_bounds_eq(&prev, &new_eps),
    };

    store.table.publish(new_eps.clone());
    state.graph.set_dependencies(depender_key.clone(), seen_dependees, continuation, hint);

    if relevant || force_depender_notification {
        notify_dependers(store, state, pending, &depender_key, &new_eps);
    }
}

/// Publishes a final value, tears down the finalizing entity's own
/// dependee edges (Invariant 4), and resumes every depender suspended on
/// it (every final update is, by definition, relevant — §4.5 point 3).
pub(crate) fn finalize<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    pending: &mut Pending<E>,
    entity: E,
    kind: KindId,
    value: PropertyRef,
) {
    let depender_key = (entity.clone(), kind);

    if let Some(existing) = store.table.get(&entity, kind) {
        if let Some(existing_value) = existing.as_final() {
            if !existing_value.value_eq(value.as_ref()) {
                report_contract_violation(
                    store,
                    ContractViolation::FinalValueMutated {
                        detail: format!("entity={:?} kind={}", entity, kind).into(),
                    },
                );
            }
            return;
        }
    }

    let eps = EOptionP::final_ep(entity.clone(), kind, value);
    store.table.publish(eps.clone());
    state.graph.clear_depender(&depender_key);
    state.forced.remove(&depender_key);
    if let Some(set) = state.triggered_lazy.get_mut(&kind) {
        set.remove(&entity);
    }

    notify_dependers(store, state, pending, &depender_key, &eps);
}

fn notify_dependers<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    pending: &mut Pending<E>,
    depender_key: &DependerKey<E>,
    updated: &EOptionP<E>,
) {
    for (dk, continuation, hint) in state.graph.take_dependers_of(depender_key) {
        store.config.tracer.depender_notified(&dk.0, dk.1, &depender_key.0, depender_key.1);
        run_or_schedule_continuation(store, pending, dk, continuation, hint, updated.clone(), false);
    }
}

fn run_or_schedule_continuation<E: Entity>(
    store: &Arc<StoreInner<E>>,
    pending: &mut Pending<E>,
    depender_key: DependerKey<E>,
    continuation: Continuation<E>,
    hint: Hint,
    updated_dependee: EOptionP<E>,
    force_depender_notification: bool,
) {
    if hint == Hint::Cheap && store.compute_queue.len() < INLINE_QUEUE_THRESHOLD {
        let result = continuation(updated_dependee);
        pending.push_back((result, force_depender_notification));
    } else {
        store.jobs.increment();
        store.stats.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
        store.compute_queue.push_back(ComputeTask::Continuation {
            depender_entity: depender_key.0,
            depender_kind: depender_key.1,
            continuation,
            updated_dependee,
            force_depender_notification,
        });
    }
}

fn eps_bounds_eq<E: Entity>(a: &EOptionP<E>, b: &EOptionP<E>) -> bool {
    match (a.lb(), a.ub(), b.lb(), b.ub()) {
        (Some(a_lb), Some(a_ub), Some(b_lb), Some(b_ub)) => {
            a_lb.value_eq(b_lb.as_ref()) && a_ub.value_eq(b_ub.as_ref())
        }
        _ => false,
    }
}

/// Records the first contract violation and asks every worker to stop
/// (§7 category 1/2: fatal, surfaced from `wait_on_phase_completion`).
pub(crate) fn report_contract_violation<E: Entity>(store: &Arc<StoreInner<E>>, violation: ContractViolation) {
    tracing::error!(target: "propstore", %violation, "contract violation");
    let mut first_error = store.first_error.lock();
    if first_error.is_none() {
        *first_error = Some(violation.into());
    }
    drop(first_error);
    store.shutdown.store(true, Ordering::SeqCst);
    store.compute_queue.close();
    store.update_queue.close();
}

/// Triggers a lazy computation at most once per `(entity, kind)`
/// (§4.6): checks (and updates) the per-kind already-triggered set, which
/// only the updates worker ever reads or writes.
pub(crate) fn maybe_trigger_lazy<E: Entity>(
    store: &Arc<StoreInner<E>>,
    state: &mut UpdatesWorkerState<E>,
    entity: E,
    kind: KindId,
) {
    if store.table.contains(&entity, kind) {
        return;
    }
    let Some(computation) = store.lazy_computations.lock().get(&kind).cloned() else { return };
    let already = state.triggered_lazy.entry(kind).or_default();
    if already.contains(&entity) {
        return;
    }
    already.insert(entity.clone());
    store.stats.scheduled_lazy.fetch_add(1, Ordering::Relaxed);
    store.config.tracer.task_scheduled(&entity, kind);
    store.jobs.increment();
    store.compute_queue.push_back(ComputeTask::Initial { entity, computation });
}
