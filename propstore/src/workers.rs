// Worker pool bodies (§4.4/§5): N compute workers pull `ComputeTask`s and
// feed their results back as `Update::Dispatch`; exactly one updates worker
// owns the dependency graph and processes every `Update` sequentially. All
// cross-thread communication goes through the two `WorkDeque`s — nothing
// here ever locks the dependency graph directly.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::dispatcher::{self, UpdatesWorkerState};
use crate::entity::Entity;
use crate::scheduler;
use crate::store::{PropertyStore, StoreInner};
use crate::task::{ComputeTask, Update};

/// Pulls `ComputeTask`s until the queue closes, running each one against a
/// thin `PropertyStore` handle sharing this store's state, and funnels the
/// result back through the update queue. Every task, regardless of outcome,
/// decrements the shared job counter exactly once.
pub(crate) fn run_compute_worker<E: Entity>(store: Arc<StoreInner<E>>) {
    let handle = PropertyStore::from_inner(store.clone());
    while let Some(task) = store.compute_queue.pop_blocking() {
        if store.shutdown.load(Ordering::SeqCst) {
            store.jobs.decrement();
            continue;
        }
        let (result, force_depender_notification) = match task {
            ComputeTask::Initial { entity, computation } => (computation(&handle, entity), false),
            ComputeTask::Continuation { depender_entity, depender_kind, continuation, updated_dependee, force_depender_notification } => {
                store.config.tracer.update_handled(&depender_entity, depender_kind);
                (continuation(updated_dependee), force_depender_notification)
            }
        };
        store.update_queue.push_back(Update::Dispatch { result, force_evaluation: false, force_depender_notification });
    }
}

/// The single thread that owns the dependency graph (§4.3) and every piece
/// of state the dispatcher touches. Every `Update` it pulls decrements the
/// job counter exactly once, whether it ends up doing real work or not.
pub(crate) fn run_updates_worker<E: Entity>(store: Arc<StoreInner<E>>) {
    let mut state = UpdatesWorkerState::new();
    while let Some(update) = store.update_queue.pop_blocking() {
        match update {
            Update::Dispatch { result, force_evaluation, force_depender_notification } => {
                dispatcher::handle_result(&store, &mut state, result, force_evaluation, force_depender_notification);
                store.jobs.decrement();
            }
            Update::Force { entity, kind } => {
                state.forced.insert((entity.clone(), kind));
                dispatcher::maybe_trigger_lazy(&store, &mut state, entity, kind);
                store.jobs.decrement();
            }
            Update::TriggerLazy { entity, kind } => {
                dispatcher::maybe_trigger_lazy(&store, &mut state, entity, kind);
                store.jobs.decrement();
            }
            Update::RunQuiescenceRound { reply } => {
                let made_progress = scheduler::run_round(&store, &mut state);
                let _ = reply.send(made_progress);
                store.jobs.decrement();
            }
        }
        if store.shutdown.load(Ordering::SeqCst) {
            break;
        }
    }
}
