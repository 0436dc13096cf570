// The task variants a compute worker executes, and the update variants the
// updates worker dispatches (§4.4).

use crate::entity::Entity;
use crate::kind::KindId;
use crate::property::EOptionP;
use crate::result::{ComputationFn, Continuation, Hint, PropertyComputationResult};

pub enum ComputeTask<E: Entity> {
    /// An eager, lazily-triggered, or cheap-but-queue-backed-up initial
    /// computation. Which kind it produces a value for is up to the
    /// computation itself, so it is not tracked here.
    Initial { entity: E, computation: ComputationFn<E> },
    /// Resuming a suspended depender with the dependee value that changed.
    Continuation {
        depender_entity: E,
        depender_kind: KindId,
        continuation: Continuation<E>,
        updated_dependee: EOptionP<E>,
        force_depender_notification: bool,
    },
}

pub enum Update<E: Entity> {
    /// A computed result to run through the dispatcher.
    Dispatch { result: PropertyComputationResult<E>, force_evaluation: bool, force_depender_notification: bool },
    /// `force(entity, kind)`: mark the pair as forced, triggering a lazy
    /// computation if one is registered and none has run yet.
    Force { entity: E, kind: KindId },
    /// A query against a lazily-computed kind that missed the table and
    /// found no fast-track hit: trigger the computation at most once.
    TriggerLazy { entity: E, kind: KindId },
    /// A request from `wait_on_phase_completion` to run one round of
    /// fallback injection / SCC resolution / leftover finalization. The
    /// reply channel carries whether the round produced new work.
    RunQuiescenceRound { reply: std::sync::mpsc::SyncSender<bool> },
}

#[allow(dead_code)]
pub(crate) fn is_cheap(hint: Hint) -> bool {
    matches!(hint, Hint::Cheap)
}
