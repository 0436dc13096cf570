// Result variants a property-computation function can return (§4.5), plus
// the hint (§4.3/§4.5) that steers whether a follow-up continuation is
// inlined on the updates worker or scheduled as a task.

use std::sync::Arc;

use crate::entity::Entity;
use crate::kind::KindId;
use crate::property::{EOptionP, PropertyRef};

/// Whether resuming a depender after one of its dependees changes is cheap
/// enough to run inline on the updates worker, or expensive enough that it
/// should go back through the task queue. This is purely a scheduling
/// hint: it changes *where* a continuation runs, never *whether* the
/// result it produces is correct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hint {
    Cheap,
    Expensive,
}

/// A continuation resumes a suspended computation with the one dependee
/// whose value just changed, producing a fresh result for the same
/// `(depender entity, depender kind)` pair. Continuations may run more than
/// once over a phase — each rerun gets the latest value, not necessarily
/// the one that triggered the rerun that scheduled it — so they are shared,
/// not consumed (Design Note: "Shared ownership of continuations").
pub type Continuation<E> = Arc<dyn Fn(EOptionP<E>) -> PropertyComputationResult<E> + Send + Sync>;

/// A property-computation function, given just the entity, run once as an
/// eager/lazy/triggered initial computation.
pub type ComputationFn<E> =
    Arc<dyn Fn(&crate::store::PropertyStore<E>, E) -> PropertyComputationResult<E> + Send + Sync>;

/// A collaborative update function for `PartialResult`: reads the current
/// value (if any) and returns `Some(new)` to propose an update, or `None`
/// to leave the value untouched.
pub type PartialFn = Arc<dyn Fn(Option<PropertyRef>) -> Option<PropertyRef> + Send + Sync>;

pub enum PropertyComputationResult<E: Entity> {
    /// Nothing to store (§4.5).
    NoResult,

    /// A single final value.
    Result { entity: E, kind: KindId, value: PropertyRef },

    /// Several final values produced together.
    MultiResult(Vec<(E, KindId, PropertyRef)>),

    /// A collaborative update to a single `(entity, kind)`, applied via
    /// `f` against whatever value (if any) is currently stored.
    PartialResult { entity: E, kind: KindId, update: PartialFn },

    /// A refinable update together with the full set of dependees this
    /// computation actually consulted to produce it, a continuation to
    /// resume with when one of them changes, and a scheduling hint.
    IntermediateResult {
        entity: E,
        kind: KindId,
        lb: PropertyRef,
        ub: PropertyRef,
        seen_dependees: Vec<EOptionP<E>>,
        continuation: Continuation<E>,
        hint: Hint,
        /// Preserved across reruns caused by a stale dependee snapshot so a
        /// pending forced notification is never dropped (§4.5 step 1).
        force_depender_notification: bool,
    },

    /// A current result plus additional (computation, entity) pairs to run,
    /// inlined when `hint` is `Cheap` and the task queue is not backed up,
    /// otherwise scheduled.
    IncrementalResult {
        result: Box<PropertyComputationResult<E>>,
        follow_ups: Vec<(ComputationFn<E>, E)>,
        hint: Hint,
    },

    /// A batch of independent results, dispatched one at a time.
    Results(Vec<PropertyComputationResult<E>>),

    /// A final value, stored only if the entity has no value yet for this
    /// kind; otherwise dropped.
    IdempotentResult { entity: E, kind: KindId, value: PropertyRef },

    /// A final value supplied by an external caller (`Store::set`), which
    /// asserts there were no dependencies to tear down.
    ExternalResult { entity: E, kind: KindId, value: PropertyRef },

    /// The result of resolving one or more closed strongly-connected
    /// components: a final value for every member.
    CSCCsResult(Vec<Vec<(E, KindId, PropertyRef)>>),
}

impl<E: Entity> PropertyComputationResult<E> {
    pub fn result(entity: E, kind: KindId, value: PropertyRef) -> Self {
        PropertyComputationResult::Result { entity, kind, value }
    }

    pub fn intermediate(
        entity: E,
        kind: KindId,
        lb: PropertyRef,
        ub: PropertyRef,
        seen_dependees: Vec<EOptionP<E>>,
        continuation: Continuation<E>,
        hint: Hint,
    ) -> Self {
        PropertyComputationResult::IntermediateResult {
            entity,
            kind,
            lb,
            ub,
            seen_dependees,
            continuation,
            hint,
            force_depender_notification: false,
        }
    }
}
