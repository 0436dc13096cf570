// Property kinds are dense small integers assigned at registration time so
// that every kind-indexed structure in the store (the table, the dependency
// graph, the per-kind triggered-lazy sets) can be a contiguous array rather
// than a hash map. The universe of kinds is fixed the moment the first
// phase is set up (Design Note: "Global mutable state" / "Per-kind dense
// arrays").

use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;
use crate::property::{EOptionP, PropertyRef};
use crate::store::PropertyStore;

/// A kind id. `u8` caps the universe at 256 distinct property kinds, which
/// also lets kind-indexed sets reuse `propstore_base::KindSet` — see
/// DESIGN.md for why this bound was chosen over an unbounded `usize`.
pub type KindId = u8;

pub type FallbackFn<E> = Arc<dyn Fn(&PropertyStore<E>, &E) -> PropertyRef + Send + Sync>;
pub type ResolveCycleFn<E> = Arc<dyn Fn(&PropertyStore<E>, &[EOptionP<E>]) -> PropertyRef + Send + Sync>;

/// A compile-time-registered property kind: its dense id, a human-readable
/// name for tracing, its fallback function, and its cycle-resolution
/// function (§4.1).
#[derive(Clone)]
pub struct PropertyKind<E: Entity> {
    pub id: KindId,
    pub name: &'static str,
    pub fallback: FallbackFn<E>,
    pub resolve_cycle: ResolveCycleFn<E>,
}

impl<E: Entity> fmt::Debug for PropertyKind<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyKind").field("id", &self.id).field("name", &self.name).finish()
    }
}

/// The dense, fixed-once-a-phase table of registered kinds (Invariant 1:
/// at most one computation function per kind is enforced by the caller at
/// registration time, in `Store::register_lazy`/`schedule_eager`, not here —
/// this registry only holds the fallback/resolve-cycle pair every kind must
/// carry regardless of whether anyone ever computes it).
pub struct KindRegistry<E: Entity> {
    kinds: Vec<Option<PropertyKind<E>>>,
}

impl<E: Entity> KindRegistry<E> {
    pub fn new() -> Self {
        KindRegistry { kinds: Vec::new() }
    }

    pub fn register(&mut self, kind: PropertyKind<E>) {
        let idx = kind.id as usize;
        if idx >= self.kinds.len() {
            self.kinds.resize_with(idx + 1, || None);
        }
        self.kinds[idx] = Some(kind);
    }

    pub fn get(&self, id: KindId) -> Option<&PropertyKind<E>> {
        self.kinds.get(id as usize).and_then(|k| k.as_ref())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl<E: Entity> Default for KindRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
