// Entity/Property Table (§4.2): a per-kind concurrent map from entity
// identity to current `EOptionP`. Reads are wait-free; writes happen only
// on the updates worker, so from every other thread's perspective
// publication is a single atomic swap.

use dashmap::DashMap;
use dashmap::mapref::multiple::RefMulti;

use crate::entity::Entity;
use crate::kind::KindId;
use crate::property::EOptionP;

/// One shard per registered kind, indexed densely by `KindId` for cache
/// locality (Design Note: "Per-kind dense arrays"). Shards are created
/// lazily the first time an entity is referenced for that kind, since
/// entities need not be pre-enumerated (§3 Lifecycles).
pub struct Table<E: Entity> {
    shards: Vec<DashMap<E, EOptionP<E>>>,
}

impl<E: Entity> Table<E> {
    pub fn new(kind_count: usize) -> Self {
        let mut shards = Vec::with_capacity(kind_count);
        shards.resize_with(kind_count, DashMap::new);
        Table { shards }
    }

    fn shard(&self, kind: KindId) -> &DashMap<E, EOptionP<E>> {
        &self.shards[kind as usize]
    }

    /// Read-only lookup; never blocks on the updates worker.
    pub fn get(&self, entity: &E, kind: KindId) -> Option<EOptionP<E>> {
        self.shard(kind).get(entity).map(|r| r.value().clone())
    }

    pub fn contains(&self, entity: &E, kind: KindId) -> bool {
        self.shard(kind).contains_key(entity)
    }

    /// Only the updates worker calls this: publishes a new bound pair for
    /// `(entity, kind)`, replacing whatever was there (Invariant 2/3 are
    /// the caller's responsibility — the table itself is not the monotone-
    /// refinement enforcement point, the dispatcher is).
    pub fn publish(&self, eps: EOptionP<E>) {
        let kind = eps.kind();
        self.shard(kind).insert(eps.entity().clone(), eps);
    }

    /// Snapshot iteration; consumers must tolerate concurrent growth as
    /// the underlying map is still being written to by the updates worker.
    pub fn entities(&self, kind: KindId) -> impl Iterator<Item = EOptionP<E>> + '_ {
        self.shard(kind).iter().map(|r: RefMulti<'_, E, EOptionP<E>>| r.value().clone())
    }

    pub fn entities_matching(
        &self,
        kind: KindId,
        mut predicate: impl FnMut(&EOptionP<E>) -> bool,
    ) -> Vec<EOptionP<E>> {
        self.shard(kind).iter().filter(|r| predicate(r.value())).map(|r| r.value().clone()).collect()
    }

    pub fn kind_count(&self) -> usize {
        self.shards.len()
    }
}
