//! A small client of `propstore`: a handful of modules with a lazily
//! computed tag, an eagerly computed rank that chains off a neighbor's
//! rank, a genuine two-module cycle resolved via `resolveCycle`, and one
//! module nobody ever schedules a computation for, picked up by the
//! fallback round instead.

use std::sync::Arc;

use propstore::{
    EOptionP, KindId, PropertyComputationResult, PropertyRef, PropertyStore, PropertyValue, StoreConfig,
    TracingTracer,
};

const TAG: KindId = 0;
const RANK: KindId = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
enum DemoValue {
    Bottom(KindId),
    Top(KindId),
    Tag(KindId, &'static str),
    Rank(KindId, u32),
}

impl PropertyValue for DemoValue {
    fn kind_id(&self) -> KindId {
        match self {
            DemoValue::Bottom(k) | DemoValue::Top(k) | DemoValue::Tag(k, _) | DemoValue::Rank(k, _) => *k,
        }
    }

    fn le(&self, other: &dyn PropertyValue) -> bool {
        let Some(other) = other.downcast_ref::<DemoValue>() else { return false };
        match (self, other) {
            (DemoValue::Bottom(_), _) => true,
            (_, DemoValue::Top(_)) => true,
            (DemoValue::Tag(_, a), DemoValue::Tag(_, b)) => a == b,
            (DemoValue::Rank(_, a), DemoValue::Rank(_, b)) => a == b,
            _ => false,
        }
    }

    fn value_eq(&self, other: &dyn PropertyValue) -> bool {
        other.downcast_ref::<DemoValue>().map(|o| o == self).unwrap_or(false)
    }
}

fn rank_of(ep: &EOptionP<String>) -> Option<u32> {
    match ep.as_final()?.as_ref().downcast_ref::<DemoValue>()? {
        DemoValue::Rank(_, n) => Some(*n),
        _ => None,
    }
}

fn main() -> propstore::Result<()> {
    tracing_subscriber::fmt().with_env_filter("propstore=info").init();

    let config = StoreConfig::<String>::new().with_tracer(Arc::new(TracingTracer));
    let store = PropertyStore::new(config);

    store.register_kind(
        TAG,
        "ModuleTag",
        Arc::new(|_store, _entity| Arc::new(DemoValue::Tag(TAG, "untagged")) as PropertyRef),
        Arc::new(|_store, eps: &[EOptionP<String>]| {
            eps.first()
                .and_then(|e| e.as_final())
                .cloned()
                .unwrap_or_else(|| Arc::new(DemoValue::Tag(TAG, "untagged")) as PropertyRef)
        }),
    )?;
    store.register_kind(
        RANK,
        "ModuleRank",
        Arc::new(|_store, _entity| Arc::new(DemoValue::Rank(RANK, 0)) as PropertyRef),
        Arc::new(|_store, eps: &[EOptionP<String>]| {
            let min_rank = eps
                .iter()
                .filter_map(rank_of)
                .min()
                .unwrap_or(0);
            Arc::new(DemoValue::Rank(RANK, min_rank)) as PropertyRef
        }),
    )?;

    store.register_lazy(
        TAG,
        Arc::new(|_store, entity: String| {
            let tag = if entity == "root" { "core" } else { "leaf" };
            PropertyComputationResult::result(entity, TAG, Arc::new(DemoValue::Tag(TAG, tag)))
        }),
    )?;

    store.setup_phase(&[TAG, RANK], &[])?;

    // `root` has no predecessor: rank 0, computed eagerly and immediately final.
    store.schedule_eager(
        "root".to_string(),
        Arc::new(|_store, entity| PropertyComputationResult::result(entity, RANK, Arc::new(DemoValue::Rank(RANK, 0)))),
    );

    // `mid` depends on `root`'s rank; it suspends until `root` finalizes.
    store.schedule_eager("mid".to_string(), Arc::new(|store, entity| chain_from(store, entity, "root".to_string())));

    // `leaf` depends on `mid`'s rank the same way.
    store.schedule_eager("leaf".to_string(), Arc::new(|store, entity| chain_from(store, entity, "mid".to_string())));

    // `cycle_a` and `cycle_b` depend on each other: no amount of waiting
    // resolves this, so the phase controller's closed-SCC round must.
    store.schedule_eager("cycle_a".to_string(), Arc::new(|store, entity| chain_from(store, entity, "cycle_b".to_string())));
    store.schedule_eager("cycle_b".to_string(), Arc::new(|store, entity| chain_from(store, entity, "cycle_a".to_string())));

    // `orphan` never gets a scheduled RANK computation; `waits_on_orphan`
    // depends on it anyway, so the only way that dependency is ever
    // satisfied is the fallback round injecting `orphan`'s RANK fallback.
    store.schedule_eager(
        "waits_on_orphan".to_string(),
        Arc::new(|store, entity| chain_from(store, entity, "orphan".to_string())),
    );

    let orphan_tag = store.get("orphan".to_string(), TAG);
    println!("orphan tag before quiescence: {orphan_tag:?}");

    store.wait_on_phase_completion()?;

    for name in ["root", "mid", "leaf", "cycle_a", "cycle_b", "orphan", "waits_on_orphan"] {
        let rank = store.get(name.to_string(), RANK);
        println!("{name}: {rank:?}");
    }
    let orphan_tag = store.get("orphan".to_string(), TAG);
    println!("orphan tag after quiescence: {orphan_tag:?}");

    let stats = store.stats();
    println!("{stats:?}");

    store.shutdown();
    Ok(())
}

/// Shared shape for "my rank is one more than `predecessor`'s": suspends on
/// `predecessor`'s RANK via an `IntermediateResult`, then resolves to a
/// concrete `Result` once it sees a final value.
fn chain_from(
    store: &PropertyStore<String>,
    entity: String,
    predecessor: String,
) -> PropertyComputationResult<String> {
    let dependee = store.get(predecessor.clone(), RANK);
    resume_chain(entity, dependee)
}

fn resume_chain(entity: String, dependee: EOptionP<String>) -> PropertyComputationResult<String> {
    if let Some(rank) = rank_of(&dependee) {
        return PropertyComputationResult::result(entity, RANK, Arc::new(DemoValue::Rank(RANK, rank + 1)));
    }
    let captured_entity = entity.clone();
    PropertyComputationResult::intermediate(
        entity,
        RANK,
        Arc::new(DemoValue::Bottom(RANK)),
        Arc::new(DemoValue::Top(RANK)),
        vec![dependee],
        Arc::new(move |updated| resume_chain(captured_entity.clone(), updated)),
        propstore::Hint::Cheap,
    )
}
