//! End-to-end scenarios driving a real `PropertyStore` through a full
//! phase: a single eager computation, a dependency chain, a genuine cycle,
//! fallback injection, lazy-plus-force, and many entities contending on one
//! shared dependee.

use std::sync::Arc;

use propstore::{
    EOptionP, Hint, KindId, PropertyComputationResult, PropertyRef, PropertyStore, PropertyValue, StoreConfig,
};

const VAL: KindId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TestValue {
    Bottom,
    Top,
    Int(i64),
}

impl PropertyValue for TestValue {
    fn kind_id(&self) -> KindId {
        VAL
    }

    fn le(&self, other: &dyn PropertyValue) -> bool {
        let Some(other) = other.downcast_ref::<TestValue>() else { return false };
        match (self, other) {
            (TestValue::Bottom, _) => true,
            (_, TestValue::Top) => true,
            (TestValue::Int(a), TestValue::Int(b)) => a == b,
            _ => false,
        }
    }

    fn value_eq(&self, other: &dyn PropertyValue) -> bool {
        other.downcast_ref::<TestValue>().map(|o| o == self).unwrap_or(false)
    }
}

fn int_value(value: PropertyRef) -> Option<i64> {
    match value.as_ref().downcast_ref::<TestValue>()? {
        TestValue::Int(n) => Some(*n),
        _ => None,
    }
}

fn int_of(ep: &EOptionP<&'static str>) -> Option<i64> {
    ep.as_final().cloned().and_then(int_value)
}

fn val(n: i64) -> PropertyRef {
    Arc::new(TestValue::Int(n))
}

fn no_op_fallback() -> propstore::FallbackFn<&'static str> {
    Arc::new(|_store, _entity| val(-1))
}

/// Resolves every member of a cycle to the same value: the minimum `Int`
/// seen among the cycle's current (necessarily non-final) bounds, or 0 if
/// none is an `Int` yet.
fn min_cycle_resolver() -> propstore::ResolveCycleFn<&'static str> {
    Arc::new(|_store, eps: &[EOptionP<&'static str>]| {
        let min = eps
            .iter()
            .filter_map(|ep| ep.ub().cloned().and_then(int_value))
            .min()
            .unwrap_or(0);
        val(min)
    })
}

fn chain_result(entity: &'static str, dependee: EOptionP<&'static str>) -> PropertyComputationResult<&'static str> {
    if let Some(n) = int_of(&dependee) {
        return PropertyComputationResult::result(entity, VAL, val(n + 1));
    }
    PropertyComputationResult::intermediate(
        entity,
        VAL,
        Arc::new(TestValue::Bottom),
        Arc::new(TestValue::Top),
        vec![dependee],
        Arc::new(move |updated| chain_result(entity, updated)),
        Hint::Cheap,
    )
}

#[test]
fn single_eager_computation_finalizes() {
    let store = PropertyStore::<&'static str>::new(StoreConfig::new());
    store.register_kind(VAL, "Val", no_op_fallback(), min_cycle_resolver()).unwrap();
    store.setup_phase(&[VAL], &[]).unwrap();
    store.schedule_eager("a", Arc::new(|_store, entity| PropertyComputationResult::result(entity, VAL, val(42))));
    store.wait_on_phase_completion().unwrap();
    assert_eq!(int_of(&store.get("a", VAL)), Some(42));
    store.shutdown();
}

#[test]
fn linear_chain_propagates_through_dependees() {
    let store = PropertyStore::<&'static str>::new(StoreConfig::new());
    store.register_kind(VAL, "Val", no_op_fallback(), min_cycle_resolver()).unwrap();
    store.setup_phase(&[VAL], &[]).unwrap();

    store.schedule_eager("a", Arc::new(|_store, entity| PropertyComputationResult::result(entity, VAL, val(0))));
    store.schedule_eager("b", Arc::new(|store, entity| chain_result(entity, store.get("a", VAL))));
    store.schedule_eager("c", Arc::new(|store, entity| chain_result(entity, store.get("b", VAL))));

    store.wait_on_phase_completion().unwrap();

    assert_eq!(int_of(&store.get("a", VAL)), Some(0));
    assert_eq!(int_of(&store.get("b", VAL)), Some(1));
    assert_eq!(int_of(&store.get("c", VAL)), Some(2));
    store.shutdown();
}

#[test]
fn two_node_cycle_is_resolved_via_resolve_cycle() {
    let store = PropertyStore::<&'static str>::new(StoreConfig::new());
    store.register_kind(VAL, "Val", no_op_fallback(), min_cycle_resolver()).unwrap();
    store.setup_phase(&[VAL], &[]).unwrap();

    store.schedule_eager("x", Arc::new(|store, entity| chain_result(entity, store.get("y", VAL))));
    store.schedule_eager("y", Arc::new(|store, entity| chain_result(entity, store.get("x", VAL))));

    store.wait_on_phase_completion().unwrap();

    // Neither side ever sees the other finalize on its own; the phase
    // controller's closed-SCC round must have broken the deadlock.
    assert!(store.get("x", VAL).is_final());
    assert!(store.get("y", VAL).is_final());
    store.shutdown();
}

#[test]
fn fallback_is_injected_for_uncomputed_dependee() {
    let store = PropertyStore::<&'static str>::new(StoreConfig::new());
    store.register_kind(VAL, "Val", no_op_fallback(), min_cycle_resolver()).unwrap();
    store.setup_phase(&[VAL], &[]).unwrap();

    // `needs_fallback` is never scheduled; `waiter` depends on it anyway.
    store.schedule_eager("waiter", Arc::new(|store, entity| chain_result(entity, store.get("needs_fallback", VAL))));

    store.wait_on_phase_completion().unwrap();

    assert_eq!(int_of(&store.get("needs_fallback", VAL)), Some(-1));
    assert_eq!(int_of(&store.get("waiter", VAL)), Some(0));
    let stats = store.stats();
    assert!(stats.fallbacks_used >= 1);
    store.shutdown();
}

#[test]
fn lazy_computation_is_triggered_and_force_marks_it_outstanding() {
    let store = PropertyStore::<&'static str>::new(StoreConfig::new());
    store.register_kind(VAL, "Val", no_op_fallback(), min_cycle_resolver()).unwrap();
    store.register_lazy(VAL, Arc::new(|_store, entity| PropertyComputationResult::result(entity, VAL, val(7)))).unwrap();
    store.setup_phase(&[VAL], &[]).unwrap();

    store.force("lazy_entity", VAL);
    let first_read = store.get("lazy_entity", VAL);
    assert!(!first_read.has_property());

    store.wait_on_phase_completion().unwrap();
    assert_eq!(int_of(&store.get("lazy_entity", VAL)), Some(7));
    store.shutdown();
}

#[test]
fn many_dependers_contend_on_one_shared_dependee() {
    let store = PropertyStore::<&'static str>::new(StoreConfig::new());
    store.register_kind(VAL, "Val", no_op_fallback(), min_cycle_resolver()).unwrap();
    store.setup_phase(&[VAL], &[]).unwrap();

    store.schedule_eager("shared", Arc::new(|_store, entity| PropertyComputationResult::result(entity, VAL, val(0))));

    let names: Vec<&'static str> = (0..2000).map(|i| -> &'static str { Box::leak(format!("d{i}").into_boxed_str()) }).collect();
    for &name in &names {
        store.schedule_eager(name, Arc::new(|store, entity| chain_result(entity, store.get("shared", VAL))));
    }

    store.wait_on_phase_completion().unwrap();

    for &name in &names {
        assert_eq!(int_of(&store.get(name, VAL)), Some(1));
    }
    store.shutdown();
}
