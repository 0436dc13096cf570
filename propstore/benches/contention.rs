//! Throughput under contention: many entities computing a property that
//! depends on one shared entity, the scenario §8 calls out as the one most
//! likely to expose lock contention in the dependency graph or the work
//! deques.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use propstore::{EOptionP, Hint, KindId, PropertyComputationResult, PropertyRef, PropertyStore, PropertyValue, StoreConfig};

const VAL: KindId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
enum BenchValue {
    Bottom,
    Top,
    Int(i64),
}

impl PropertyValue for BenchValue {
    fn kind_id(&self) -> KindId {
        VAL
    }

    fn le(&self, other: &dyn PropertyValue) -> bool {
        let Some(other) = other.downcast_ref::<BenchValue>() else { return false };
        match (self, other) {
            (BenchValue::Bottom, _) => true,
            (_, BenchValue::Top) => true,
            (BenchValue::Int(a), BenchValue::Int(b)) => a == b,
            _ => false,
        }
    }

    fn value_eq(&self, other: &dyn PropertyValue) -> bool {
        other.downcast_ref::<BenchValue>().map(|o| o == self).unwrap_or(false)
    }
}

fn int_of(ep: &EOptionP<u32>) -> Option<i64> {
    match ep.as_final()?.as_ref().downcast_ref::<BenchValue>()? {
        BenchValue::Int(n) => Some(*n),
        _ => None,
    }
}

fn chain_result(entity: u32, dependee: EOptionP<u32>) -> PropertyComputationResult<u32> {
    if let Some(n) = int_of(&dependee) {
        return PropertyComputationResult::result(entity, VAL, Arc::new(BenchValue::Int(n + 1)));
    }
    PropertyComputationResult::intermediate(
        entity,
        VAL,
        Arc::new(BenchValue::Bottom),
        Arc::new(BenchValue::Top),
        vec![dependee],
        Arc::new(move |updated| chain_result(entity, updated)),
        Hint::Cheap,
    )
}

fn run_contention(entity_count: u32) {
    let store = PropertyStore::<u32>::new(StoreConfig::new());
    store
        .register_kind(
            VAL,
            "Val",
            Arc::new(|_store, _entity| Arc::new(BenchValue::Int(-1)) as PropertyRef),
            Arc::new(|_store, _eps: &[EOptionP<u32>]| Arc::new(BenchValue::Int(0)) as PropertyRef),
        )
        .unwrap();
    store.setup_phase(&[VAL], &[]).unwrap();

    store.schedule_eager(0, Arc::new(|_store, entity| PropertyComputationResult::result(entity, VAL, Arc::new(BenchValue::Int(0)))));
    for entity in 1..entity_count {
        store.schedule_eager(entity, Arc::new(|store, entity| chain_result(entity, store.get(0, VAL))));
    }

    store.wait_on_phase_completion().unwrap();
    store.shutdown();
}

fn contention_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_dependee_contention");
    for entity_count in [100u32, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(entity_count), &entity_count, |b, &count| {
            b.iter(|| run_contention(count));
        });
    }
    group.finish();
}

criterion_group!(benches, contention_benchmark);
criterion_main!(benches);
