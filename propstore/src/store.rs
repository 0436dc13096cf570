// Client API facade (§6) and the shared state every worker thread holds a
// handle to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use propstore_base::{ContractViolation, Error};

use crate::config::StoreConfig;
use crate::entity::Entity;
use crate::kind::{FallbackFn, KindId, KindRegistry, PropertyKind, ResolveCycleFn};
use crate::property::{EOptionP, PropertyRef};
use crate::queue::{JobCounter, WorkDeque};
use crate::result::{ComputationFn, PropertyComputationResult};
use crate::table::Table;
use crate::task::{ComputeTask, Update};
use crate::tracer::Stats;
use crate::workers;

const MAX_KINDS: usize = 256;

pub(crate) struct StoreInner<E: Entity> {
    pub table: Table<E>,
    pub kinds: Mutex<KindRegistry<E>>,
    pub lazy_computations: Mutex<HashMap<KindId, ComputationFn<E>>>,
    pub config: StoreConfig<E>,
    pub stats: Stats,
    pub compute_queue: WorkDeque<ComputeTask<E>>,
    pub update_queue: WorkDeque<Update<E>>,
    pub jobs: JobCounter,
    pub computed_kinds: Mutex<propstore_base::KindSet>,
    pub delayed_kinds: Mutex<propstore_base::KindSet>,
    pub phase_locked: AtomicBool,
    pub phase_running: AtomicBool,
    pub shutdown: AtomicBool,
    pub first_error: Mutex<Option<Error>>,
    threads: Mutex<Option<Vec<std::thread::JoinHandle<()>>>>,
}

impl<E: Entity> StoreInner<E> {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// The store's public facade. Cheap to clone: every clone shares the same
/// underlying engine.
#[derive(Clone)]
pub struct PropertyStore<E: Entity> {
    inner: Arc<StoreInner<E>>,
}

impl<E: Entity> PropertyStore<E> {
    pub fn new(config: StoreConfig<E>) -> Self {
        let inner = Arc::new(StoreInner {
            table: Table::new(MAX_KINDS),
            kinds: Mutex::new(KindRegistry::new()),
            lazy_computations: Mutex::new(HashMap::new()),
            stats: Stats::new(),
            compute_queue: WorkDeque::new(),
            update_queue: WorkDeque::new(),
            jobs: JobCounter::new(),
            computed_kinds: Mutex::new(propstore_base::KindSet::new()),
            delayed_kinds: Mutex::new(propstore_base::KindSet::new()),
            phase_locked: AtomicBool::new(false),
            phase_running: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            first_error: Mutex::new(None),
            threads: Mutex::new(None),
            config,
        });
        PropertyStore { inner }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner<E>>) -> Self {
        PropertyStore { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<StoreInner<E>> {
        &self.inner
    }

    /// Registers a property kind's fallback and cycle-resolution
    /// functions. Must happen before the first `setup_phase` call (Design
    /// Note: the kind universe is fixed the moment the first phase is set
    /// up).
    pub fn register_kind(
        &self,
        id: KindId,
        name: &'static str,
        fallback: FallbackFn<E>,
        resolve_cycle: ResolveCycleFn<E>,
    ) -> propstore_base::Result<()> {
        if self.inner.phase_locked.load(Ordering::SeqCst) {
            return Err(ContractViolation::LatePhaseRegistration {
                detail: format!("kind {id} ({name})").into(),
            }
            .into());
        }
        self.inner.kinds.lock().register(PropertyKind { id, name, fallback, resolve_cycle });
        Ok(())
    }

    /// Pre-phase only; at most once per kind (§6, Invariant 1).
    pub fn register_lazy(&self, kind: KindId, computation: ComputationFn<E>) -> propstore_base::Result<()> {
        if self.inner.phase_locked.load(Ordering::SeqCst) {
            return Err(ContractViolation::LatePhaseRegistration { detail: format!("kind {kind}").into() }.into());
        }
        let mut lazy = self.inner.lazy_computations.lock();
        if lazy.contains_key(&kind) {
            return Err(ContractViolation::DuplicateLazyRegistration { detail: format!("kind {kind}").into() }
                .into());
        }
        lazy.insert(kind, computation);
        Ok(())
    }

    /// Adds an initial task for `entity` to run eagerly.
    pub fn schedule_eager(&self, entity: E, computation: ComputationFn<E>) {
        self.ensure_workers_started();
        self.inner.jobs.increment();
        self.inner.stats.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
        self.inner.compute_queue.push_back(ComputeTask::Initial { entity, computation });
    }

    /// Idempotent: marks `(entity, kind)` as forced so the phase controller
    /// will not let it end in the intermediate state.
    pub fn force(&self, entity: E, kind: KindId) {
        self.ensure_workers_started();
        self.inner.jobs.increment();
        self.inner.update_queue.push_back(Update::Force { entity, kind });
    }

    /// Asserts no lazy computation is registered for `p`'s kind and
    /// enqueues an externally-provided final value.
    pub fn set(&self, entity: E, kind: KindId, value: PropertyRef) -> propstore_base::Result<()> {
        if self.inner.lazy_computations.lock().contains_key(&kind) {
            return Err(ContractViolation::SetOnLazyKind { detail: format!("kind {kind}").into() }.into());
        }
        self.ensure_workers_started();
        self.inner.jobs.increment();
        self.inner.update_queue.push_back(Update::Dispatch {
            result: PropertyComputationResult::ExternalResult { entity, kind, value },
            force_evaluation: false,
            force_depender_notification: false,
        });
        Ok(())
    }

    /// `handle_result` (§6): the funnel every computed result goes through.
    pub fn handle_result(
        &self,
        result: PropertyComputationResult<E>,
        force_evaluation: bool,
        force_depender_notification: bool,
    ) {
        self.ensure_workers_started();
        self.inner.jobs.increment();
        self.inner.update_queue.push_back(Update::Dispatch { result, force_evaluation, force_depender_notification });
    }

    /// May trigger a lazy computation; may return `EPK` (§4.6).
    pub fn get(&self, entity: E, kind: KindId) -> EOptionP<E> {
        if let Some(eps) = self.inner.table.get(&entity, kind) {
            return eps;
        }
        let has_lazy = self.inner.lazy_computations.lock().contains_key(&kind);
        if has_lazy {
            if self.inner.config.fast_track_enabled {
                if let Some(value) = self.try_fast_track(&entity, kind) {
                    self.inner.stats.fast_track_hits.fetch_add(1, Ordering::Relaxed);
                    self.ensure_workers_started();
                    self.inner.jobs.increment();
                    self.inner.update_queue.push_front(Update::Dispatch {
                        result: PropertyComputationResult::IdempotentResult { entity: entity.clone(), kind, value },
                        force_evaluation: false,
                        force_depender_notification: false,
                    });
                    return EOptionP::epk(entity, kind);
                }
            }
            self.ensure_workers_started();
            self.inner.jobs.increment();
            self.inner.update_queue.push_front(Update::TriggerLazy { entity: entity.clone(), kind });
            return EOptionP::epk(entity, kind);
        }

        let computed = self.inner.computed_kinds.lock().get(kind);
        let delayed = self.inner.delayed_kinds.lock().get(kind);
        if !computed && !delayed {
            if let Some(descriptor) = self.inner.kinds.lock().get(kind).cloned() {
                let value = (descriptor.fallback)(self, &entity);
                self.inner.stats.fallbacks_used.fetch_add(1, Ordering::Relaxed);
                self.inner.config.tracer.fallback_used(&entity, kind);
                self.ensure_workers_started();
                self.inner.jobs.increment();
                self.inner.update_queue.push_front(Update::Dispatch {
                    result: PropertyComputationResult::IdempotentResult { entity: entity.clone(), kind, value },
                    force_evaluation: false,
                    force_depender_notification: false,
                });
            }
        }
        EOptionP::epk(entity, kind)
    }

    /// Hook point for a fast-track approximator; none is wired in by
    /// default. A client that wants one can register it out of band and
    /// override `StoreConfig` accordingly — the store's job is just to
    /// consult it when present (§4.6, §6).
    fn try_fast_track(&self, _entity: &E, _kind: KindId) -> Option<PropertyRef> {
        None
    }

    /// Sets up a new phase: which kinds are computed, which are delayed.
    /// Must not overlap with running work (§3 Lifecycles).
    pub fn setup_phase(&self, computed_kinds: &[KindId], delayed_kinds: &[KindId]) -> propstore_base::Result<()> {
        if self.inner.phase_running.swap(true, Ordering::SeqCst) {
            return Err(propstore_base::err("setup_phase called while a phase is already running"));
        }
        *self.inner.computed_kinds.lock() = computed_kinds.iter().copied().collect();
        *self.inner.delayed_kinds.lock() = delayed_kinds.iter().copied().collect();
        self.inner.phase_locked.store(true, Ordering::SeqCst);
        self.ensure_workers_started();
        Ok(())
    }

    /// Blocks until quiescence: fallback injection, closed-SCC resolution,
    /// and leftover finalization interleave in rounds (§4.7) until none of
    /// the three produce new work.
    pub fn wait_on_phase_completion(&self) -> propstore_base::Result<()> {
        loop {
            self.inner.jobs.wait_until_zero();
            if self.inner.is_shutdown() {
                break;
            }
            let (tx, rx) = std::sync::mpsc::sync_channel(1);
            self.inner.jobs.increment();
            self.inner.update_queue.push_front(Update::RunQuiescenceRound { reply: tx });
            let made_progress = rx.recv().unwrap_or(false);
            if !made_progress {
                self.inner.stats.quiescence_count.fetch_add(1, Ordering::Relaxed);
                self.inner.config.tracer.quiescence_reached();
                break;
            }
        }
        self.inner.phase_running.store(false, Ordering::SeqCst);
        let mut first_error = self.inner.first_error.lock();
        match first_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> crate::tracer::StatsSnapshot {
        self.inner.stats.snapshot()
    }

    fn ensure_workers_started(&self) {
        let mut threads = self.inner.threads.lock();
        if threads.is_some() {
            return;
        }
        let mut handles = Vec::new();
        let updates_store = self.inner.clone();
        handles.push(std::thread::spawn(move || workers::run_updates_worker(updates_store)));
        for _ in 0..self.inner.config.compute_workers {
            let compute_store = self.inner.clone();
            handles.push(std::thread::spawn(move || workers::run_compute_worker(compute_store)));
        }
        *threads = Some(handles);
    }

    /// Cooperative shutdown: drains both deques, interrupts every worker,
    /// and joins their threads (§5).
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.compute_queue.close();
        self.inner.update_queue.close();
        let handles = self.inner.threads.lock().take();
        if let Some(handles) = handles {
            for h in handles {
                let _ = h.join();
            }
        }
    }
}

impl<E: Entity> Drop for PropertyStore<E> {
    fn drop(&mut self) {
        // Only the last handle tears the workers down.
        if Arc::strong_count(&self.inner) == 1 {
            self.shutdown();
        }
    }
}
