// Explicit, constructor-passed configuration rather than ambient globals
// (Design Note: "Global mutable state").

use std::sync::Arc;

use crate::entity::Entity;
use crate::tracer::{NoopTracer, PhaseTracer};

pub struct StoreConfig<E: Entity> {
    /// Number of compute workers. There is always exactly one additional
    /// updates worker on top of this (§4.4).
    pub compute_workers: usize,
    /// Whether `get` on a lazily-computed kind should first attempt the
    /// kind's fast-track approximator (§4.6).
    pub fast_track_enabled: bool,
    /// Whether to run the (non-fatal) debug-mode invariant checks of §7
    /// category 4.
    pub debug_assertions: bool,
    pub tracer: Arc<dyn PhaseTracer<E>>,
}

impl<E: Entity> StoreConfig<E> {
    pub fn new() -> Self {
        StoreConfig {
            compute_workers: num_cpus::get().max(1),
            fast_track_enabled: true,
            debug_assertions: cfg!(debug_assertions),
            tracer: Arc::new(NoopTracer),
        }
    }

    pub fn with_compute_workers(mut self, n: usize) -> Self {
        self.compute_workers = n.max(1);
        self
    }

    pub fn with_fast_track(mut self, enabled: bool) -> Self {
        self.fast_track_enabled = enabled;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn PhaseTracer<E>>) -> Self {
        self.tracer = tracer;
        self
    }
}

impl<E: Entity> Default for StoreConfig<E> {
    fn default() -> Self {
        Self::new()
    }
}
