//! A concurrent fixed-point engine for interdependent property
//! computations: entities get assigned properties, property computations
//! can depend on each other's (possibly not-yet-final) results, and the
//! store drives the whole graph to quiescence — injecting fallbacks and
//! resolving closed cycles along the way.
//!
//! The store never knows what a "property" means to its caller. It only
//! ever asks three things of a computed value: which kind it belongs to
//! (`PropertyValue::kind_id`), whether it equals another value of that kind
//! (`value_eq`), and whether it is ordered at or below another value in
//! that kind's own refinement lattice (`le`). Everything else — purity,
//! reachability, escape state, whatever a client analysis is actually
//! computing — is opaque to this crate.

mod config;
mod depgraph;
mod dispatcher;
mod entity;
mod kind;
mod property;
mod queue;
mod result;
mod scc;
mod scheduler;
mod store;
mod table;
mod task;
mod tracer;
mod workers;

pub use config::StoreConfig;
pub use entity::Entity;
pub use kind::{FallbackFn, KindId, KindRegistry, PropertyKind, ResolveCycleFn};
pub use property::{EOptionP, PropertyRef, PropertyValue};
pub use result::{ComputationFn, Continuation, Hint, PartialFn, PropertyComputationResult};
pub use store::PropertyStore;
pub use tracer::{NoopTracer, PhaseTracer, Stats, StatsSnapshot, TracingTracer};

pub use propstore_base::{err, ContractViolation, Error, Result};
