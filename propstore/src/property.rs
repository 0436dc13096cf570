// Lattice primitives (§4.1) and the entity/optional-property type (§3).
//
// A property value is opaque to the store: it is whatever lattice element a
// client analysis defines (purity, immutability, escape state, ...). The
// store only ever needs three things from it: which kind it belongs to,
// whether it equals another value of the same kind, and whether it is
// ordered at-or-below another value of the same kind in that kind's
// refinement order. Everything else is downcast by client code that knows
// the concrete type.

use std::fmt::Debug;
use std::sync::Arc;

use downcast_rs::{impl_downcast, Downcast};

use crate::entity::Entity;
use crate::kind::KindId;

/// A single lattice element belonging to exactly one property kind.
///
/// `le` is the kind's refinement order: `self.le(other)` holds when `self`
/// is no more refined than `other` (read "self ⊑ other"). A monotone
/// update from `(lb, ub)` to `(lb', ub')` must satisfy `lb.le(&lb')` (the
/// lower bound has only grown) and `ub'.le(&ub)` (the upper bound has only
/// shrunk) — Invariant 2.
pub trait PropertyValue: Downcast + Debug + Send + Sync {
    fn kind_id(&self) -> KindId;
    fn le(&self, other: &dyn PropertyValue) -> bool;
    fn value_eq(&self, other: &dyn PropertyValue) -> bool;
}
impl_downcast!(PropertyValue);

pub type PropertyRef = Arc<dyn PropertyValue>;

/// Entity/optional-property: either a bare key with no value yet (`EPK`),
/// or a key with current bounds (`EPS`), which is final exactly when its
/// bounds coincide (`FinalEP`).
#[derive(Clone, Debug)]
pub enum EOptionP<E: Entity> {
    EPK { entity: E, kind: KindId },
    EPS { entity: E, kind: KindId, lb: PropertyRef, ub: PropertyRef },
}

impl<E: Entity> EOptionP<E> {
    pub fn epk(entity: E, kind: KindId) -> Self {
        EOptionP::EPK { entity, kind }
    }

    pub fn final_ep(entity: E, kind: KindId, value: PropertyRef) -> Self {
        EOptionP::EPS { entity, kind, lb: value.clone(), ub: value }
    }

    pub fn intermediate(entity: E, kind: KindId, lb: PropertyRef, ub: PropertyRef) -> Self {
        EOptionP::EPS { entity, kind, lb, ub }
    }

    pub fn entity(&self) -> &E {
        match self {
            EOptionP::EPK { entity, .. } => entity,
            EOptionP::EPS { entity, .. } => entity,
        }
    }

    pub fn kind(&self) -> KindId {
        match self {
            EOptionP::EPK { kind, .. } => *kind,
            EOptionP::EPS { kind, .. } => *kind,
        }
    }

    pub fn has_property(&self) -> bool {
        matches!(self, EOptionP::EPS { .. })
    }

    /// `lb = ub`: once true it is an invariant violation for it to become
    /// false again (Invariant 3).
    pub fn is_final(&self) -> bool {
        match self {
            EOptionP::EPK { .. } => false,
            EOptionP::EPS { lb, ub, .. } => Arc::ptr_eq(lb, ub) || lb.value_eq(ub.as_ref()),
        }
    }

    pub fn as_final(&self) -> Option<&PropertyRef> {
        match self {
            EOptionP::EPS { lb, .. } if self.is_final() => Some(lb),
            _ => None,
        }
    }

    pub fn lb(&self) -> Option<&PropertyRef> {
        match self {
            EOptionP::EPS { lb, .. } => Some(lb),
            EOptionP::EPK { .. } => None,
        }
    }

    pub fn ub(&self) -> Option<&PropertyRef> {
        match self {
            EOptionP::EPS { ub, .. } => Some(ub),
            EOptionP::EPK { .. } => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A minimal two-point lattice (`Bottom ⊑ Value(n)` for any `n`,
    /// all `Value`s mutually incomparable except by equality) used by unit
    /// tests that need a concrete `PropertyValue` without pulling in a
    /// whole client analysis.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TestProp {
        Bottom(KindId),
        Value(KindId, i64),
    }

    impl PropertyValue for TestProp {
        fn kind_id(&self) -> KindId {
            match self {
                TestProp::Bottom(k) => *k,
                TestProp::Value(k, _) => *k,
            }
        }

        fn le(&self, other: &dyn PropertyValue) -> bool {
            let Some(other) = other.downcast_ref::<TestProp>() else { return false };
            match (self, other) {
                (TestProp::Bottom(_), _) => true,
                (TestProp::Value(_, a), TestProp::Value(_, b)) => a == b,
                (TestProp::Value(..), TestProp::Bottom(_)) => false,
            }
        }

        fn value_eq(&self, other: &dyn PropertyValue) -> bool {
            other.downcast_ref::<TestProp>().map(|o| o == self).unwrap_or(false)
        }
    }
}
