// We want a few things here:
// 1. A way to create a new error with a backtrace
// 2. A way to centralize setting a breakpoint to trap any error in the system fairly soon
//    after it's created (or at least when it's propagated from a library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging system

use std::borrow::Cow;
use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

#[derive(Debug)]
#[allow(dead_code)]
pub struct Error(DynBacktraceError);
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl std::fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {
    fn description(&self) -> &str {
        &self.0
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(err)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(err: E) -> Error {
        error!(target: "propstore", "{:?}", err);
        let dbe = DynBacktraceError::from(err);
        Error(dbe)
    }
}

pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    let err = SimpleErr(msg.into());
    Error::new(err)
}

/// A violation of one of the store's hard invariants (illegal monotone
/// refinement, mutating a final value, double-registering a lazy
/// computation for one kind, registering past phase setup). These are
/// always fatal: the first one observed stops the workers and is re-raised
/// from `wait_on_phase_completion`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    NonMonotonicUpdate { detail: Cow<'static, str> },
    FinalValueMutated { detail: Cow<'static, str> },
    DuplicateLazyRegistration { detail: Cow<'static, str> },
    LatePhaseRegistration { detail: Cow<'static, str> },
    SetOnLazyKind { detail: Cow<'static, str> },
}

impl std::fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractViolation::NonMonotonicUpdate { detail } => {
                write!(f, "non-monotonic property update: {detail}")
            }
            ContractViolation::FinalValueMutated { detail } => {
                write!(f, "attempt to mutate a final value: {detail}")
            }
            ContractViolation::DuplicateLazyRegistration { detail } => {
                write!(f, "duplicate lazy computation registration: {detail}")
            }
            ContractViolation::LatePhaseRegistration { detail } => {
                write!(f, "lazy computation registered after phase setup: {detail}")
            }
            ContractViolation::SetOnLazyKind { detail } => {
                write!(f, "set() called for a kind with a registered lazy computation: {detail}")
            }
        }
    }
}

impl std::error::Error for ContractViolation {}

#[test]
fn test_error() {
    let _err = err("test error");
}

#[test]
fn test_contract_violation_displays() {
    let cv = ContractViolation::NonMonotonicUpdate { detail: "k=0 e=1".into() };
    assert!(format!("{cv}").contains("non-monotonic"));
    let wrapped: Error = cv.into();
    let _ = wrapped;
}
