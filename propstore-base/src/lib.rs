mod error;
mod kindset;

pub use error::{err, ContractViolation, Error, Result};
pub use kindset::KindSet;
