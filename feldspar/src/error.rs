use thiserror::Error;

use crate::properties::PhysicalPropertySet;

pub type OptResult<T> = anyhow::Result<T>;

/// Failures a caller of the optimizer may want to tell apart.
///
/// Contract violations inside the search (pattern mismatches, deriving a required-only
/// property) are bugs and panic instead.
#[derive(Error, Debug)]
pub enum OptError {
    #[error("table {0} not found in catalog")]
    TableNotFound(String),
    #[error("no rule registered for {0}")]
    RuleNotFound(String),
    #[error("search stopped after {0} tasks")]
    SearchBudgetExceeded(usize),
    #[error("no plan satisfies {0:?}")]
    NoPlanFound(PhysicalPropertySet),
    #[error("invalid optimizer config: {0}")]
    InvalidConfig(String),
}
