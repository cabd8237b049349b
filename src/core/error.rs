use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The explicit offset field and the event list together may name at most
    /// one early retirement.
    #[error("at most one early retirement may be supplied, found {count}")]
    ConflictingEarlyRetirement { count: usize },

    #[error("export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
