//! Error taxonomy for the planner

use thiserror::Error;

/// Errors that abort a planning run.
///
/// An unsatisfiable encoding or a solver timeout is not an error: those are
/// reported through [`crate::plan::PlanOutcome`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Rules, board or horizon are inconsistent. Raised before any solver call.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The solver backend is unavailable or crashed. Safe to retry.
    #[error("solver adapter failure: {0}")]
    AdapterFailure(String),
    /// The encoding or a witness broke an internal invariant.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl PlanError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn adapter(message: impl Into<String>) -> Self {
        Self::AdapterFailure(message.into())
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    /// Whether the failure may go away when the same input is submitted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AdapterFailure(_))
    }
}

pub type PlanResult<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_adapter_failures_retry() {
        assert!(PlanError::adapter("crashed").is_retryable());
        assert!(!PlanError::configuration("bad rule").is_retryable());
        assert!(!PlanError::encoding("bad witness").is_retryable());
    }

    #[test]
    fn test_display_includes_category() {
        let err = PlanError::configuration("pattern and replacement lengths differ");
        assert_eq!(
            err.to_string(),
            "configuration error: pattern and replacement lengths differ"
        );
    }
}
