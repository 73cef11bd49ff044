use crate::PartId;
use thiserror::Error;

/// Calculation error taxonomy
///
/// `Clone` so that concurrent waiters on a single-flight fetch can each
/// observe the failure; errors themselves are never memoized.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("part not found: {0}")]
    PartNotFound(PartId),

    #[error("cycle detected in BOM: {}", format_path(.0))]
    CycleDetected(Vec<PartId>),

    #[error("invalid demand: {0}")]
    Validation(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("calculation canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl CalcError {
    /// Process exit code for non-interactive invocations
    pub fn exit_code(&self) -> i32 {
        match self {
            CalcError::Configuration(_) => 2,
            CalcError::Transport(_) => 3,
            CalcError::PartNotFound(_)
            | CalcError::CycleDetected(_)
            | CalcError::Validation(_)
            | CalcError::InvalidQuantity(_) => 4,
            CalcError::Canceled | CalcError::DeadlineExceeded => 5,
        }
    }

    /// Transport-class errors are the only retryable kind
    pub fn is_transport(&self) -> bool {
        matches!(self, CalcError::Transport(_))
    }
}

fn format_path(path: &[PartId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, CalcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CalcError::Configuration("x".into()).exit_code(), 2);
        assert_eq!(CalcError::Transport("x".into()).exit_code(), 3);
        assert_eq!(CalcError::PartNotFound(PartId(7)).exit_code(), 4);
        assert_eq!(CalcError::CycleDetected(vec![]).exit_code(), 4);
        assert_eq!(CalcError::Validation("x".into()).exit_code(), 4);
        assert_eq!(CalcError::Canceled.exit_code(), 5);
        assert_eq!(CalcError::DeadlineExceeded.exit_code(), 5);
    }

    #[test]
    fn test_cycle_display_shows_path() {
        let err = CalcError::CycleDetected(vec![PartId(100), PartId(110), PartId(100)]);
        assert_eq!(
            err.to_string(),
            "cycle detected in BOM: 100 -> 110 -> 100"
        );
    }
}
