use crate::optimization::EvalError;

use super::ConfigError;

/// Errors that can occur during an SQP solve.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("program error: {0}")]
    Program(Box<dyn std::error::Error + Send + Sync>),

    #[error("program returned a non-finite value at iteration {iter}")]
    NonFinite { iter: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("{what} has {actual} entries, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl<PE> From<EvalError<PE>> for Error
where
    PE: std::error::Error + Send + Sync + 'static,
{
    fn from(error: EvalError<PE>) -> Self {
        match error {
            EvalError::Program(e) => Self::Program(Box::new(e)),
            EvalError::Dimension {
                what,
                expected,
                actual,
            } => Self::DimensionMismatch {
                what,
                expected,
                actual,
            },
        }
    }
}
