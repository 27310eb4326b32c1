use thiserror::Error;
use crate::error::{DataError, EnvironmentError};

/// Top level crate error, constructed from more specific error.
#[derive(Debug, Clone, Error)]
pub enum MoaError{
    /// Error raised by simulated environment.
    #[error("Environment error: {source}")]
    Environment{
        #[source]
        source: EnvironmentError
    },
    /// Error in rollout or embedding data - shape mismatches, malformed tables.
    #[error("Data error: {error}")]
    Data{
        #[source]
        error: DataError,
    },
    /// Standard Input/Output error.
    #[error("Error in I/O operation: {explanation:}")]
    IO{
        explanation: String
    },
    /// Custom error to return if error does not fit any other category.
    #[error("Custom: {0}")]
    Custom(String),
}

impl From<std::io::Error> for MoaError{
    fn from(value: std::io::Error) -> Self {
        Self::IO{
            explanation: format!("{value}")
        }
    }
}
