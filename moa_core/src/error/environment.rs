use thiserror::Error;
use crate::error::MoaError;

/// Errors raised by environments implementing [`Environment`](crate::env::Environment).
#[derive(Debug, Clone, Error)]
pub enum EnvironmentError{
    #[error("Environment not initialized. Use reset().")]
    NotInitialized,
    #[error("Episode has finished after {steps} steps. Use reset().")]
    EpisodeFinished{
        steps: usize,
    },
    #[error("Action {action:} does not match action space {space:}")]
    ActionMismatch{
        action: String,
        space: String,
    },
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),
}

impl From<EnvironmentError> for MoaError{
    fn from(source: EnvironmentError) -> MoaError{
        MoaError::Environment{
            source
        }
    }
}
