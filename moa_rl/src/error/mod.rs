mod tensor;
pub use tensor::*;

use tch::TchError;
use thiserror::Error;
use moa_core::error::{DataError, MoaError};


/// Error type wrapping standard [`MoaError`]
#[derive(Error, Debug)]
pub enum MoaRlError{
    /// Variant - [`MoaError`]
    #[error("Basic moa error: {source}")]
    Moa{
        #[source]
        source: MoaError
    },
    /// Errors in tensor processing.
    #[error("Tensor operation error: \"{error}\"")]
    Tensor{
        #[source]
        error: TensorError
    },
    /// Policy artifact could not be written or read.
    #[error("Policy artifact {path:}: {explanation:}")]
    Artifact{
        path: String,
        explanation: String,
    },
    #[error("Action tensor does not fit action space {space:}: {context:}")]
    ActionSpaceMismatch{
        space: String,
        context: String,
    },
    #[error("Invalid policy architecture: {explanation:}")]
    InvalidPolicySpec{
        explanation: String,
    },
    #[error("Empty training data")]
    NoTrainingData,
}

impl From<TchError> for MoaRlError{
    fn from(value: TchError) -> Self {
        Self::Tensor{
            error: TensorError::from_tch_with_context(value, String::from("unspecified"))
        }
    }
}

impl From<TensorError> for MoaRlError{
    fn from(value: TensorError) -> Self {
        Self::Tensor{error: value}
    }
}

impl From<MoaError> for MoaRlError{
    fn from(value: MoaError) -> Self {
        Self::Moa{source: value}
    }
}

impl From<DataError> for MoaRlError{
    fn from(value: DataError) -> Self {
        Self::Moa{source: value.into()}
    }
}
