use thiserror::Error;
use moa_core::error::{DataError, MoaError};
use moa_rl::error::{MoaRlError, TensorError};

/// Errors of rollout collection, embedding and plotting.
#[derive(Error, Debug)]
pub enum VizError{
    #[error("Basic moa error: {source}")]
    Moa{
        #[source]
        source: MoaError
    },
    #[error("Policy error: {source}")]
    Rl{
        #[source]
        source: MoaRlError
    },
    #[error("Embedding table {path:}: {explanation:}")]
    Csv{
        path: String,
        explanation: String,
    },
    #[error("Cannot capture frame to {path:}: {explanation:}")]
    Capture{
        path: String,
        explanation: String,
    },
    #[error("Embedding requires at least {required} samples, got {samples}")]
    TooFewSamples{
        samples: usize,
        required: usize,
    },
    #[error("Palette has {palette} colors, cannot plot {actors} actors")]
    TooManyActors{
        actors: usize,
        palette: usize,
    },
    #[error("Policy for {policy} used with environment {env}")]
    EnvironmentMismatch{
        policy: String,
        env: String,
    },
}

impl From<MoaError> for VizError{
    fn from(value: MoaError) -> Self {
        Self::Moa{source: value}
    }
}

impl From<DataError> for VizError{
    fn from(value: DataError) -> Self {
        Self::Moa{source: value.into()}
    }
}

impl From<MoaRlError> for VizError{
    fn from(value: MoaRlError) -> Self {
        Self::Rl{source: value}
    }
}

impl From<TensorError> for VizError{
    fn from(value: TensorError) -> Self {
        Self::Rl{source: value.into()}
    }
}
