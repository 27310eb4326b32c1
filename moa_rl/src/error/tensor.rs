use tch::TchError;
use thiserror::Error;


/// Error in tensor computation or in conversion of data to and from tensors
#[derive(Error, Debug, Clone)]
pub enum TensorError{
    #[error("Error originating in tch crate's function: {origin:}, in context: {context:}")]
    Torch{
        origin: String,
        context: String
    },
    #[error("Tensor of shape {shape:?} does not fit expected shape {expected:?} ({context:})")]
    Shape{
        shape: Vec<i64>,
        expected: Vec<i64>,
        context: String,
    },
}

impl TensorError{
    pub fn from_tch_with_context(error: TchError, context: String) -> Self{
        Self::Torch{
            origin: format!("{error}"),
            context,
        }
    }
}

impl From<TchError> for TensorError{
    fn from(value: TchError) -> Self {
        Self::from_tch_with_context(value, "unspecified".into())
    }
}
