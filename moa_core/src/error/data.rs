use thiserror::Error;
use crate::error::MoaError;

#[derive(Debug, Clone, Error)]
pub enum DataError{
    #[error("Data should have the same length, but left is {left:} and right is {right:}. {context:}")]
    LengthMismatch{
        left: usize,
        right: usize,
        context: String,
    },
    #[error("Table has {filled:} of {expected:} rows filled")]
    IncompleteTable{
        filled: usize,
        expected: usize,
    },
    #[error("Table is already full ({capacity:} rows)")]
    TableFull{
        capacity: usize,
    },
    #[error("Malformed table in line {line:}: {context:}")]
    Malformed{
        line: usize,
        context: String,
    },
    #[error("Label {label:} is out of range [0, {limit:})")]
    LabelOutOfRange{
        label: usize,
        limit: usize,
    }
}

impl From<DataError> for MoaError{
    fn from(source: DataError) -> MoaError{
        MoaError::Data{
            error: source,
        }
    }
}
