use std::fmt;

/// Errors raised while interpreting model values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownMediaKind(String),
    UnknownSlot(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownMediaKind(value) => {
                write!(f, "unknown media kind: {value}")
            }
            ModelError::UnknownSlot(value) => {
                write!(f, "unknown hero slot: {value}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
