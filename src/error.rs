//! Error types for Teselar

use crate::autograd::InvalidType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Value error: {0}")]
    ValueError(String),

    #[error("Invalid type:\n{0}")]
    InvalidType(#[from] InvalidType),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid gradient: {0}")]
    InvalidGradient(String),

    #[error("Backward operation failed: {0}")]
    BackwardFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::convert::Infallible> for Error {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
