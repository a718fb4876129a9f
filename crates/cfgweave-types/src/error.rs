use thiserror::Error;

/// Errors produced when converting configuration nodes.
#[derive(Debug, Error, PartialEq)]
pub enum NodeError {
    #[error("float at {path:?} is not finite: {value}")]
    NonFiniteFloat { path: String, value: f64 },

    #[error("deserialization error: {0}")]
    Deserialize(String),
}
