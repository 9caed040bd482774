//! Error types
//!
//! Only construction and loading can fail. The tick loop itself never
//! returns an error: maneuver failure is a boolean outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("{entity} dimensions must be positive (width {width}, length {length})")]
    NonPositiveDimensions {
        entity: &'static str,
        width: f32,
        length: f32,
    },

    #[error("{0} must be finite")]
    NonFinite(&'static str),

    #[error("parking space id must not be empty")]
    EmptySpaceId,

    #[error("duplicate parking space id {0:?}")]
    DuplicateSpaceId(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for the crate.
pub type SimResult<T> = Result<T, SimError>;
