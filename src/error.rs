//! Error types for the learning-curve engine

use thiserror::Error;

/// Errors that can occur while building a combined curve
#[derive(Debug, Error)]
pub enum CurveError {
    #[error("Group '{group}' has no member series")]
    InvalidGroup { group: String },

    #[error("Malformed positions for member '{member}' of group '{group}': {fault}")]
    MalformedPosition {
        group: String,
        member: String,
        fault: PositionFault,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse run table: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CurveError {
    /// Name of the group the error belongs to, if it is group-scoped
    pub fn group(&self) -> Option<&str> {
        match self {
            CurveError::InvalidGroup { group } | CurveError::MalformedPosition { group, .. } => {
                Some(group)
            }
            _ => None,
        }
    }
}

/// Ways a position sequence can fail validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionFault {
    #[error("{positions} positions supplied for {values} samples")]
    LengthMismatch { values: usize, positions: usize },

    #[error("position at index {index} is lower than its predecessor or not a number")]
    Decreasing { index: usize },

    #[error("cumulative positioning requested but no positions were supplied")]
    Missing,
}
