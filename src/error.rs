// src/error.rs

use std::io;
use thiserror::Error;

/// Result type for enumeration operations
pub type Result<T> = std::result::Result<T, EnumError>;

/// Errors raised while enumerating derivative structures
#[derive(Debug, Error)]
pub enum EnumError {
    /// Matrix handed to a decomposition is empty or not square
    #[error("Invalid matrix dimension: {rows}x{cols} (expected a non-empty square matrix)")]
    InvalidDimension { rows: usize, cols: usize },

    /// Bad user input: index, displacement set, operation lists, species count
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A logic defect was detected; results of the current run are invalid
    #[error("Internal consistency error ({context}): {detail}")]
    InternalConsistency { context: String, detail: String },

    #[error("Symmetry search failed: {0}")]
    Symmetry(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Enumeration cancelled")]
    Cancelled,
}

impl EnumError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        EnumError::Configuration(msg.into())
    }

    pub fn internal(context: impl Into<String>, detail: impl Into<String>) -> Self {
        EnumError::InternalConsistency {
            context: context.into(),
            detail: detail.into(),
        }
    }
}
