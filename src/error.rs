//! Error types for catalog construction and configuration
//!
//! These cover setup-time failures only. A payload that does not conform to
//! its schema is reported as data through [`crate::ValidationError`], never
//! through this type.

use thiserror::Error;

/// Result type for setup-time operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Catalog and configuration errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Schema already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid schema format at {path}: {reason}")]
    InvalidFormat { path: String, reason: String },

    #[error("Unsupported schema construct at {path}: {construct}")]
    Unsupported { path: String, construct: String },

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cyclic schema reference: {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    /// Shorthand for an [`SchemaError::InvalidFormat`] at `path`
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`SchemaError::Unsupported`] at `path`
    pub fn unsupported(path: impl Into<String>, construct: impl Into<String>) -> Self {
        SchemaError::Unsupported {
            path: path.into(),
            construct: construct.into(),
        }
    }
}
