//! Error types for WDL-to-CWL conversion.
//!
//! Conversion errors are fatal for the task or workflow being converted and
//! propagate up to the per-file driver, which logs them and moves on to the
//! next file. Best-effort degradations (unknown runtime keys) are logged as
//! warnings at the point of occurrence and do not surface here.

use thiserror::Error;

/// Main error type for the translator.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// An AST node kind, terminal token, function name, or construct has no
    /// translation rule. Fatal for the enclosing document.
    #[error("unsupported construct: {message}")]
    Unsupported { message: String },

    /// None of the expected version-specific attribute names is present on a
    /// node. Usually indicates a grammar-version mismatch.
    #[error("missing attribute on {node}: none of {candidates:?} present")]
    MissingAttribute {
        node: String,
        candidates: Vec<String>,
    },

    /// A workflow call references a task that was never converted.
    #[error("no such task: {name}")]
    NoSuchTask { name: String },

    /// Failure writing generated documents to disk.
    #[error("export error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure serializing a document model.
    #[error("serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failure deserializing a parsed syntax tree from its JSON dump.
    #[error("syntax tree error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        ConvertError::Unsupported {
            message: message.into(),
        }
    }

    pub fn missing_attribute(node: &str, candidates: &[&str]) -> Self {
        ConvertError::MissingAttribute {
            node: node.to_string(),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
