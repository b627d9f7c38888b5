//! Error types for model conversions.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while converting or merging entity data.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A payload named a field the entity does not have.
    #[error("unknown field `{field}` for {entity_type}")]
    UnknownField {
        /// Entity type the payload was applied to.
        entity_type: &'static str,
        /// The offending field name.
        field: String,
    },

    /// A payload field had a value of the wrong shape.
    #[error("invalid value for field `{field}`: {message}")]
    InvalidField {
        /// The field name.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// A numeric or textual code did not map to any variant.
    #[error("invalid {kind} code: {code}")]
    InvalidCode {
        /// Name of the enum being decoded.
        kind: &'static str,
        /// The rejected code.
        code: String,
    },

    /// A payload was not a JSON object.
    #[error("payload must be an object")]
    NotAnObject,

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Creates an invalid-field error.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-code error.
    pub fn invalid_code(kind: &'static str, code: impl ToString) -> Self {
        Self::InvalidCode {
            kind,
            code: code.to_string(),
        }
    }
}
