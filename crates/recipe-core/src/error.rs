//! Error types for the recipe sync engine.

use thiserror::Error;

/// A shared error type for every recipe-sync crate.
///
/// Variants follow the failure taxonomy of the engine: lookups that miss,
/// invalid input, backend (network/storage) failures, and the usual
/// infrastructure errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecipeError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Input rejected before reaching storage
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend persistence failure (load/save/delete)
    #[error("Backend error: {0}")]
    Backend(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", "ZIP"
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecipeError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a Backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Serialization error for the given format
    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a Backend error
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// Check if this is a Validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for RecipeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for RecipeError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for RecipeError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization("TOML", err.to_string())
    }
}

impl From<toml::ser::Error> for RecipeError {
    fn from(err: toml::ser::Error) -> Self {
        Self::serialization("TOML", err.to_string())
    }
}

/// A type alias for `Result<T, RecipeError>`.
pub type Result<T> = std::result::Result<T, RecipeError>;
