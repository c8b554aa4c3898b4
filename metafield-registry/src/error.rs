//! Error types for the field registry

use std::path::PathBuf;
use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Broad classification of a [`RegistryError`].
///
/// Caller errors are the checked surface of the registry. Internal errors
/// signal an environment failure (disk, serialization) rather than bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    ValidationFailed,
    Internal,
}

/// Errors that can occur in field registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A field with this name is already registered
    #[error("field already exists: {name}")]
    FieldAlreadyExists { name: String },

    /// Field not found by name
    #[error("field not found: {name}")]
    FieldNotFound { name: String },

    /// Collection not found by id
    #[error("collection not found: {id}")]
    CollectionNotFound { id: String },

    /// A collection with this id already exists
    #[error("collection already exists: {id}")]
    CollectionAlreadyExists { id: String },

    /// The field definition (or a value checked against it) was rejected
    #[error("validation failed for field '{field}': {}", errors.join("; "))]
    ValidationFailed { field: String, errors: Vec<String> },

    /// A taxonomy string did not name a known variant
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// `save_to_disk` was called with no path and no configured storage
    #[error("no storage path configured or supplied")]
    NoStoragePath,

    /// Snapshot file could not be parsed
    #[error("invalid snapshot at {path}: {source}")]
    InvalidSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be extracted
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl RegistryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FieldAlreadyExists { .. } | Self::CollectionAlreadyExists { .. } => {
                ErrorKind::AlreadyExists
            }
            Self::FieldNotFound { .. } | Self::CollectionNotFound { .. } => ErrorKind::NotFound,
            Self::ValidationFailed { .. } | Self::UnknownVariant { .. } => {
                ErrorKind::ValidationFailed
            }
            Self::NoStoragePath
            | Self::InvalidSnapshot { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// True for errors caused by caller input (4xx-equivalent at an API boundary).
    pub fn is_client_error(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }
}

impl From<figment::Error> for RegistryError {
    fn from(e: figment::Error) -> Self {
        RegistryError::Config(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::FieldNotFound {
            name: "iso_speed".into(),
        };
        assert_eq!(err.to_string(), "field not found: iso_speed");
    }

    #[test]
    fn test_validation_error_joins_messages() {
        let err = RegistryError::ValidationFailed {
            field: "patient_id".into(),
            errors: vec!["description is empty".into(), "bad example".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("patient_id"));
        assert!(msg.contains("description is empty; bad example"));
    }

    #[test]
    fn test_error_classification() {
        let dup = RegistryError::FieldAlreadyExists { name: "x".into() };
        assert_eq!(dup.kind(), ErrorKind::AlreadyExists);
        assert!(dup.is_client_error());

        let missing = RegistryError::CollectionNotFound { id: "c".into() };
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let io = RegistryError::Io(std::io::Error::other("disk full"));
        assert_eq!(io.kind(), ErrorKind::Internal);
        assert!(!io.is_client_error());
        assert!(!RegistryError::NoStoragePath.is_client_error());
    }
}
