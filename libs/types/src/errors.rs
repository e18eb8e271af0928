//! Error types for the management journal
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Failure reported by a management delegate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManagementError {
    #[error("Object not found: {pid}")]
    ObjectNotFound { pid: String },

    #[error("Object already exists: {pid}")]
    ObjectExists { pid: String },

    #[error("Datastream not found: {pid}/{ds_id}")]
    DatastreamNotFound { pid: String, ds_id: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Journal failure: {reason}")]
    Journal { reason: String },

    #[error("Repository failure: {message}")]
    Repository { message: String },
}

/// A journal entry's arguments do not match its method's signature
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgumentError {
    #[error("Unknown management method: {method}")]
    UnknownMethod { method: String },

    #[error("{method}: missing argument {name}")]
    Missing { method: String, name: String },

    #[error("{method}: expected argument {expected}, found {found}")]
    NameMismatch {
        method: String,
        expected: String,
        found: String,
    },

    #[error("{method}: argument {name} should be {expected}, found {found}")]
    TypeMismatch {
        method: String,
        name: String,
        expected: String,
        found: String,
    },

    #[error("{method}: unexpected argument {name}")]
    Unexpected { method: String, name: String },
}
