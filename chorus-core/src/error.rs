//! Error types for Chorus operations

use crate::{MemoryCategory, MemoryOperation};
use thiserror::Error;

/// Envelope and request validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("request_id is required for response messages")]
    MissingRequestId,

    #[error("invalid memory request: missing required fields")]
    RequiredFieldMissing { field: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Lookup errors for string-keyed vocabulary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown memory type: {memory_type}")]
    UnknownMemoryType { memory_type: String },

    #[error("invalid operation: {operation}")]
    UnknownOperation { operation: String },
}

/// Policy denial errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("access denied: {agent} cannot {operation} {category} memory")]
    AccessDenied {
        agent: String,
        operation: MemoryOperation,
        category: MemoryCategory,
    },
}

/// Storage collaborator errors, wrapped at the boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("storage write failed: {reason}")]
    WriteFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Chorus errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChorusError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Chorus operations.
pub type ChorusResult<T> = Result<T, ChorusError>;

// =============================================================================
// TESTS
// =============================================================================
