//! Error types and result types for adapter operations.
//!
//! Every fallible operation in the adapter returns [`AdapterResult<T>`]. Backends
//! translate their driver errors into [`AdapterError`]; only uniqueness violations
//! are given a distinguished kind ([`AdapterError::Conflict`]), everything else
//! reported by a store surfaces as [`AdapterError::Storage`].

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to the adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Missing or invalid setup (connection address, schema declarations).
    /// Fatal, surfaced immediately and never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// An operation was attempted without a live store handle.
    #[error("Not connected to a store")]
    NotConnected,
    /// The store rejected a write because of a uniqueness violation.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Any other failure reported by the underlying store.
    #[error("Storage error: {0}")]
    Storage(String),
    /// The record type is not declared in the schema.
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),
    /// The query options cannot be compiled (e.g. a mixed projection).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// A record or update directive has an invalid shape.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AdapterError {
    /// Returns `true` if this error is a uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AdapterError::Conflict(_))
    }
}

/// A specialized `Result` type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

impl From<BsonError> for AdapterError {
    fn from(err: BsonError) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for AdapterError {
    fn from(err: SerdeJsonError) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}
