//! Storage backend abstraction for the adapter.
//!
//! This module defines the document-oriented protocol every store must provide:
//! filtered reads with projection, sort, offset and limit; independent counts; batch
//! inserts; single-document updates by identifier; deletes by filter; and
//! session-scoped transactions.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The protocol spoken by the adapter to a live store
//! - [`StoreConnector`]: Factory opening a backend from an [`AdapterConfig`]
//!
//! Every operation accepts an optional session. Operations given a session are
//! scoped to that session's transaction and invisible to other callers until it
//! commits; operations without one take effect immediately.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{
    config::AdapterConfig,
    error::AdapterResult,
    query::{Expr, Query},
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must support concurrent calls from multiple async tasks; the
/// adapter issues a read and a count for the same query at the same time.
///
/// # Error Handling
///
/// A uniqueness violation on insert must be reported as
/// [`AdapterError::Conflict`](crate::error::AdapterError::Conflict). Everything
/// else the store reports should surface as
/// [`AdapterError::Storage`](crate::error::AdapterError::Storage).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Transaction handle issued by [`StoreBackend::start_transaction`].
    type Session: Send + Sync;

    /// Returns the documents of `collection` selected by `query`.
    ///
    /// # Arguments
    ///
    /// * `collection` - The collection to read
    /// * `query` - Filter, projection, sort, offset and limit, in stored field names
    /// * `session` - The transaction to read within, if any
    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        session: Option<&Self::Session>,
    ) -> AdapterResult<Vec<Document>>;

    /// Counts the documents of `collection` matching `filter` (all of them when `None`).
    async fn count_documents(
        &self,
        collection: &str,
        filter: Option<&Expr>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64>;

    /// Inserts a batch of documents, each carrying its identifier under `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Conflict`](crate::error::AdapterError::Conflict) if an
    /// identifier is already taken or repeated within the batch. Whether earlier
    /// documents of the batch remain inserted is up to the store.
    async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<()>;

    /// Applies update modifiers (`$set`, `$push`, `$pull`, ...) to one document.
    ///
    /// # Returns
    ///
    /// The number of documents actually modified (0 or 1).
    async fn update_document(
        &self,
        collection: &str,
        id: &Bson,
        modifiers: Document,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64>;

    /// Deletes the documents of `collection` matching `filter` (all of them when `None`).
    ///
    /// # Returns
    ///
    /// The number of documents removed.
    async fn delete_documents(
        &self,
        collection: &str,
        filter: Option<&Expr>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64>;

    /// Opens a session with an active transaction.
    async fn start_transaction(&self) -> AdapterResult<Self::Session>;

    /// Commits the session's transaction and ends the session.
    async fn commit_transaction(&self, session: Self::Session) -> AdapterResult<()>;

    /// Rolls back the session's transaction and ends the session.
    async fn abort_transaction(&self, session: Self::Session) -> AdapterResult<()>;

    /// Releases the backend's resources.
    ///
    /// The default implementation is a no-op; backends holding external
    /// connections should override it.
    async fn shutdown(&self) -> AdapterResult<()> {
        Ok(())
    }
}

/// Factory that opens a [`StoreBackend`] from configuration.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Backend: StoreBackend + 'static;

    /// Opens a live backend.
    ///
    /// The URL is already known to be present when this is called.
    async fn connect(&self, config: &AdapterConfig) -> AdapterResult<Self::Backend>;
}
