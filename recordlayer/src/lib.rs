//! Main recordlayer crate providing a unified interface for record persistence.
//!
//! This crate is the primary entry point for users of recordlayer. It re-exports
//! the core types from the sub-crates and gives access to the storage backends.
//!
//! # Features
//!
//! - **Declarative schema** - Record types with typed fields and relations, validated once
//! - **Uniform CRUD** - Find, create, update and delete with the same contract on every backend
//! - **Array-aware queries** - Match, range and existence conditions that understand to-many fields
//! - **Transactions** - Optional session-scoped units of work
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlayer::{prelude::*, memory::InMemoryConnector};
//!
//! #[tokio::main]
//! async fn main() -> AdapterResult<()> {
//!     let schema = Schema::builder()
//!         .record_type("vocabulary", [
//!             FieldDescriptor::new("name", FieldKind::String),
//!             FieldDescriptor::to_many("translations", "vocabulary").inverse("translations"),
//!         ])
//!         .build()?;
//!
//!     let adapter = Adapter::new(schema, InMemoryConnector::new());
//!     adapter.connect(AdapterConfig::new().url("memory://")).await?;
//!
//!     let created = adapter
//!         .create("vocabulary", vec![
//!             Record::new().with("name", "casa"),
//!             Record::new().with("name", "house"),
//!         ])
//!         .await?;
//!
//!     let (casa, house) = (created[0].id().cloned().unwrap(), created[1].id().cloned().unwrap());
//!     adapter
//!         .update("vocabulary", vec![
//!             Update::new(casa.clone()).push("translations", house.clone()),
//!             Update::new(house).push("translations", casa),
//!         ])
//!         .await?;
//!
//!     let found = adapter
//!         .find("vocabulary", None, Some(&QueryOptions::new().exists("translations", true).limit(10)))
//!         .await?;
//!     println!("{} of {} records", found.records.len(), found.count);
//!
//!     adapter.disconnect().await
//! }
//! ```
//!
//! # Transactions
//!
//! With `enable_transactions` set, [`Adapter::begin_transaction`](adapter::Adapter::begin_transaction)
//! opens a store session. The returned transaction offers the same operations and
//! is finalized with the error that ended the unit of work, if any:
//!
//! ```ignore
//! let transaction = adapter.begin_transaction().await?;
//!
//! let outcome = async {
//!     transaction.create("user", vec![Record::new().with("name", "ana")]).await?;
//!     transaction.update("training", updates).await
//! }
//! .await;
//!
//! match outcome {
//!     Ok(_) => transaction.commit().await?,
//!     Err(error) => transaction.abort(&error).await?,
//! };
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use recordlayer_core::{
    adapter, backend, config, connection, error, hooks, id, query, record, schema, transaction, update,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use recordlayer_memory::{InMemoryConnector, InMemorySession, InMemoryStore};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use recordlayer_mongodb::{DEFAULT_DATABASE, MongoDbConnector, MongoDbSession, MongoDbStore};
}
