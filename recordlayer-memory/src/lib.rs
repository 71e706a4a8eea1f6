//! In-memory document store backend for recordlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait. It is meant for development and tests: it speaks the same document
//! protocol as the MongoDB backend, so an adapter behaves the same on either.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Full query support** - Filtering, multi-key sorting, projection and paging
//! - **Update modifiers** - `$set`, `$push`, `$pull`, `$addToSet`, `$inc` and `$unset`
//! - **Transactions** - Snapshot sessions committed atomically
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlayer::prelude::*;
//! use recordlayer_memory::InMemoryConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::builder()
//!         .record_type("vocabulary", [FieldDescriptor::new("name", FieldKind::String)])
//!         .build()?;
//!
//!     let adapter = Adapter::new(schema, InMemoryConnector::new());
//!     adapter.connect(AdapterConfig::new().url("memory://")).await?;
//!
//!     adapter.create("vocabulary", vec![Record::new().with("name", "casa")]).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_memory;

pub mod store;
mod evaluator;
mod modifier;

pub use store::{InMemoryConnector, InMemorySession, InMemoryStore};
