//! MongoDB backend implementation for recordlayer.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait,
//! translating the adapter's filters, sorts and projections into MongoDB queries
//! and its update directives into MongoDB update operators.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! recordlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Native queries** - Filters, sorting and paging run in MongoDB's query engine
//! - **Transactions** - Multi-document transactions through driver sessions
//! - **Conflict detection** - Unique index violations surface as conflicts
//!
//! # Connection
//!
//! The connection string comes from `AdapterConfig::url`. Transactions need a
//! replica set or sharded cluster and are only used when `enable_transactions`
//! is set.
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::{prelude::*, mongodb::MongoDbConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = Adapter::new(schema, MongoDbConnector::new());
//!     adapter.connect(AdapterConfig::from_env()).await?;
//!
//!     let found = adapter.find("vocabulary", None, None).await?;
//!
//!     adapter.disconnect().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_mongodb;

pub mod store;
mod query;

pub use store::{DEFAULT_DATABASE, MongoDbConnector, MongoDbSession, MongoDbStore};
