//! A schema-driven persistence adapter that lets a resource-oriented API operate
//! against a document database without knowing the store's details.
//!
//! This crate is the core of the recordlayer project and provides:
//!
//! - **Schema registry** ([`schema`]) - Declarative record types, fields and relations
//! - **Records** ([`record`]) - Application records and their mapping to stored documents
//! - **Identifiers** ([`id`]) - Pluggable identifier generation strategies
//! - **Queries** ([`query`]) - Query options and their compilation to store filters
//! - **Updates** ([`update`]) - Update directives and the modifiers they produce
//! - **Store backend abstraction** ([`backend`]) - The protocol every document store implements
//! - **Connections** ([`connection`]) - Lifecycle of the live store handle
//! - **CRUD executor** ([`adapter`]) - Find, create, update and delete over a schema
//! - **Transactions** ([`transaction`]) - Session-scoped units of work
//! - **Hooks** ([`hooks`]) - Ordered per-type record hooks run by callers
//! - **Configuration** ([`config`]) and **error handling** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use recordlayer_core::{adapter::{Adapter, RecordStore}, config::AdapterConfig, record::Record};
//!
//! let adapter = Adapter::new(schema, connector);
//! adapter.connect(AdapterConfig::new().url("mongodb://localhost:27017/vocabulario")).await?;
//!
//! let created = adapter
//!     .create("vocabulary", vec![Record::new().with("name", "casa")])
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_core;

pub mod adapter;
pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod id;
pub mod query;
pub mod record;
pub mod schema;
pub mod transaction;
pub mod update;

#[cfg(test)]
mod testing;
