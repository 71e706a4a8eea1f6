//! Convenient re-exports of commonly used types from recordlayer.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use recordlayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - The adapter, its CRUD contract and transactions
//! - Schema declaration types
//! - Records, query options and update directives
//! - Configuration, hooks and error types

pub use recordlayer_core::{
    adapter::{Adapter, FindResult, RecordStore},
    backend::{StoreBackend, StoreConnector},
    config::AdapterConfig,
    error::{AdapterError, AdapterResult},
    hooks::{HookContext, Hooks, Method},
    id::{FnIdGenerator, IdGenerator, ShortIdGenerator, UuidGenerator},
    query::{Expr, FieldOp, Filter, QueryOptions, SortDirection},
    record::Record,
    schema::{FieldDescriptor, FieldKind, Schema},
    transaction::{Transaction, TransactionState},
    update::Update,
};
