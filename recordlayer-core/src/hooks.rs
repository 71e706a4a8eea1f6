//! Per-type record hooks run by callers around CRUD calls.
//!
//! Hooks are plain functions `(context, record) -> record` kept in ordered lists per
//! record type. The adapter never runs them itself: a caller runs the input hooks
//! on records it is about to create or update and the output hooks on records it
//! got back, e.g. to hash a password on create or attach derived statistics.
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::hooks::{Hooks, Method};
//!
//! let hooks = Hooks::new()
//!     .input("user", |context, mut record| {
//!         if context.method == Method::Create {
//!             record.insert("password", hash(record.get("password")));
//!         }
//!         Ok(record)
//!     });
//!
//! let records = hooks.apply_input_all(&context, records)?;
//! adapter.create("user", records).await?;
//! ```

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{error::AdapterResult, record::Record};

/// The CRUD operation a hook runs around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Find,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookContext<'a> {
    pub method: Method,
    pub record_type: &'a str,
}

impl<'a> HookContext<'a> {
    pub fn new(method: Method, record_type: &'a str) -> Self {
        Self { method, record_type }
    }
}

pub type Hook = Arc<dyn Fn(&HookContext<'_>, Record) -> AdapterResult<Record> + Send + Sync>;

/// Ordered input and output hooks per record type.
#[derive(Clone, Default)]
pub struct Hooks {
    input: HashMap<String, Vec<Hook>>,
    output: HashMap<String, Vec<Hook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = |hooks: &HashMap<String, Vec<Hook>>| {
            hooks
                .iter()
                .map(|(name, list)| (name.clone(), list.len()))
                .collect::<HashMap<_, _>>()
        };

        f.debug_struct("Hooks")
            .field("input", &counts(&self.input))
            .field("output", &counts(&self.output))
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook run on records going into the store.
    pub fn input<F>(mut self, record_type: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>, Record) -> AdapterResult<Record> + Send + Sync + 'static,
    {
        self.input.entry(record_type.into()).or_default().push(Arc::new(hook));
        self
    }

    /// Appends a hook run on records coming out of the store.
    pub fn output<F>(mut self, record_type: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>, Record) -> AdapterResult<Record> + Send + Sync + 'static,
    {
        self.output.entry(record_type.into()).or_default().push(Arc::new(hook));
        self
    }

    pub fn apply_input(&self, context: &HookContext<'_>, record: Record) -> AdapterResult<Record> {
        run(self.input.get(context.record_type), context, record)
    }

    pub fn apply_output(&self, context: &HookContext<'_>, record: Record) -> AdapterResult<Record> {
        run(self.output.get(context.record_type), context, record)
    }

    pub fn apply_input_all(&self, context: &HookContext<'_>, records: Vec<Record>) -> AdapterResult<Vec<Record>> {
        records
            .into_iter()
            .map(|record| self.apply_input(context, record))
            .collect()
    }

    pub fn apply_output_all(&self, context: &HookContext<'_>, records: Vec<Record>) -> AdapterResult<Vec<Record>> {
        records
            .into_iter()
            .map(|record| self.apply_output(context, record))
            .collect()
    }
}

fn run(hooks: Option<&Vec<Hook>>, context: &HookContext<'_>, record: Record) -> AdapterResult<Record> {
    hooks
        .into_iter()
        .flatten()
        .try_fold(record, |record, hook| hook(context, record))
}
