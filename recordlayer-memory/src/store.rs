//! In-memory storage implementation of the store backend.
//!
//! This module provides a small document store kept entirely in process memory.
//! Collections keep documents in insertion order behind async-safe read-write
//! locks, and transactions are implemented with snapshot sessions.

use std::{cmp::Ordering, collections::HashMap, fmt, sync::Arc};
use async_trait::async_trait;
use bson::{Bson, Document};
use mea::{mutex::Mutex, rwlock::RwLock};
use tracing::debug;

use recordlayer_core::{
    backend::{StoreBackend, StoreConnector},
    config::AdapterConfig,
    error::{AdapterError, AdapterResult},
    query::{Expr, Projection, Query, SortDirection},
    record::NATIVE_ID_FIELD,
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator, lookup},
    modifier::apply_modifiers,
};

/// The contents of a store: collection name to documents in insertion order.
#[derive(Debug, Clone, Default)]
struct StoreState {
    collections: HashMap<String, Vec<Document>>,
}

/// A write recorded by a session, replayed onto the live store on commit.
#[derive(Debug, Clone)]
enum Mutation {
    Insert { collection: String, documents: Vec<Document> },
    Update { collection: String, id: Bson, modifiers: Document },
    Delete { collection: String, filter: Option<Expr> },
}

fn same_id(document: &Document, id: &Bson) -> bool {
    document
        .get(NATIVE_ID_FIELD)
        .is_some_and(|value| Comparable::from(value) == Comparable::from(id))
}

impl StoreState {
    fn documents(&self, collection: &str) -> &[Document] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn query(&self, collection: &str, query: &Query) -> AdapterResult<Vec<Document>> {
        let mut documents = Vec::new();
        for document in self.documents(collection) {
            if DocumentEvaluator::matches(document, query.filter.as_ref())? {
                documents.push(document);
            }
        }

        if !query.sort.is_empty() {
            // Stable sort, so ties keep insertion order.
            documents.sort_by(|a, b| {
                query.sort.iter().fold(Ordering::Equal, |ordering, sort| {
                    ordering.then_with(|| {
                        let left = lookup(a, &sort.field).map(Comparable::from).unwrap_or(Comparable::Null);
                        let right = lookup(b, &sort.field).map(Comparable::from).unwrap_or(Comparable::Null);

                        match sort.direction {
                            SortDirection::Asc => left.sort_cmp(&right),
                            SortDirection::Desc => right.sort_cmp(&left),
                        }
                    })
                })
            });
        }

        let offset = query.offset.map_or(0, |offset| offset as usize);
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);

        Ok(documents
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|document| project(document, query.projection.as_ref()))
            .collect())
    }

    fn count(&self, collection: &str, filter: Option<&Expr>) -> AdapterResult<u64> {
        let mut count = 0;
        for document in self.documents(collection) {
            if DocumentEvaluator::matches(document, filter)? {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Inserts the whole batch or nothing.
    fn insert(&mut self, collection: &str, documents: Vec<Document>) -> AdapterResult<()> {
        let existing = self.documents(collection);

        for (index, document) in documents.iter().enumerate() {
            let id = document.get(NATIVE_ID_FIELD).ok_or_else(|| {
                AdapterError::InvalidRecord(format!("document without `{NATIVE_ID_FIELD}` in `{collection}`"))
            })?;

            let taken = existing.iter().any(|other| same_id(other, id))
                || documents[..index].iter().any(|other| same_id(other, id));
            if taken {
                return Err(AdapterError::Conflict(format!(
                    "duplicate key {id} in collection `{collection}`"
                )));
            }
        }

        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);

        Ok(())
    }

    fn update(&mut self, collection: &str, id: &Bson, modifiers: &Document) -> AdapterResult<u64> {
        let Some(document) = self
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|document| same_id(document, id)))
        else {
            return Ok(0);
        };

        Ok(u64::from(apply_modifiers(document, modifiers)?))
    }

    fn delete(&mut self, collection: &str, filter: Option<&Expr>) -> AdapterResult<u64> {
        let Some(documents) = self.collections.get_mut(collection) else {
            return Ok(0);
        };

        let matched = documents
            .iter()
            .map(|document| DocumentEvaluator::matches(document, filter))
            .collect::<AdapterResult<Vec<_>>>()?;
        let removed = matched.iter().filter(|matched| **matched).count() as u64;

        let mut matched = matched.into_iter();
        documents.retain(|_| !matched.next().unwrap_or(false));

        Ok(removed)
    }

    fn apply(&mut self, mutation: &Mutation) -> AdapterResult<u64> {
        match mutation {
            Mutation::Insert { collection, documents } => {
                self.insert(collection, documents.clone())?;
                Ok(documents.len() as u64)
            }
            Mutation::Update { collection, id, modifiers } => self.update(collection, id, modifiers),
            Mutation::Delete { collection, filter } => self.delete(collection, filter.as_ref()),
        }
    }
}

fn project(document: &Document, projection: Option<&Projection>) -> Document {
    match projection {
        None => document.clone(),
        Some(Projection::Include(fields)) => document
            .iter()
            .filter(|(key, _)| key.as_str() == NATIVE_ID_FIELD || fields.iter().any(|field| field == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        Some(Projection::Exclude(fields)) => document
            .iter()
            .filter(|(key, _)| !fields.iter().any(|field| field == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}

/// Staged view of a session: a snapshot taken when the transaction started
/// plus the writes made since.
struct Staged {
    view: StoreState,
    log: Vec<Mutation>,
}

/// Transaction session of an [`InMemoryStore`].
///
/// Reads see the snapshot taken at [`StoreBackend::start_transaction`] plus the
/// session's own writes. Nothing reaches the store until the session commits;
/// aborting or dropping the session discards its writes.
pub struct InMemorySession {
    staged: Mutex<Staged>,
}

impl fmt::Debug for InMemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySession").finish_non_exhaustive()
    }
}

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan every document in a collection (no indexing), which suits tests and
/// development, not production volumes.
///
/// # Example
///
/// ```ignore
/// use recordlayer_memory::InMemoryStore;
/// use recordlayer_core::{backend::StoreBackend, query::Query};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_documents("vocabulary", vec![doc! { "_id": "a", "name": "casa" }], None).await?;
///
/// let documents = store.query_documents("vocabulary", &Query::default(), None).await?;
/// assert_eq!(documents.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn read<T>(
        &self,
        session: Option<&InMemorySession>,
        read: impl FnOnce(&StoreState) -> AdapterResult<T>,
    ) -> AdapterResult<T> {
        match session {
            Some(session) => read(&session.staged.lock().await.view),
            None => read(&*self.state.read().await),
        }
    }

    async fn write(&self, session: Option<&InMemorySession>, mutation: Mutation) -> AdapterResult<u64> {
        match session {
            Some(session) => {
                let mut staged = session.staged.lock().await;
                let affected = staged.view.apply(&mutation)?;
                staged.log.push(mutation);
                Ok(affected)
            }
            None => self.state.write().await.apply(&mutation),
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    type Session = InMemorySession;

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        session: Option<&Self::Session>,
    ) -> AdapterResult<Vec<Document>> {
        self.read(session, |state| state.query(collection, query)).await
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: Option<&Expr>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        self.read(session, |state| state.count(collection, filter)).await
    }

    async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<()> {
        let mutation = Mutation::Insert { collection: collection.to_string(), documents };
        self.write(session, mutation).await?;
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &Bson,
        modifiers: Document,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        let mutation = Mutation::Update {
            collection: collection.to_string(),
            id: id.clone(),
            modifiers,
        };
        self.write(session, mutation).await
    }

    async fn delete_documents(
        &self,
        collection: &str,
        filter: Option<&Expr>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        let mutation = Mutation::Delete {
            collection: collection.to_string(),
            filter: filter.cloned(),
        };
        self.write(session, mutation).await
    }

    async fn start_transaction(&self) -> AdapterResult<Self::Session> {
        let view = self.state.read().await.clone();

        Ok(InMemorySession {
            staged: Mutex::new(Staged { view, log: Vec::new() }),
        })
    }

    async fn commit_transaction(&self, session: Self::Session) -> AdapterResult<()> {
        let log = std::mem::take(&mut session.staged.lock().await.log);
        let mut state = self.state.write().await;

        // Replay onto a copy so a failing write leaves the store as it was.
        let mut committed = state.clone();
        for mutation in &log {
            committed.apply(mutation)?;
        }
        *state = committed;

        debug!(writes = log.len(), "in-memory transaction committed");

        Ok(())
    }

    async fn abort_transaction(&self, session: Self::Session) -> AdapterResult<()> {
        let log = std::mem::take(&mut session.staged.lock().await.log);

        debug!(discarded = log.len(), "in-memory transaction aborted");

        Ok(())
    }
}

/// Opens [`InMemoryStore`] backends.
///
/// Every connection made by one connector shares the same data, so records survive
/// a disconnect followed by a reconnect. Any URL is accepted.
///
/// # Example
///
/// ```ignore
/// use recordlayer_memory::InMemoryConnector;
///
/// let adapter = Adapter::new(schema, InMemoryConnector::new());
/// adapter.connect(AdapterConfig::new().url("memory://")).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryConnector {
    store: InMemoryStore,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector serving an existing store.
    pub fn with_store(store: InMemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    type Backend = InMemoryStore;

    async fn connect(&self, config: &AdapterConfig) -> AdapterResult<Self::Backend> {
        debug!(url = config.url.as_deref().unwrap_or_default(), "opening in-memory store");
        Ok(self.store.clone())
    }
}
