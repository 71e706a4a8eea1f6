//! A backend double that serves fixed documents and records the calls it gets.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use async_trait::async_trait;
use bson::{Bson, Document};
use mea::mutex::Mutex;

use crate::{
    adapter::Adapter,
    backend::{StoreBackend, StoreConnector},
    config::AdapterConfig,
    error::{AdapterError, AdapterResult},
    query::{Expr, Query},
    schema::{FieldDescriptor, FieldKind, Schema},
};

#[derive(Default)]
pub(crate) struct Calls {
    pub(crate) reads: AtomicUsize,
    pub(crate) counts: AtomicUsize,
    pub(crate) commits: AtomicUsize,
    pub(crate) aborts: AtomicUsize,
    pub(crate) updated: Mutex<Vec<Bson>>,
}

impl fmt::Debug for Calls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calls").finish_non_exhaustive()
    }
}

impl Calls {
    pub(crate) fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBackend {
    documents: Vec<Document>,
    calls: Arc<Calls>,
}

#[async_trait]
impl StoreBackend for FakeBackend {
    type Session = ();

    async fn query_documents(
        &self,
        _collection: &str,
        _query: &Query,
        _session: Option<&Self::Session>,
    ) -> AdapterResult<Vec<Document>> {
        Calls::bump(&self.calls.reads);
        Ok(self.documents.clone())
    }

    async fn count_documents(
        &self,
        _collection: &str,
        _filter: Option<&Expr>,
        _session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        Calls::bump(&self.calls.counts);
        Ok(self.documents.len() as u64)
    }

    async fn insert_documents(
        &self,
        _collection: &str,
        _documents: Vec<Document>,
        _session: Option<&Self::Session>,
    ) -> AdapterResult<()> {
        Ok(())
    }

    // `$rename` is refused so callers can provoke a store failure.
    async fn update_document(
        &self,
        _collection: &str,
        id: &Bson,
        modifiers: Document,
        _session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        if modifiers.contains_key("$rename") {
            return Err(AdapterError::Storage("unsupported operator `$rename`".to_string()));
        }

        self.calls.updated.lock().await.push(id.clone());
        Ok(1)
    }

    async fn delete_documents(
        &self,
        _collection: &str,
        _filter: Option<&Expr>,
        _session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        Ok(0)
    }

    async fn start_transaction(&self) -> AdapterResult<Self::Session> {
        Ok(())
    }

    async fn commit_transaction(&self, _session: Self::Session) -> AdapterResult<()> {
        Calls::bump(&self.calls.commits);
        Ok(())
    }

    async fn abort_transaction(&self, _session: Self::Session) -> AdapterResult<()> {
        Calls::bump(&self.calls.aborts);
        Ok(())
    }
}

pub(crate) struct FakeConnector {
    backend: FakeBackend,
}

#[async_trait]
impl StoreConnector for FakeConnector {
    type Backend = FakeBackend;

    async fn connect(&self, _config: &AdapterConfig) -> AdapterResult<Self::Backend> {
        Ok(self.backend.clone())
    }
}

/// A connected adapter over `documents` of a single `user` type.
pub(crate) async fn connected(
    documents: Vec<Document>,
    enable_transactions: bool,
) -> (Adapter<FakeConnector>, Arc<Calls>) {
    let schema = Schema::builder()
        .record_type("user", [FieldDescriptor::new("name", FieldKind::String)])
        .build()
        .unwrap();

    let calls = Arc::new(Calls::default());
    let backend = FakeBackend { documents, calls: Arc::clone(&calls) };

    let adapter = Adapter::new(schema, FakeConnector { backend });
    adapter
        .connect(AdapterConfig::new().url("fake://").enable_transactions(enable_transactions))
        .await
        .unwrap();

    (adapter, calls)
}
