//! The CRUD executor: find, create, update and delete records of a schema.
//!
//! [`Adapter`] ties the schema, the connection manager and the identifier strategy
//! together. Its [`RecordStore`] implementation runs every call outside any
//! transaction; the `*_in` methods take an explicit session and are what
//! [`Transaction`] delegates to.
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::{prelude::*, memory::InMemoryConnector};
//!
//! let adapter = Adapter::new(schema, InMemoryConnector::new());
//! adapter.connect(AdapterConfig::new().url("memory://")).await?;
//!
//! let created = adapter.create("vocabulary", vec![Record::new().with("name", "casa")]).await?;
//! let found = adapter.find("vocabulary", None, Some(&QueryOptions::new().limit(10))).await?;
//! ```

use std::sync::Arc;
use async_trait::async_trait;
use bson::Bson;
use futures::future::join_all;
use tracing::debug;

use crate::{
    backend::{StoreBackend, StoreConnector},
    config::AdapterConfig,
    connection::{Connection, ConnectionManager},
    error::AdapterResult,
    id::{IdGenerator, ShortIdGenerator},
    query::{Filter, QueryCompiler, QueryOptions},
    record::{NATIVE_ID_FIELD, Record, RecordMapper},
    schema::Schema,
    transaction::Transaction,
    update::Update,
};

/// Session type of the backend opened by connector `C`.
pub type SessionOf<C> = <<C as StoreConnector>::Backend as StoreBackend>::Session;

/// Records returned by a find, with the total number of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    pub records: Vec<Record>,
    /// Number of records matching the filter, ignoring offset and limit.
    pub count: u64,
}

/// The four-operation contract shared by [`Adapter`] and [`Transaction`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Finds records of `record_type`, restricted to `ids` when given.
    ///
    /// An empty `ids` slice returns an empty result without contacting the store.
    async fn find(
        &self,
        record_type: &str,
        ids: Option<&[Bson]>,
        options: Option<&QueryOptions>,
    ) -> AdapterResult<FindResult>;

    /// Creates records, assigning identifiers to those without one.
    async fn create(&self, record_type: &str, records: Vec<Record>) -> AdapterResult<Vec<Record>>;

    /// Applies update directives and returns the number of records modified.
    async fn update(&self, record_type: &str, updates: Vec<Update>) -> AdapterResult<u64>;

    /// Deletes the records with the given identifiers, or every record of the
    /// type when `ids` is `None`. Returns the number of records removed.
    async fn delete(&self, record_type: &str, ids: Option<&[Bson]>) -> AdapterResult<u64>;
}

/// Persistence adapter for the record types of a [`Schema`].
pub struct Adapter<C: StoreConnector> {
    schema: Arc<Schema>,
    connection: ConnectionManager<C>,
    id_generator: Arc<dyn IdGenerator>,
}

impl<C: StoreConnector> Adapter<C> {
    /// Creates a disconnected adapter using the default identifier strategy.
    pub fn new(schema: Schema, connector: C) -> Self {
        Self {
            schema: Arc::new(schema),
            connection: ConnectionManager::new(connector),
            id_generator: Arc::new(ShortIdGenerator::default()),
        }
    }

    /// Replaces the identifier strategy.
    pub fn with_id_generator(mut self, id_generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Arc::new(id_generator);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Connects to the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`](crate::error::AdapterError::Configuration)
    /// if the URL is missing or the adapter is already connected.
    pub async fn connect(&self, config: AdapterConfig) -> AdapterResult<()> {
        self.connection.connect(config).await?;
        Ok(())
    }

    /// Disconnects from the store.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotConnected`](crate::error::AdapterError::NotConnected)
    /// if the adapter is not connected.
    pub async fn disconnect(&self) -> AdapterResult<()> {
        self.connection.disconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    pub(crate) async fn handle(&self) -> AdapterResult<Connection<C::Backend>> {
        self.connection.handle().await
    }

    /// Starts a transaction.
    ///
    /// When transactions are disabled in the configuration the returned value
    /// exposes the same operations but every call is durable on its own.
    pub async fn begin_transaction(&self) -> AdapterResult<Transaction<'_, C>> {
        let connection = self.handle().await?;

        if !connection.config.enable_transactions {
            debug!("transactions disabled, operations run without isolation");
            return Ok(Transaction::passthrough(self));
        }

        let session = connection.backend.start_transaction().await?;

        debug!("transaction started");

        Ok(Transaction::isolated(self, connection.backend, session))
    }

    /// [`RecordStore::find`] within an optional session.
    pub async fn find_in(
        &self,
        record_type: &str,
        ids: Option<&[Bson]>,
        options: Option<&QueryOptions>,
        session: Option<&SessionOf<C>>,
    ) -> AdapterResult<FindResult> {
        let record_type = self.schema.get(record_type)?;

        let Some(query) = QueryCompiler::compile(record_type, ids, options)? else {
            return Ok(FindResult::default());
        };

        let connection = self.handle().await?;
        let collection = connection.collection_name(record_type.name());
        let backend = &connection.backend;

        // Some stores read a zero limit as "unlimited".
        let documents = async {
            match query.limit {
                Some(0) => Ok(Vec::new()),
                _ => backend.query_documents(collection, &query, session).await,
            }
        };

        let (documents, count) = futures::try_join!(
            documents,
            backend.count_documents(collection, query.filter.as_ref(), session),
        )?;

        let records = documents
            .into_iter()
            .map(|document| RecordMapper::to_record(record_type, document))
            .collect::<Vec<_>>();

        debug!(
            record_type = record_type.name(),
            collection,
            returned = records.len(),
            count,
            "find"
        );

        Ok(FindResult { records, count })
    }

    /// [`RecordStore::create`] within an optional session.
    pub async fn create_in(
        &self,
        record_type: &str,
        records: Vec<Record>,
        session: Option<&SessionOf<C>>,
    ) -> AdapterResult<Vec<Record>> {
        let record_type = self.schema.get(record_type)?;

        if records.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self.handle().await?;
        let collection = connection.collection_name(record_type.name());

        let documents = records
            .into_iter()
            .map(|mut record| {
                if record.id().is_none() {
                    record.set_id(self.id_generator.generate(record_type.name()));
                }
                RecordMapper::to_document(record_type, &record)
            })
            .collect::<Vec<_>>();

        connection
            .backend
            .insert_documents(collection, documents.clone(), session)
            .await?;

        debug!(
            record_type = record_type.name(),
            collection,
            created = documents.len(),
            "create"
        );

        Ok(documents
            .into_iter()
            .map(|document| RecordMapper::to_record(record_type, document))
            .collect())
    }

    /// [`RecordStore::update`] within an optional session.
    pub async fn update_in(
        &self,
        record_type: &str,
        updates: Vec<Update>,
        session: Option<&SessionOf<C>>,
    ) -> AdapterResult<u64> {
        let record_type = self.schema.get(record_type)?;

        let mut planned = Vec::with_capacity(updates.len());
        for update in &updates {
            let modifiers = update.modifiers()?;
            if !modifiers.is_empty() {
                planned.push((&update.id, modifiers));
            }
        }

        if planned.is_empty() {
            return Ok(0);
        }

        let connection = self.handle().await?;
        let collection = connection.collection_name(record_type.name());
        let backend = &connection.backend;

        // Every directive runs to completion before the first failure is reported.
        let results = join_all(
            planned
                .into_iter()
                .map(|(id, modifiers)| backend.update_document(collection, id, modifiers, session)),
        )
        .await;

        let mut modified = 0;
        for result in results {
            modified += result?;
        }

        debug!(
            record_type = record_type.name(),
            collection,
            directives = updates.len(),
            modified,
            "update"
        );

        Ok(modified)
    }

    /// [`RecordStore::delete`] within an optional session.
    pub async fn delete_in(
        &self,
        record_type: &str,
        ids: Option<&[Bson]>,
        session: Option<&SessionOf<C>>,
    ) -> AdapterResult<u64> {
        let record_type = self.schema.get(record_type)?;

        if ids.is_some_and(<[Bson]>::is_empty) {
            return Ok(0);
        }

        let connection = self.handle().await?;
        let collection = connection.collection_name(record_type.name());
        let filter = ids.map(|ids| Filter::any_of(NATIVE_ID_FIELD, ids.iter().cloned()));

        let removed = connection
            .backend
            .delete_documents(collection, filter.as_ref(), session)
            .await?;

        debug!(
            record_type = record_type.name(),
            collection,
            removed,
            "delete"
        );

        Ok(removed)
    }
}

#[async_trait]
impl<C: StoreConnector> RecordStore for Adapter<C> {
    async fn find(
        &self,
        record_type: &str,
        ids: Option<&[Bson]>,
        options: Option<&QueryOptions>,
    ) -> AdapterResult<FindResult> {
        self.find_in(record_type, ids, options, None).await
    }

    async fn create(&self, record_type: &str, records: Vec<Record>) -> AdapterResult<Vec<Record>> {
        self.create_in(record_type, records, None).await
    }

    async fn update(&self, record_type: &str, updates: Vec<Update>) -> AdapterResult<u64> {
        self.update_in(record_type, updates, None).await
    }

    async fn delete(&self, record_type: &str, ids: Option<&[Bson]>) -> AdapterResult<u64> {
        self.delete_in(record_type, ids, None).await
    }
}
