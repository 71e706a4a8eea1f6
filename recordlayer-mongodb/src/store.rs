//! MongoDB implementation of the store backend.

use std::fmt;
use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mea::mutex::Mutex;
use mongodb::{
    Client, ClientSession, Collection,
    error::{Error as MongoError, ErrorKind, InsertManyError, WriteError, WriteFailure},
    options::ClientOptions,
};
use tracing::debug;

use recordlayer_core::{
    backend::{StoreBackend, StoreConnector},
    config::AdapterConfig,
    error::{AdapterError, AdapterResult},
    query::{Expr, Query},
    record::NATIVE_ID_FIELD,
};

use crate::query::MongoQueryTranslator;

/// Database used when neither the configuration nor the URL names one.
pub const DEFAULT_DATABASE: &str = "recordlayer";

/// Server error code of a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

pub(crate) fn is_duplicate_key(code: i32) -> bool {
    code == DUPLICATE_KEY
}

/// Maps a driver error, reporting unique index violations as conflicts.
pub(crate) fn classify(error: MongoError) -> AdapterError {
    let duplicate = match error.kind.as_ref() {
        ErrorKind::InsertMany(InsertManyError { write_errors: Some(errors), .. }) => {
            errors.iter().any(|error| is_duplicate_key(error.code))
        }
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code, .. })) => is_duplicate_key(*code),
        ErrorKind::Command(command) => is_duplicate_key(command.code),
        _ => false,
    };

    if duplicate {
        AdapterError::Conflict(error.to_string())
    } else {
        AdapterError::Storage(error.to_string())
    }
}

fn storage(error: MongoError) -> AdapterError {
    AdapterError::Storage(error.to_string())
}

/// Transaction session of a [`MongoDbStore`].
///
/// The driver session needs exclusive access for every operation, so calls
/// sharing one session run one after another.
pub struct MongoDbSession {
    inner: Mutex<ClientSession>,
}

impl fmt::Debug for MongoDbSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbSession").finish_non_exhaustive()
    }
}

/// Document store backed by a MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self { client, database: database.into() }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.database).collection(name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    type Session = MongoDbSession;

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
        session: Option<&Self::Session>,
    ) -> AdapterResult<Vec<Document>> {
        let filter = MongoQueryTranslator::filter(query.filter.as_ref())?;
        let options = MongoQueryTranslator::find_options(query)?;
        let collection = self.collection(collection);
        let action = collection.find(filter).with_options(options);

        match session {
            Some(session) => {
                let mut session = session.inner.lock().await;
                let mut cursor = action.session(&mut *session).await.map_err(storage)?;

                let mut documents = Vec::new();
                while let Some(document) = cursor.next(&mut session).await {
                    documents.push(document.map_err(storage)?);
                }
                Ok(documents)
            }
            None => action
                .await
                .map_err(storage)?
                .try_collect()
                .await
                .map_err(storage),
        }
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: Option<&Expr>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        let collection = self.collection(collection);
        let action = collection.count_documents(MongoQueryTranslator::filter(filter)?);

        match session {
            Some(session) => action.session(&mut *session.inner.lock().await).await,
            None => action.await,
        }
        .map_err(storage)
    }

    async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<()> {
        let collection = self.collection(collection);
        let action = collection.insert_many(documents);

        match session {
            Some(session) => action.session(&mut *session.inner.lock().await).await,
            None => action.await,
        }
        .map_err(classify)?;

        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &Bson,
        modifiers: Document,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        let collection = self.collection(collection);
        let action = collection.update_one(doc! { NATIVE_ID_FIELD: id }, modifiers);

        let result = match session {
            Some(session) => action.session(&mut *session.inner.lock().await).await,
            None => action.await,
        }
        .map_err(storage)?;

        Ok(result.modified_count)
    }

    async fn delete_documents(
        &self,
        collection: &str,
        filter: Option<&Expr>,
        session: Option<&Self::Session>,
    ) -> AdapterResult<u64> {
        let collection = self.collection(collection);
        let action = collection.delete_many(MongoQueryTranslator::filter(filter)?);

        let result = match session {
            Some(session) => action.session(&mut *session.inner.lock().await).await,
            None => action.await,
        }
        .map_err(storage)?;

        Ok(result.deleted_count)
    }

    async fn start_transaction(&self) -> AdapterResult<Self::Session> {
        let mut session = self.client.start_session().await.map_err(storage)?;
        session.start_transaction().await.map_err(storage)?;

        Ok(MongoDbSession { inner: Mutex::new(session) })
    }

    // Dropping the driver session ends it.
    async fn commit_transaction(&self, session: Self::Session) -> AdapterResult<()> {
        let mut inner = session.inner.lock().await;
        inner.commit_transaction().await.map_err(classify)
    }

    async fn abort_transaction(&self, session: Self::Session) -> AdapterResult<()> {
        let mut inner = session.inner.lock().await;
        inner.abort_transaction().await.map_err(storage)
    }

    // Sessions still held by unfinished transactions do not block the shutdown.
    async fn shutdown(&self) -> AdapterResult<()> {
        self.client.clone().shutdown().immediate(true).await;

        debug!(database = %self.database, "mongodb client shut down");

        Ok(())
    }
}

/// Opens [`MongoDbStore`] backends from a connection string.
///
/// The database is `config.database` when set, else the one named in the URL,
/// else [`DEFAULT_DATABASE`].
///
/// # Example
///
/// ```ignore
/// use recordlayer::{prelude::*, mongodb::MongoDbConnector};
///
/// let adapter = Adapter::new(schema, MongoDbConnector::new());
/// adapter
///     .connect(AdapterConfig::new().url("mongodb://localhost:27017/vocabulario"))
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MongoDbConnector {
    app_name: Option<String>,
}

impl MongoDbConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name reported to the server.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

pub(crate) fn database_name(config: &AdapterConfig, from_url: Option<&str>) -> String {
    config
        .database
        .as_deref()
        .or(from_url)
        .unwrap_or(DEFAULT_DATABASE)
        .to_string()
}

#[async_trait]
impl StoreConnector for MongoDbConnector {
    type Backend = MongoDbStore;

    async fn connect(&self, config: &AdapterConfig) -> AdapterResult<Self::Backend> {
        let url = config.require_url()?;

        let mut options = ClientOptions::parse(url)
            .await
            .map_err(|e| AdapterError::Configuration(e.to_string()))?;
        if self.app_name.is_some() {
            options.app_name = self.app_name.clone();
        }

        let database = database_name(config, options.default_database.as_deref());
        let client = Client::with_options(options).map_err(|e| AdapterError::Configuration(e.to_string()))?;

        debug!(%database, "mongodb client created");

        Ok(MongoDbStore::new(client, database))
    }
}
