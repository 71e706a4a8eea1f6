//! Lifecycle of the live store handle.
//!
//! The [`ConnectionManager`] owns the only handle to the backend. Other components
//! borrow it per call through [`ConnectionManager::handle`]; no handle exists
//! before [`ConnectionManager::connect`] succeeds or after
//! [`ConnectionManager::disconnect`].

use std::sync::Arc;
use mea::rwlock::RwLock;
use tracing::info;

use crate::{
    backend::{StoreBackend, StoreConnector},
    config::AdapterConfig,
    error::{AdapterError, AdapterResult},
};

/// A live backend together with the configuration it was opened with.
#[derive(Debug)]
pub struct Connection<B> {
    pub backend: Arc<B>,
    pub config: Arc<AdapterConfig>,
}

impl<B> Clone for Connection<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
        }
    }
}

impl<B> Connection<B> {
    /// Returns the collection holding records of `record_type`.
    pub fn collection_name<'a>(&'a self, record_type: &'a str) -> &'a str {
        self.config.collection_name(record_type)
    }
}

/// Owns the connection to the store.
pub struct ConnectionManager<C: StoreConnector> {
    connector: C,
    connection: RwLock<Option<Connection<C::Backend>>>,
}

impl<C: StoreConnector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connection: RwLock::new(None),
        }
    }

    /// Opens the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the URL is missing or a connection
    /// is already live, or whatever the connector reports when opening fails.
    pub async fn connect(&self, config: AdapterConfig) -> AdapterResult<Connection<C::Backend>> {
        config.require_url()?;

        let mut guard = self.connection.write().await;

        if guard.is_some() {
            return Err(AdapterError::Configuration("adapter is already connected".to_string()));
        }

        let backend = self.connector.connect(&config).await?;
        let connection = Connection {
            backend: Arc::new(backend),
            config: Arc::new(config),
        };

        info!(
            database = connection.config.database.as_deref().unwrap_or_default(),
            transactions = connection.config.enable_transactions,
            "connected to store"
        );

        *guard = Some(connection.clone());

        Ok(connection)
    }

    /// Releases the live handle and shuts the backend down.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotConnected`] if there is no live handle.
    pub async fn disconnect(&self) -> AdapterResult<()> {
        let connection = self
            .connection
            .write()
            .await
            .take()
            .ok_or(AdapterError::NotConnected)?;

        connection.backend.shutdown().await?;

        info!("disconnected from store");

        Ok(())
    }

    /// Returns the live connection.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotConnected`] if there is no live handle.
    pub async fn handle(&self) -> AdapterResult<Connection<C::Backend>> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(AdapterError::NotConnected)
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }
}
