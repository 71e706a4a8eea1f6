//! Transaction coordination over the CRUD contract.
//!
//! A [`Transaction`] is obtained from [`Adapter::begin_transaction`] and exposes
//! the same [`RecordStore`] operations as the adapter. With transactions enabled,
//! every call carries the transaction's session and nothing is visible to other
//! callers until [`Transaction::finalize`] commits. With transactions disabled,
//! calls go straight to the adapter and are durable one by one.
//!
//! `finalize` consumes the transaction, so a finished session cannot be reused.

use std::{error::Error, sync::Arc};
use async_trait::async_trait;
use bson::Bson;
use tracing::{info, warn};

use crate::{
    adapter::{Adapter, FindResult, RecordStore, SessionOf},
    backend::{StoreBackend, StoreConnector},
    error::AdapterResult,
    query::QueryOptions,
    record::Record,
    update::Update,
};

/// Terminal state reached by [`Transaction::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Committed,
    Aborted,
}

/// A unit of work over the adapter, isolated when transactions are enabled.
pub struct Transaction<'a, C: StoreConnector> {
    adapter: &'a Adapter<C>,
    session: Option<(Arc<C::Backend>, SessionOf<C>)>,
}

impl<'a, C: StoreConnector> Transaction<'a, C> {
    pub(crate) fn passthrough(adapter: &'a Adapter<C>) -> Self {
        Self { adapter, session: None }
    }

    pub(crate) fn isolated(adapter: &'a Adapter<C>, backend: Arc<C::Backend>, session: SessionOf<C>) -> Self {
        Self { adapter, session: Some((backend, session)) }
    }

    /// Returns `true` if operations run inside a store session.
    pub fn is_isolated(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Option<&SessionOf<C>> {
        self.session.as_ref().map(|(_, session)| session)
    }

    /// Ends the transaction: aborts when `error` is given, commits otherwise.
    ///
    /// The session is released in both cases. Without isolation there is nothing
    /// to roll back and only the resulting state is reported.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the commit or abort itself fails.
    pub async fn finalize(
        mut self,
        error: Option<&(dyn Error + Send + Sync)>,
    ) -> AdapterResult<TransactionState> {
        let Some((backend, session)) = self.session.take() else {
            if let Some(error) = error {
                warn!(%error, "finalizing transaction without isolation, writes are already durable");
                return Ok(TransactionState::Aborted);
            }
            return Ok(TransactionState::Committed);
        };

        match error {
            Some(error) => {
                warn!(%error, "aborting transaction");
                backend.abort_transaction(session).await?;
                Ok(TransactionState::Aborted)
            }
            None => {
                backend.commit_transaction(session).await?;
                info!("transaction committed");
                Ok(TransactionState::Committed)
            }
        }
    }

    /// Commits the transaction.
    pub async fn commit(self) -> AdapterResult<TransactionState> {
        self.finalize(None).await
    }

    /// Rolls the transaction back because of `error`.
    pub async fn abort(self, error: &(dyn Error + Send + Sync)) -> AdapterResult<TransactionState> {
        self.finalize(Some(error)).await
    }
}

impl<C: StoreConnector> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("transaction dropped without being finalized, pending writes are discarded");
        }
    }
}

#[async_trait]
impl<C: StoreConnector> RecordStore for Transaction<'_, C> {
    async fn find(
        &self,
        record_type: &str,
        ids: Option<&[Bson]>,
        options: Option<&QueryOptions>,
    ) -> AdapterResult<FindResult> {
        self.adapter
            .find_in(record_type, ids, options, self.session())
            .await
    }

    async fn create(&self, record_type: &str, records: Vec<Record>) -> AdapterResult<Vec<Record>> {
        self.adapter
            .create_in(record_type, records, self.session())
            .await
    }

    async fn update(&self, record_type: &str, updates: Vec<Update>) -> AdapterResult<u64> {
        self.adapter
            .update_in(record_type, updates, self.session())
            .await
    }

    async fn delete(&self, record_type: &str, ids: Option<&[Bson]>) -> AdapterResult<u64> {
        self.adapter
            .delete_in(record_type, ids, self.session())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AdapterError, testing::{Calls, connected}};

    #[tokio::test]
    async fn finalize_commits_or_aborts_the_session() {
        let (adapter, calls) = connected(Vec::new(), true).await;

        let transaction = adapter.begin_transaction().await.unwrap();
        assert!(transaction.is_isolated());
        assert_eq!(transaction.finalize(None).await.unwrap(), TransactionState::Committed);

        let error = AdapterError::InvalidRecord("rejected".to_string());
        let transaction = adapter.begin_transaction().await.unwrap();
        assert_eq!(transaction.abort(&error).await.unwrap(), TransactionState::Aborted);

        assert_eq!(Calls::get(&calls.commits), 1);
        assert_eq!(Calls::get(&calls.aborts), 1);
    }

    #[tokio::test]
    async fn passthrough_reports_the_outcome_only() {
        let (adapter, calls) = connected(Vec::new(), false).await;

        let transaction = adapter.begin_transaction().await.unwrap();
        assert!(!transaction.is_isolated());

        let error = AdapterError::InvalidRecord("rejected".to_string());
        assert_eq!(transaction.abort(&error).await.unwrap(), TransactionState::Aborted);
        assert_eq!(
            adapter.begin_transaction().await.unwrap().commit().await.unwrap(),
            TransactionState::Committed
        );

        assert_eq!(Calls::get(&calls.commits), 0);
        assert_eq!(Calls::get(&calls.aborts), 0);
    }

    #[tokio::test]
    async fn dropped_transactions_end_nothing() {
        let (adapter, calls) = connected(Vec::new(), true).await;

        drop(adapter.begin_transaction().await.unwrap());

        assert_eq!(Calls::get(&calls.commits), 0);
        assert_eq!(Calls::get(&calls.aborts), 0);
    }
}
