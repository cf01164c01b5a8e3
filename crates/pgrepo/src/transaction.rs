//! Scoped transactions.
//!
//! Every write follows the same lifecycle: acquire → begin → execute →
//! commit | rollback → release. [`TxGuard`] owns the open transaction from
//! the moment it is begun:
//!
//! - [`TxGuard::finish`] commits on `Ok` and rolls back explicitly on `Err`,
//!   returning the body's original error (a failed rollback is logged, never
//!   substituted for it).
//! - Dropping an unfinished guard (panic, cancelled future) drops the handle,
//!   which rolls back on its own.
//!
//! The [`in_transaction!`](crate::in_transaction) macro wires these together
//! for a block of statements.

use crate::client::GenericClient;
use crate::connection::TransactionHandle;
use crate::error::{RepoError, RepoResult};
use tokio_postgres::Row;
use tokio_postgres::Statement;
use tokio_postgres::types::ToSql;

/// Runs the given block inside a transaction on `$conn`.
///
/// - Begins a transaction via [`Connection::begin`](crate::Connection::begin).
/// - Binds a [`TxGuard`] as `$tx` for the block.
/// - Commits on `Ok(_)`, rolls back on `Err(_)`.
///
/// The block must evaluate to `pgrepo::RepoResult<T>`.
///
/// # Example
///
/// ```ignore
/// let mut conn = provider.acquire().await?;
/// pgrepo::in_transaction!(conn, "transfer", tx, {
///     tx.execute("UPDATE ...", &[]).await?;
///     tx.execute("UPDATE ...", &[]).await?;
///     Ok::<(), pgrepo::RepoError>(())
/// })?;
/// ```
#[macro_export]
macro_rules! in_transaction {
    ($conn:expr, $op:expr, $tx:ident, $body:block) => {{
        let __pgrepo_tx = $crate::Connection::begin(&mut $conn).await?;
        let $tx = $crate::transaction::TxGuard::new(__pgrepo_tx, $op);
        let __pgrepo_tx_body_result = async { $body }.await;
        $tx.finish(__pgrepo_tx_body_result).await
    }};
}

/// Owner of an open transaction.
pub struct TxGuard<T: TransactionHandle> {
    inner: Option<T>,
    op: &'static str,
}

impl<T: TransactionHandle> TxGuard<T> {
    pub fn new(tx: T, op: &'static str) -> Self {
        tracing::trace!(target: "pgrepo.tx", op, "begin");
        Self {
            inner: Some(tx),
            op,
        }
    }

    /// Operation name this transaction belongs to.
    pub fn op(&self) -> &'static str {
        self.op
    }

    fn tx(&self) -> RepoResult<&T> {
        self.inner
            .as_ref()
            .ok_or_else(|| RepoError::validation("transaction already finished"))
    }

    /// Commit the transaction.
    pub async fn commit(mut self) -> RepoResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await?;
            tracing::debug!(target: "pgrepo.tx", op = self.op, "commit");
        }
        Ok(())
    }

    /// Roll the transaction back.
    pub async fn rollback(mut self) -> RepoResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await?;
            tracing::debug!(target: "pgrepo.tx", op = self.op, "rollback");
        }
        Ok(())
    }

    /// Commit on `Ok`, roll back on `Err` and hand the original error back.
    pub async fn finish<R>(self, result: RepoResult<R>) -> RepoResult<R> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(error) => {
                let op = self.op;
                if let Err(rollback_err) = self.rollback().await {
                    tracing::error!(
                        target: "pgrepo.tx",
                        op,
                        error = %error,
                        rollback_error = %rollback_err,
                        "rollback failed"
                    );
                }
                Err(error)
            }
        }
    }
}

impl<T: TransactionHandle> Drop for TxGuard<T> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            // The handle's own drop issues the rollback.
            tracing::warn!(
                target: "pgrepo.tx",
                op = self.op,
                "transaction dropped without commit or rollback; rolling back"
            );
        }
    }
}

impl<T: TransactionHandle> GenericClient for TxGuard<T> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<Vec<Row>> {
        self.tx()?.query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<u64> {
        self.tx()?.execute(sql, params).await
    }

    fn supports_prepared_statements(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|tx| tx.supports_prepared_statements())
    }

    async fn prepare_statement(&self, sql: &str) -> RepoResult<Statement> {
        self.tx()?.prepare_statement(sql).await
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> RepoResult<u64> {
        self.tx()?.execute_prepared(stmt, params).await
    }
}
