//! Generic client trait for unified database access.

use crate::error::{RepoError, RepoResult};
use tokio_postgres::Row;
use tokio_postgres::Statement;
use tokio_postgres::types::ToSql;

/// A trait that unifies database clients and transactions.
///
/// Operations that run statements accept any `GenericClient`, so the same
/// code path serves a bare connection (reads) and a transaction (writes).
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = RepoResult<Vec<Row>>> + Send;

    /// Execute a query and return the first row, if any.
    ///
    /// Semantics:
    /// - 0 rows: returns `Ok(None)`
    /// - 1 row: returns `Ok(Some(row))`
    /// - multiple rows: returns `Ok(Some(first_row))` (does **not** error)
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = RepoResult<Option<Row>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = RepoResult<u64>> + Send;

    /// Whether this client supports prepared statement APIs.
    ///
    /// The default implementation returns `false`; batch writes then fall back
    /// to executing the statement text once per row.
    fn supports_prepared_statements(&self) -> bool {
        false
    }

    /// Prepare a statement on this connection.
    ///
    /// Prepared statements are **per-connection** and must not be used across connections.
    fn prepare_statement(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = RepoResult<Statement>> + Send {
        let _ = sql;
        async {
            Err(RepoError::validation(
                "prepared statements are not supported by this client",
            ))
        }
    }

    /// Execute a prepared statement and return affected row count.
    fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = RepoResult<u64>> + Send {
        let _ = stmt;
        let _ = params;
        async {
            Err(RepoError::validation(
                "prepared statements are not supported by this client",
            ))
        }
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(RepoError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(RepoError::from_db_error)
    }

    fn supports_prepared_statements(&self) -> bool {
        true
    }

    async fn prepare_statement(&self, sql: &str) -> RepoResult<Statement> {
        tokio_postgres::Client::prepare(self, sql)
            .await
            .map_err(RepoError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> RepoResult<u64> {
        tokio_postgres::Client::execute(self, stmt, params)
            .await
            .map_err(RepoError::from_db_error)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(RepoError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(RepoError::from_db_error)
    }

    fn supports_prepared_statements(&self) -> bool {
        true
    }

    async fn prepare_statement(&self, sql: &str) -> RepoResult<Statement> {
        tokio_postgres::Transaction::prepare(self, sql)
            .await
            .map_err(RepoError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> RepoResult<u64> {
        tokio_postgres::Transaction::execute(self, stmt, params)
            .await
            .map_err(RepoError::from_db_error)
    }
}

// ===== deadpool-postgres support =====

impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper -> tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        GenericClient::query(client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<u64> {
        let client: &tokio_postgres::Client = self;
        GenericClient::execute(client, sql, params).await
    }

    fn supports_prepared_statements(&self) -> bool {
        true
    }

    async fn prepare_statement(&self, sql: &str) -> RepoResult<Statement> {
        // Pooled connections keep a statement cache; reuse it.
        self.prepare_cached(sql)
            .await
            .map_err(RepoError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> RepoResult<u64> {
        let client: &tokio_postgres::Client = self;
        GenericClient::execute_prepared(client, stmt, params).await
    }
}

impl GenericClient for deadpool_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<Vec<Row>> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        GenericClient::query(tx, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> RepoResult<u64> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        GenericClient::execute(tx, sql, params).await
    }

    fn supports_prepared_statements(&self) -> bool {
        true
    }

    async fn prepare_statement(&self, sql: &str) -> RepoResult<Statement> {
        self.prepare_cached(sql)
            .await
            .map_err(RepoError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> RepoResult<u64> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        GenericClient::execute_prepared(tx, stmt, params).await
    }
}
