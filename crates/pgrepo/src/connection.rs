//! Connection acquisition.
//!
//! A [`ConnectionProvider`] hands out one owned [`Connection`] per logical
//! operation. The operation keeps it in a local and drops it on every exit
//! path; nothing is cached across calls. Pooling, when wanted, lives in the
//! driver layer ([`PoolProvider`] over `deadpool-postgres`).

use crate::client::GenericClient;
use crate::error::{RepoError, RepoResult};
use std::future::Future;
use tokio_postgres::NoTls;

/// Produces a fresh connection handle per operation.
pub trait ConnectionProvider: Send + Sync {
    type Connection: Connection;

    /// Acquire a connection.
    ///
    /// Fails with [`RepoError::Connection`] / [`RepoError::Pool`] when the
    /// store is unreachable or the credentials are rejected.
    fn acquire(&self) -> impl Future<Output = RepoResult<Self::Connection>> + Send;
}

/// An owned connection that can open transactions.
pub trait Connection: GenericClient + Send {
    type Transaction<'a>: TransactionHandle
    where
        Self: 'a;

    /// Open a transaction (`BEGIN`).
    fn begin(&mut self) -> impl Future<Output = RepoResult<Self::Transaction<'_>>> + Send;
}

/// An open transaction.
///
/// Implementations must roll back when dropped without `commit`/`rollback`.
pub trait TransactionHandle: GenericClient + Send {
    fn commit(self) -> impl Future<Output = RepoResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = RepoResult<()>> + Send;
}

// ===== tokio-postgres =====

impl Connection for tokio_postgres::Client {
    type Transaction<'a> = tokio_postgres::Transaction<'a>;

    async fn begin(&mut self) -> RepoResult<Self::Transaction<'_>> {
        self.transaction().await.map_err(RepoError::from_db_error)
    }
}

impl TransactionHandle for tokio_postgres::Transaction<'_> {
    async fn commit(self) -> RepoResult<()> {
        tokio_postgres::Transaction::commit(self)
            .await
            .map_err(RepoError::from_db_error)
    }

    async fn rollback(self) -> RepoResult<()> {
        tokio_postgres::Transaction::rollback(self)
            .await
            .map_err(RepoError::from_db_error)
    }
}

// ===== deadpool-postgres =====

impl Connection for deadpool_postgres::Client {
    type Transaction<'a> = deadpool_postgres::Transaction<'a>;

    async fn begin(&mut self) -> RepoResult<Self::Transaction<'_>> {
        self.transaction().await.map_err(RepoError::from_db_error)
    }
}

impl TransactionHandle for deadpool_postgres::Transaction<'_> {
    async fn commit(self) -> RepoResult<()> {
        deadpool_postgres::Transaction::commit(self)
            .await
            .map_err(RepoError::from_db_error)
    }

    async fn rollback(self) -> RepoResult<()> {
        deadpool_postgres::Transaction::rollback(self)
            .await
            .map_err(RepoError::from_db_error)
    }
}

// ===== Providers =====

/// Checks connections out of a `deadpool-postgres` pool.
#[derive(Clone)]
pub struct PoolProvider {
    pool: deadpool_postgres::Pool,
}

impl PoolProvider {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &deadpool_postgres::Pool {
        &self.pool
    }
}

impl ConnectionProvider for PoolProvider {
    type Connection = deadpool_postgres::Client;

    async fn acquire(&self) -> RepoResult<Self::Connection> {
        Ok(self.pool.get().await?)
    }
}

/// Opens a brand-new connection for every operation.
///
/// The connection future is driven on a spawned tokio task that ends when the
/// returned client is dropped. Useful for tools and tests; services should
/// prefer [`PoolProvider`].
#[derive(Clone)]
pub struct DirectProvider {
    config: tokio_postgres::Config,
}

impl DirectProvider {
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Parse a `postgres://` URL or key/value connection string.
    pub fn from_url(database_url: &str) -> RepoResult<Self> {
        let config = database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| RepoError::Connection(e.to_string()))?;
        Ok(Self::new(config))
    }
}

impl ConnectionProvider for DirectProvider {
    type Connection = tokio_postgres::Client;

    async fn acquire(&self) -> RepoResult<Self::Connection> {
        let (client, connection) = self
            .config
            .connect(NoTls)
            .await
            .map_err(|e| match RepoError::from_db_error(e) {
                RepoError::Statement(e) => RepoError::Connection(e.to_string()),
                other => other,
            })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "pgrepo.conn", error = %e, "connection task ended with error");
            }
        });
        Ok(client)
    }
}
