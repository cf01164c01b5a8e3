//! Table-name-driven repository.
//!
//! `Repository` is the entry point: every operation takes a table name (and
//! column names) at call time, binds all values as parameters, and owns its
//! connection for exactly the duration of the call.
//!
//! - Reads run on a bare connection.
//! - Writes run inside one transaction per call and roll back on any error.
//! - `delete_*` is a soft delete (`"Deleted" = 1`); `purge_*` removes rows.
//!
//! # Example
//!
//! ```ignore
//! use pgrepo::{Audit, ColumnValueMap, Params, Repository, RepoConfig};
//!
//! let repo = Repository::from_config(&RepoConfig::from_env()?)?;
//!
//! let id = repo
//!     .add_one(
//!         &ColumnValueMap::new().set("Name", "X").set("Age", 5_i32),
//!         "Person",
//!         Some("Id"),
//!         Some(&Audit::by(42_i32)),
//!     )
//!     .await?;
//!
//! let people: Vec<(i32, String)> = repo
//!     .get_all("Person", r#""Deleted" = 0"#, &Params::new(), r#""Id""#)
//!     .await?;
//! ```

mod exists;
mod read;
mod write;


use crate::client::GenericClient;
use crate::config::RepoConfig;
use crate::connection::{ConnectionProvider, PoolProvider};
use crate::error::RepoResult;
use crate::ident::TableRef;
use crate::log::SqlLog;
use crate::named::{NamedSql, params_ref};
use crate::params::{ColumnValueMap, ParamSource, RowSlots};
use crate::pool::create_pool_from_config;
use crate::row::FromRow;
use std::sync::Arc;
use tokio_postgres::Row;

/// Generic data-access facade over a [`ConnectionProvider`].
///
/// Cheap to clone; clones share the provider (and therefore the pool).
pub struct Repository<P> {
    provider: Arc<P>,
    schema: Arc<str>,
    log: SqlLog,
}

impl<P> Clone for Repository<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            schema: Arc::clone(&self.schema),
            log: self.log.clone(),
        }
    }
}

impl<P> std::fmt::Debug for Repository<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("schema", &self.schema)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

impl Repository<PoolProvider> {
    /// Build a pooled repository from configuration.
    ///
    /// The pool connects lazily, so this does not touch the network.
    pub fn from_config(config: &RepoConfig) -> RepoResult<Self> {
        config.validate()?;
        let pool = create_pool_from_config(config)?;
        Ok(Self::new(PoolProvider::new(pool))
            .with_schema(config.schema.as_str())
            .with_sql_log(SqlLog::from_settings(&config.log)?))
    }
}

impl<P: ConnectionProvider> Repository<P> {
    /// Create a repository using the `public` schema and default SQL logging.
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            schema: Arc::from(crate::config::DEFAULT_SCHEMA),
            log: SqlLog::default(),
        }
    }

    /// Set the schema prepended to tables that don't name one.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Arc::from(schema.into());
        self
    }

    pub fn with_sql_log(mut self, log: SqlLog) -> Self {
        self.log = log;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Render a table reference against this repository's schema.
    pub fn render_table(&self, table: impl Into<TableRef>) -> RepoResult<String> {
        table.into().render(&self.schema)
    }

    async fn connect(&self) -> RepoResult<P::Connection> {
        self.provider.acquire().await
    }

    // ----- statement helpers shared by read/write/exists -----

    async fn fetch_all<C, T>(
        &self,
        client: &C,
        op: &'static str,
        table: &str,
        stmt: &NamedSql,
        source: &dyn ParamSource,
    ) -> RepoResult<Vec<T>>
    where
        C: GenericClient,
        T: FromRow,
    {
        let values = stmt.bind(source)?;
        self.log.statement(op, table, stmt.sql(), values.len());
        let rows = client.query(stmt.sql(), &params_ref(&values)).await?;
        rows.iter().map(T::from_row).collect()
    }

    async fn fetch_opt<C, T>(
        &self,
        client: &C,
        op: &'static str,
        table: &str,
        stmt: &NamedSql,
        source: &dyn ParamSource,
    ) -> RepoResult<Option<T>>
    where
        C: GenericClient,
        T: FromRow,
    {
        let row = self.fetch_opt_row(client, op, table, stmt, source).await?;
        row.as_ref().map(T::from_row).transpose()
    }

    async fn fetch_opt_row<C: GenericClient>(
        &self,
        client: &C,
        op: &'static str,
        table: &str,
        stmt: &NamedSql,
        source: &dyn ParamSource,
    ) -> RepoResult<Option<Row>> {
        let values = stmt.bind(source)?;
        self.log.statement(op, table, stmt.sql(), values.len());
        client.query_opt(stmt.sql(), &params_ref(&values)).await
    }

    async fn execute_named<C: GenericClient>(
        &self,
        client: &C,
        op: &'static str,
        table: &str,
        stmt: &NamedSql,
        source: &dyn ParamSource,
    ) -> RepoResult<u64> {
        let values = stmt.bind(source)?;
        self.log.statement(op, table, stmt.sql(), values.len());
        client.execute(stmt.sql(), &params_ref(&values)).await
    }

    /// Run one statement once per row, preparing it first when the client
    /// supports it. Returns the summed affected row count.
    ///
    /// Generated slots are bound through the first row's column order.
    async fn execute_batch<C: GenericClient>(
        &self,
        client: &C,
        op: &'static str,
        table: &str,
        stmt: &NamedSql,
        rows: &[ColumnValueMap],
    ) -> RepoResult<u64> {
        let Some(shape) = rows.first() else {
            return Ok(0);
        };
        self.log.statement(op, table, stmt.sql(), stmt.names().len());
        tracing::debug!(target: "pgrepo.sql", op, table, rows = rows.len(), "batch");

        let prepared = if client.supports_prepared_statements() {
            Some(client.prepare_statement(stmt.sql()).await?)
        } else {
            None
        };

        let mut affected = 0;
        for row in rows {
            let source = RowSlots { shape, row };
            let values = stmt.bind(&source)?;
            let params = params_ref(&values);
            affected += match &prepared {
                Some(prepared) => client.execute_prepared(prepared, &params).await?,
                None => client.execute(stmt.sql(), &params).await?,
            };
        }
        Ok(affected)
    }
}
