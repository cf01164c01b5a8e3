//! # pgrepo
//!
//! A table-name-driven PostgreSQL data-access layer.
//!
//! ## Features
//!
//! - **Names at call time**: tables and columns are plain strings; every name is
//!   double-quoted through one function ([`quote_ident`]) before it reaches SQL
//! - **Values are always bound**: `@Name` markers in predicates are rewritten to
//!   `$n` and resolved from [`Params`] / [`ColumnValueMap`]
//! - **Transactional writes**: one transaction per write call, rolled back on any
//!   error (see [`transaction::TxGuard`])
//! - **Soft delete by default**: `delete_*` sets `"Deleted" = 1`, `purge_*` removes rows
//! - **Pluggable connections**: [`PoolProvider`] (deadpool) or [`DirectProvider`]
//!
//! ## Quick start
//!
//! ```ignore
//! use pgrepo::{Audit, ColumnValueMap, Params, RepoConfig, Repository};
//!
//! let repo = Repository::from_config(&RepoConfig::from_env()?)?;
//!
//! // INSERT INTO public."Person" ("Name","Age","Creator") VALUES ($1,$2,$3);
//! let id = repo
//!     .add_one(
//!         &ColumnValueMap::new().set("Name", "X").set("Age", 5_i32),
//!         "Person",
//!         Some("Id"),
//!         Some(&Audit::by(42_i32)),
//!     )
//!     .await?;
//!
//! // UPDATE public."Person" SET "Age"=$1 WHERE "Id" = $2
//! repo.update_one(
//!     &ColumnValueMap::new().key("Id", id.unwrap_or_default()).set("Age", 6_i32),
//!     "Person",
//!     r#""Id" = @Id"#,
//!     None,
//! )
//! .await?;
//!
//! let exists = repo.has_exists(id, "Person", "Id").await?;
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod ident;
pub mod log;
pub mod named;
pub mod params;
pub mod pool;
pub mod repo;
pub mod row;
pub mod transaction;

pub use client::GenericClient;
pub use config::{LogSettings, PoolSettings, RepoConfig};
pub use connection::{
    Connection, ConnectionProvider, DirectProvider, PoolProvider, TransactionHandle,
};
pub use error::{RepoError, RepoResult};
pub use ident::{TableRef, quote_ident};
pub use log::SqlLog;
pub use named::NamedSql;
pub use params::{Audit, ColumnRole, ColumnValueMap, ParamSource, Params, Value};
pub use pool::{create_pool, create_pool_from_config, create_pool_with_config};
pub use repo::Repository;
pub use row::{FromRow, RowExt};
pub use transaction::TxGuard;

