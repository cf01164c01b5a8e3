use super::Repository;
use crate::builder::{build_delete, build_insert_slots, build_soft_delete, build_update_slots};
use crate::client::GenericClient;
use crate::connection::ConnectionProvider;
use crate::error::{RepoError, RepoResult};
use crate::ident::{TableRef, quote_ident, unquote};
use crate::in_transaction;
use crate::named::NamedSql;
use crate::params::{
    Audit, CREATOR_COLUMN, Chain, ColumnRole, ColumnValueMap, Params, RowSlots,
    UPDATE_TIME_COLUMN, UPDATER_COLUMN, check_batch_shape,
};
use crate::row::RowExt;
use std::borrow::Cow;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

const SERIAL_ID_SQL: &str = "SELECT currval(pg_get_serial_sequence($1, $2))";

impl<P: ConnectionProvider> Repository<P> {
    /// Insert one row.
    ///
    /// With `generated_id_column`, the value the column's sequence produced
    /// for this row is read back in the same transaction and returned.
    pub async fn add_one(
        &self,
        row: &ColumnValueMap,
        table: impl Into<TableRef>,
        generated_id_column: Option<&str>,
        audit: Option<&Audit>,
    ) -> RepoResult<Option<i64>> {
        check_batch_shape(std::slice::from_ref(row))?;
        let rows = stamp(std::slice::from_ref(row), audit, CREATOR_COLUMN);
        let table = self.render_table(table)?;
        let insert = NamedSql::parse(&build_insert_slots(&rows[0].slots(None), &table)?);
        let id_column = generated_id_column.map(unquote).transpose()?;
        let source = RowSlots {
            shape: &rows[0],
            row: &rows[0],
        };

        let mut conn = self.connect().await?;
        in_transaction!(conn, "add_one", tx, {
            self.execute_named(&tx, "add_one", &table, &insert, &source)
                .await?;
            match &id_column {
                Some(column) => {
                    self.log.statement("add_one", &table, SERIAL_ID_SQL, 2);
                    let row = tx
                        .query_opt(SERIAL_ID_SQL, &[&table, column])
                        .await?
                        .ok_or_else(|| {
                            RepoError::validation(format!("no sequence value for {table}"))
                        })?;
                    let id: Option<i64> = row.try_get_index(0)?;
                    match id {
                        Some(id) => Ok(Some(id)),
                        None => Err(RepoError::validation(format!(
                            "column {column} of {table} is not backed by a sequence"
                        ))),
                    }
                }
                None => Ok(None),
            }
        })
    }

    /// Insert every row in one transaction; all rows or none.
    pub async fn add_many(
        &self,
        rows: &[ColumnValueMap],
        table: impl Into<TableRef>,
        audit: Option<&Audit>,
    ) -> RepoResult<u64> {
        check_batch_shape(rows)?;
        let rows = stamp(rows, audit, CREATOR_COLUMN);
        let table = self.render_table(table)?;
        let insert = NamedSql::parse(&build_insert_slots(&rows[0].slots(None), &table)?);

        let mut conn = self.connect().await?;
        in_transaction!(conn, "add_many", tx, {
            self.execute_batch(&tx, "add_many", &table, &insert, &rows)
                .await
        })
    }

    /// [`add_many`](Self::add_many) on a caller-owned client or transaction.
    ///
    /// No transaction is opened; atomicity is the caller's.
    pub async fn add_many_with<C: GenericClient>(
        &self,
        client: &C,
        rows: &[ColumnValueMap],
        table: impl Into<TableRef>,
        audit: Option<&Audit>,
    ) -> RepoResult<u64> {
        check_batch_shape(rows)?;
        let rows = stamp(rows, audit, CREATOR_COLUMN);
        let table = self.render_table(table)?;
        let insert = NamedSql::parse(&build_insert_slots(&rows[0].slots(None), &table)?);
        self.execute_batch(client, "add_many_with", &table, &insert, &rows)
            .await
    }

    /// Update the rows matched by `where_clause`.
    ///
    /// Assignable columns become the SET list; the predicate's `@Name`
    /// markers resolve against the map itself, typically its identifying keys.
    /// With `audit`, `UpdateTime` is always `now()`; a caller value for it is
    /// ignored.
    pub async fn update_one(
        &self,
        row: &ColumnValueMap,
        table: impl Into<TableRef>,
        where_clause: &str,
        audit: Option<&Audit>,
    ) -> RepoResult<u64> {
        self.update_many(std::slice::from_ref(row), table, where_clause, audit)
            .await
    }

    /// Run the same UPDATE once per row in one transaction.
    pub async fn update_many(
        &self,
        rows: &[ColumnValueMap],
        table: impl Into<TableRef>,
        where_clause: &str,
        audit: Option<&Audit>,
    ) -> RepoResult<u64> {
        check_batch_shape(rows)?;
        let rows = stamp(rows, audit, UPDATER_COLUMN);
        let table = self.render_table(table)?;
        let update = NamedSql::parse(&build_update_slots(
            &rows[0].slots(Some(ColumnRole::Assign)),
            &table,
            where_clause,
            audit.map(|_| UPDATE_TIME_COLUMN),
        )?);
        let op = if rows.len() == 1 {
            "update_one"
        } else {
            "update_many"
        };

        let mut conn = self.connect().await?;
        in_transaction!(conn, op, tx, {
            self.execute_batch(&tx, op, &table, &update, &rows).await
        })
    }

    /// Soft delete: set `"Deleted" = 1` on the row whose `id_column` equals `id`.
    ///
    /// The row stays in the table.
    pub async fn delete_one<I>(
        &self,
        id: I,
        table: impl Into<TableRef>,
        id_column: &str,
        audit: Option<&Audit>,
    ) -> RepoResult<u64>
    where
        I: ToSql + Sync + Send + 'static,
    {
        let predicate = format!("{} = @Id", quote_ident(id_column)?);
        let params = Params::new().bind("Id", id);
        self.soft_delete("delete_one", table.into(), &predicate, &params, audit)
            .await
    }

    /// Soft delete every row matched by `where_clause`.
    pub async fn delete_by_where(
        &self,
        table: impl Into<TableRef>,
        where_clause: &str,
        params: &Params,
        audit: Option<&Audit>,
    ) -> RepoResult<u64> {
        self.soft_delete("delete_by_where", table.into(), where_clause, params, audit)
            .await
    }

    async fn soft_delete(
        &self,
        op: &'static str,
        table: TableRef,
        predicate: &str,
        params: &Params,
        audit: Option<&Audit>,
    ) -> RepoResult<u64> {
        let table = self.render_table(table)?;
        let stmt = NamedSql::parse(&build_soft_delete(&table, predicate, audit.is_some())?);
        let mut audit_params = Params::new();
        if let Some(audit) = audit {
            audit_params.push_value(UPDATER_COLUMN, Arc::clone(audit.user()));
        }
        let source = Chain(&audit_params, params);

        let mut conn = self.connect().await?;
        in_transaction!(conn, op, tx, {
            self.execute_named(&tx, op, &table, &stmt, &source).await
        })
    }

    /// Physically delete the row whose `id_column` equals `id`.
    pub async fn purge_one<I>(
        &self,
        id: I,
        table: impl Into<TableRef>,
        id_column: &str,
    ) -> RepoResult<u64>
    where
        I: ToSql + Sync + Send + 'static,
    {
        let predicate = format!("{} = @Id", quote_ident(id_column)?);
        let params = Params::new().bind("Id", id);
        self.purge("purge_one", table.into(), &predicate, &params)
            .await
    }

    /// Physically delete every row matched by `where_clause`.
    pub async fn purge_by_where(
        &self,
        table: impl Into<TableRef>,
        where_clause: &str,
        params: &Params,
    ) -> RepoResult<u64> {
        self.purge("purge_by_where", table.into(), where_clause, params)
            .await
    }

    async fn purge(
        &self,
        op: &'static str,
        table: TableRef,
        predicate: &str,
        params: &Params,
    ) -> RepoResult<u64> {
        let table = self.render_table(table)?;
        let stmt = NamedSql::parse(&build_delete(&table, predicate)?);

        let mut conn = self.connect().await?;
        in_transaction!(conn, op, tx, {
            self.execute_named(&tx, op, &table, &stmt, params).await
        })
    }

    /// Execute caller-written SQL on a fresh connection, without a transaction.
    pub async fn execute_sql(&self, sql: &str, params: &Params) -> RepoResult<u64> {
        let stmt = NamedSql::parse(sql);
        let conn = self.connect().await?;
        self.execute_named(&conn, "execute_sql", "", &stmt, params)
            .await
    }
}

/// Add the audit user to every row under `column`, or borrow the rows as-is.
fn stamp<'a>(
    rows: &'a [ColumnValueMap],
    audit: Option<&Audit>,
    column: &str,
) -> Cow<'a, [ColumnValueMap]> {
    match audit {
        None => Cow::Borrowed(rows),
        Some(audit) => Cow::Owned(
            rows.iter()
                .map(|row| {
                    let mut row = row.clone();
                    row.push(column, ColumnRole::Assign, Arc::clone(audit.user()));
                    row
                })
                .collect(),
        ),
    }
}
