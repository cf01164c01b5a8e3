use super::Repository;
use crate::builder::build_select;
use crate::connection::ConnectionProvider;
use crate::error::RepoResult;
use crate::ident::{TableRef, quote_ident};
use crate::named::NamedSql;
use crate::params::{Chain, Params};
use tokio_postgres::types::ToSql;

/// Parameter carrying the probed value; reserved so it never shadows a
/// caller's `extra_where` marker.
const PRIORITY_PARAM: &str = "__pgrepo_priority";

impl<P: ConnectionProvider> Repository<P> {
    /// Whether a row with `{id_column} = id` exists (soft-deleted rows included).
    pub async fn has_exists<I>(
        &self,
        id: I,
        table: impl Into<TableRef>,
        id_column: &str,
    ) -> RepoResult<bool>
    where
        I: ToSql + Sync + Send + 'static,
    {
        let table = self.render_table(table)?;
        let predicate = format!("{} = @Id", quote_ident(id_column)?);
        let params = Params::new().bind("Id", id);
        self.probe("has_exists", &table, &bounded(&table, &predicate), &params)
            .await
    }

    /// Whether caller-written SQL returns at least one row.
    pub async fn has_exists_with_param(&self, sql: &str, params: &Params) -> RepoResult<bool> {
        self.probe("has_exists_with_param", "", sql, params).await
    }

    /// Whether another row already uses `value` in `priority_column`.
    ///
    /// `extra_where` narrows the scope (e.g. `"ParentId" = @ParentId`, bound
    /// from `params`); empty means the whole table.
    pub async fn priority_repeat<V>(
        &self,
        value: V,
        table: impl Into<TableRef>,
        priority_column: &str,
        extra_where: &str,
        params: &Params,
    ) -> RepoResult<bool>
    where
        V: ToSql + Sync + Send + 'static,
    {
        let table = self.render_table(table)?;
        let mut predicate = format!("{} = @{PRIORITY_PARAM}", quote_ident(priority_column)?);
        if !extra_where.trim().is_empty() {
            predicate.push_str(" AND (");
            predicate.push_str(extra_where);
            predicate.push(')');
        }
        let priority = Params::new().bind(PRIORITY_PARAM, value);
        let source = Chain(&priority, params);

        let stmt = NamedSql::parse(&bounded(&table, &predicate));
        let conn = self.connect().await?;
        let row = self
            .fetch_opt_row(&conn, "priority_repeat", &table, &stmt, &source)
            .await?;
        Ok(row.is_some())
    }

    async fn probe(
        &self,
        op: &'static str,
        table: &str,
        sql: &str,
        params: &Params,
    ) -> RepoResult<bool> {
        let stmt = NamedSql::parse(sql);
        let conn = self.connect().await?;
        let row = self.fetch_opt_row(&conn, op, table, &stmt, params).await?;
        Ok(row.is_some())
    }
}

fn bounded(table: &str, predicate: &str) -> String {
    let mut sql = build_select(table, "*", predicate, "");
    sql.push_str(" LIMIT 1");
    sql
}
