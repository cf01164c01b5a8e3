use super::Repository;
use crate::builder::build_select;
use crate::connection::ConnectionProvider;
use crate::error::RepoResult;
use crate::ident::{TableRef, quote_column_list, quote_ident};
use crate::named::NamedSql;
use crate::params::Params;
use crate::row::{FromRow, RowExt};
use tokio_postgres::types::{FromSql, ToSql};

impl<P: ConnectionProvider> Repository<P> {
    /// `SELECT * FROM {table} [WHERE ..] [ORDER BY ..]`.
    ///
    /// No matching rows is an empty `Vec`, never an error.
    pub async fn get_all<T: FromRow>(
        &self,
        table: impl Into<TableRef>,
        where_clause: &str,
        params: &Params,
        order_by: &str,
    ) -> RepoResult<Vec<T>> {
        let table = self.render_table(table)?;
        let stmt = NamedSql::parse(&build_select(&table, "*", where_clause, order_by));
        let conn = self.connect().await?;
        self.fetch_all(&conn, "get_all", &table, &stmt, params).await
    }

    /// Run caller-written SQL and map every row.
    pub async fn get_all_sql<T: FromRow>(&self, sql: &str, params: &Params) -> RepoResult<Vec<T>> {
        let stmt = NamedSql::parse(sql);
        let conn = self.connect().await?;
        self.fetch_all(&conn, "get_all_sql", "", &stmt, params).await
    }

    /// First row of `SELECT * FROM {table} [WHERE ..] [ORDER BY ..]`, if any.
    pub async fn get_one<T: FromRow>(
        &self,
        table: impl Into<TableRef>,
        where_clause: &str,
        params: &Params,
        order_by: &str,
    ) -> RepoResult<Option<T>> {
        self.get_one_columns(table, where_clause, "*", params, order_by)
            .await
    }

    /// Like [`get_one`](Self::get_one) but projecting `columns`
    /// (comma-separated names, each quoted; `*` for all).
    pub async fn get_one_columns<T: FromRow>(
        &self,
        table: impl Into<TableRef>,
        where_clause: &str,
        columns: &str,
        params: &Params,
        order_by: &str,
    ) -> RepoResult<Option<T>> {
        let table = self.render_table(table)?;
        let columns = quote_column_list(columns)?;
        let mut sql = build_select(&table, &columns, where_clause, order_by);
        sql.push_str(" LIMIT 1");
        let stmt = NamedSql::parse(&sql);
        let conn = self.connect().await?;
        self.fetch_opt(&conn, "get_one", &table, &stmt, params).await
    }

    /// First row of caller-written SQL, if any.
    pub async fn get_one_sql<T: FromRow>(&self, sql: &str, params: &Params) -> RepoResult<Option<T>> {
        let stmt = NamedSql::parse(sql);
        let conn = self.connect().await?;
        self.fetch_opt(&conn, "get_one_sql", "", &stmt, params).await
    }

    /// First selected column of every row where `{id_column} = id`.
    pub async fn get_column_as_list<V, I>(
        &self,
        id: I,
        table: impl Into<TableRef>,
        id_column: &str,
        select_columns: &str,
    ) -> RepoResult<Vec<V>>
    where
        V: for<'a> FromSql<'a>,
        I: ToSql + Sync + Send + 'static,
    {
        let table = self.render_table(table)?;
        let columns = quote_column_list(select_columns)?;
        let predicate = format!("{} = @Id", quote_ident(id_column)?);
        let stmt = NamedSql::parse(&build_select(&table, &columns, &predicate, ""));
        let params = Params::new().bind("Id", id);

        let conn = self.connect().await?;
        let rows: Vec<FirstColumn<V>> = self
            .fetch_all(&conn, "get_column_as_list", &table, &stmt, &params)
            .await?;
        Ok(rows.into_iter().map(|c| c.0).collect())
    }
}

/// Maps only the first column of a row.
struct FirstColumn<V>(V);

impl<V> FromRow for FirstColumn<V>
where
    V: for<'a> FromSql<'a>,
{
    fn from_row(row: &tokio_postgres::Row) -> RepoResult<Self> {
        row.try_get_index(0).map(FirstColumn)
    }
}
