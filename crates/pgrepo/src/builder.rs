//! SQL text builders.
//!
//! Pure string construction: these functions never execute SQL and never see
//! values. The public builders take keys in the marker convention
//! (`@Column` = bindable, bare `Column` = identifying key). Writes driven by a
//! [`ColumnValueMap`] use generated placeholders instead, so column names only
//! reach the text through [`quote_ident`].
//!
//! ```ignore
//! use pgrepo::builder::{build_insert, build_update};
//!
//! let sql = build_insert(&["@Name", "@Age"], r#"public."Person""#)?;
//! assert_eq!(sql, r#"INSERT INTO public."Person" ("Name","Age") VALUES (@Name,@Age);"#);
//!
//! let sql = build_update(&["Id", "@Name"], r#"public."Person""#, r#""Id" = @Id"#)?;
//! assert_eq!(sql, r#"UPDATE public."Person" SET "Name"=@Name WHERE "Id" = @Id"#);
//! # Ok::<(), pgrepo::RepoError>(())
//! ```
//!
//! [`ColumnValueMap`]: crate::ColumnValueMap

use crate::error::{RepoError, RepoResult};
use crate::ident::quote_ident;
use crate::params::{DELETED_COLUMN, PARAM_MARKER, UPDATE_TIME_COLUMN, UPDATER_COLUMN};

/// Build `INSERT INTO {table} ("A","B") VALUES (@A,@B);`.
///
/// `table` must already be rendered (see [`TableRef::render`](crate::TableRef::render)).
/// Every key doubles as its own placeholder, so it must be a plain marker
/// name; bind other column names through a [`ColumnValueMap`].
pub fn build_insert<S: AsRef<str>>(keys: &[S], table: &str) -> RepoResult<String> {
    let slots = keys
        .iter()
        .map(|key| key_slot(key.as_ref()))
        .collect::<RepoResult<Vec<_>>>()?;
    build_insert_slots(&slots, table)
}

/// Build an INSERT from `(column, placeholder)` pairs.
///
/// Columns are quoted; placeholders are emitted as given.
pub(crate) fn build_insert_slots(slots: &[(&str, String)], table: &str) -> RepoResult<String> {
    if slots.is_empty() {
        return Err(RepoError::empty_batch(format!(
            "insert into {table} with no columns"
        )));
    }

    let mut columns = Vec::with_capacity(slots.len());
    let mut values = Vec::with_capacity(slots.len());
    for (column, placeholder) in slots {
        columns.push(quote_ident(column)?);
        values.push(placeholder.as_str());
    }

    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({});",
        columns.join(","),
        values.join(",")
    ))
}

/// Build `UPDATE {table} SET "A"=@A,"B"=@B WHERE {predicate}`.
///
/// Only marked keys are assigned; unmarked keys are identifying keys that the
/// predicate refers to.
pub fn build_update<S: AsRef<str>>(
    keys: &[S],
    table: &str,
    predicate: &str,
) -> RepoResult<String> {
    let slots = keys
        .iter()
        .map(|key| key.as_ref())
        .filter(|key| key.starts_with(PARAM_MARKER))
        .map(key_slot)
        .collect::<RepoResult<Vec<_>>>()?;
    build_update_slots(&slots, table, predicate, None)
}

/// Build an UPDATE assigning each `(column, placeholder)` pair.
///
/// With `stamp_column`, `"{stamp_column}"=now()` ends the SET list and a
/// caller assignment to the same column is dropped.
pub(crate) fn build_update_slots(
    slots: &[(&str, String)],
    table: &str,
    predicate: &str,
    stamp_column: Option<&str>,
) -> RepoResult<String> {
    if predicate.trim().is_empty() {
        return Err(RepoError::validation(format!(
            "update of {table} requires a WHERE predicate"
        )));
    }

    let mut assignments = Vec::with_capacity(slots.len() + 1);
    for (column, placeholder) in slots {
        if stamp_column == Some(*column) {
            continue;
        }
        assignments.push(format!("{}={placeholder}", quote_ident(column)?));
    }

    if assignments.is_empty() {
        return Err(RepoError::empty_batch(format!(
            "update of {table} with no assignable columns"
        )));
    }
    if let Some(stamp) = stamp_column {
        assignments.push(format!("{}=now()", quote_ident(stamp)?));
    }

    Ok(format!(
        "UPDATE {table} SET {} WHERE {predicate}",
        assignments.join(",")
    ))
}

/// Build `SELECT {columns} FROM {table} [WHERE ..] [ORDER BY ..]`.
///
/// Empty `where_clause`/`order_by` omit the clause.
pub fn build_select(table: &str, columns: &str, where_clause: &str, order_by: &str) -> String {
    let mut sql = format!("SELECT {columns} FROM {table}");
    if !where_clause.trim().is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    if !order_by.trim().is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql
}

/// Build `DELETE FROM {table} WHERE {predicate}`.
pub fn build_delete(table: &str, predicate: &str) -> RepoResult<String> {
    if predicate.trim().is_empty() {
        return Err(RepoError::validation(format!(
            "delete from {table} requires a WHERE predicate"
        )));
    }
    Ok(format!("DELETE FROM {table} WHERE {predicate}"))
}

/// Build the soft-delete form: `UPDATE {table} SET "Deleted"=1 WHERE {predicate}`.
///
/// With `audited`, `"Updater"=@Updater` and `"UpdateTime"=now()` are assigned too.
pub fn build_soft_delete(table: &str, predicate: &str, audited: bool) -> RepoResult<String> {
    if predicate.trim().is_empty() {
        return Err(RepoError::validation(format!(
            "soft delete of {table} requires a WHERE predicate"
        )));
    }
    let mut sql = format!("UPDATE {table} SET {}=1", quote_ident(DELETED_COLUMN)?);
    if audited {
        sql.push_str(&format!(
            ",{}={PARAM_MARKER}{UPDATER_COLUMN},{}=now()",
            quote_ident(UPDATER_COLUMN)?,
            quote_ident(UPDATE_TIME_COLUMN)?
        ));
    }
    sql.push_str(" WHERE ");
    sql.push_str(predicate);
    Ok(sql)
}

/// Split a builder key into its column and its `@Name` placeholder.
fn key_slot(key: &str) -> RepoResult<(&str, String)> {
    let column = key.strip_prefix(PARAM_MARKER).unwrap_or(key);
    let mut chars = column.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
    if !plain {
        return Err(RepoError::validation(format!(
            "key {key:?} cannot be used as a parameter marker"
        )));
    }
    Ok((column, format!("{PARAM_MARKER}{column}")))
}
