//! Named parameter sets and column-value maps.
//!
//! Values are stored type-erased as [`Value`] and only ever reach the store
//! through the driver's bind channel.
//!
//! # Example
//! ```ignore
//! use pgrepo::{ColumnValueMap, Params};
//!
//! let params = Params::new().bind("MachineId", 7_i32);
//!
//! let row = ColumnValueMap::new()
//!     .key("TopicId", 12_i32)          // identifying key, used only by the predicate
//!     .set("TopicName", "pressure")    // assignable column
//!     .set("Deleted", 0_i16);
//! ```

use crate::error::{RepoError, RepoResult};
use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A type-erased, bindable value.
pub type Value = Arc<dyn ToSql + Sync + Send>;

/// Marker prefix of a bindable key in generated statement text.
pub const PARAM_MARKER: char = '@';

/// Resolves a named parameter to its value.
pub trait ParamSource: Sync {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

/// Name lookup shared by params and column maps: exact match first, then
/// ASCII case-insensitive.
fn find<'a>(entries: impl Iterator<Item = (&'a str, &'a Value)> + Clone, name: &str) -> Option<&'a Value> {
    entries
        .clone()
        .find(|(n, _)| *n == name)
        .or_else(|| entries.into_iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
        .map(|(_, v)| v)
}

// ==================== Params ====================

/// An ordered set of named parameters for a predicate or raw statement.
#[derive(Clone, Default)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name` (with or without a leading `@`).
    ///
    /// Binding the same name twice replaces the earlier value.
    pub fn bind<T>(mut self, name: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.push_value(name, Arc::new(value));
        self
    }

    /// Bind an already type-erased value.
    pub fn push_value(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        let name = strip_marker(&name.into()).to_string();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl ParamSource for Params {
    fn lookup(&self, name: &str) -> Option<&Value> {
        find(self.entries.iter().map(|(n, v)| (n.as_str(), v)), name)
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Layered lookup: the first source that knows a name wins.
pub(crate) struct Chain<'a>(pub(crate) &'a dyn ParamSource, pub(crate) &'a dyn ParamSource);

impl ParamSource for Chain<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.0.lookup(name).or_else(|| self.1.lookup(name))
    }
}

// ==================== ColumnValueMap ====================

/// Name prefix of the placeholders generated by [`ColumnValueMap::slots`].
const SLOT_PREFIX: &str = "__pgrepo_col";

/// Role of a column inside a [`ColumnValueMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    /// Written by INSERT and assigned by UPDATE.
    Assign,
    /// Bound for the predicate only; never part of an UPDATE's SET list.
    Key,
}

#[derive(Clone)]
struct Column {
    name: String,
    role: ColumnRole,
    value: Value,
}

/// An ordered column → value map describing one row to write.
///
/// Insertion order is preserved and determines generated column order.
#[derive(Clone, Default)]
pub struct ColumnValueMap {
    columns: Vec<Column>,
}

impl ColumnValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an assignable column.
    pub fn set<T>(mut self, column: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.push(column, ColumnRole::Assign, Arc::new(value));
        self
    }

    /// Add an identifying key (matched by the predicate, never reassigned).
    pub fn key<T>(mut self, column: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.push(column, ColumnRole::Key, Arc::new(value));
        self
    }

    /// Add a column with an explicit role and an already type-erased value.
    ///
    /// Re-adding an existing column replaces its role and value in place.
    pub fn push(&mut self, column: impl Into<String>, role: ColumnRole, value: Value) -> &mut Self {
        let name = strip_marker(&column.into()).to_string();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(slot) => {
                slot.role = role;
                slot.value = value;
            }
            None => self.columns.push(Column { name, role, value }),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    pub fn role(&self, column: &str) -> Option<ColumnRole> {
        self.columns.iter().find(|c| c.name == column).map(|c| c.role)
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of assignable columns.
    pub fn assignable_len(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.role == ColumnRole::Assign)
            .count()
    }

    /// Columns paired with generated placeholder markers, in insertion order.
    ///
    /// With `role`, only columns of that role are listed. Placeholders are
    /// numbered by position (`@__pgrepo_col0`, ...) so a column name only
    /// ever reaches statement text through identifier quoting. Bind with
    /// [`RowSlots`].
    pub(crate) fn slots(&self, role: Option<ColumnRole>) -> Vec<(&str, String)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| role.is_none_or(|r| c.role == r))
            .map(|(i, c)| (c.name.as_str(), format!("{PARAM_MARKER}{SLOT_PREFIX}{i}")))
            .collect()
    }

    fn value_of(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| &c.value)
    }

    /// Whether `other` has the same columns with the same roles (any order).
    pub fn same_shape(&self, other: &ColumnValueMap) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .all(|c| other.role(&c.name) == Some(c.role))
    }
}

impl ParamSource for ColumnValueMap {
    fn lookup(&self, name: &str) -> Option<&Value> {
        find(self.columns.iter().map(|c| (c.name.as_str(), &c.value)), name)
    }
}

/// Binds one row of a batch.
///
/// Generated slots resolve through `shape`'s column order to the column of
/// the same name in `row`, so rows may list their columns in any order. Any
/// other name (a predicate marker) is looked up in `row` directly.
pub(crate) struct RowSlots<'a> {
    pub(crate) shape: &'a ColumnValueMap,
    pub(crate) row: &'a ColumnValueMap,
}

impl ParamSource for RowSlots<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        match name
            .strip_prefix(SLOT_PREFIX)
            .and_then(|index| index.parse::<usize>().ok())
        {
            Some(index) => {
                let column = self.shape.columns.get(index)?;
                self.row.value_of(&column.name)
            }
            None => self.row.lookup(name),
        }
    }
}

impl fmt::Debug for ColumnValueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.columns.iter().map(|c| (&c.name, c.role)))
            .finish()
    }
}

/// Check that a batch is non-empty and every row matches the first row's shape.
pub(crate) fn check_batch_shape(rows: &[ColumnValueMap]) -> RepoResult<&ColumnValueMap> {
    let Some(first) = rows.first() else {
        return Err(RepoError::empty_batch("batch contains no rows"));
    };
    if first.is_empty() {
        return Err(RepoError::empty_batch("row contains no columns"));
    }
    if let Some(pos) = rows.iter().position(|row| !first.same_shape(row)) {
        return Err(RepoError::validation(format!(
            "row {pos} does not share the column set of row 0 ({:?} vs {:?})",
            rows[pos], first
        )));
    }
    Ok(first)
}

pub(crate) fn strip_marker(name: &str) -> &str {
    name.strip_prefix(PARAM_MARKER).unwrap_or(name)
}

// ==================== Audit ====================

/// Audit column written by the repository.
pub const UPDATER_COLUMN: &str = "Updater";
/// Audit timestamp column written by the repository.
pub const UPDATE_TIME_COLUMN: &str = "UpdateTime";
/// Creator column written on insert.
pub const CREATOR_COLUMN: &str = "Creator";
/// Soft-delete flag column (`0` live, `1` deleted).
pub const DELETED_COLUMN: &str = "Deleted";

/// Who performed a write.
///
/// On inserts the id is written to `Creator`; on updates and soft deletes it
/// is written to `Updater` together with `UpdateTime = now()`.
#[derive(Clone)]
pub struct Audit {
    user: Value,
}

impl Audit {
    pub fn by<T>(user_id: T) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        Self {
            user: Arc::new(user_id),
        }
    }

    pub(crate) fn user(&self) -> &Value {
        &self.user
    }
}

impl fmt::Debug for Audit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audit").field("user", &"<value>").finish()
    }
}
