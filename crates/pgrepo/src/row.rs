//! Row mapping traits and utilities

use crate::error::{RepoError, RepoResult};
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

/// Trait for converting a database row into a caller-chosen result shape.
///
/// # Example
///
/// ```ignore
/// use pgrepo::{FromRow, RepoResult, RowExt};
///
/// struct Machine {
///     machine_id: i32,
///     machine_code: String,
///     deleted: i16,
/// }
///
/// impl FromRow for Machine {
///     fn from_row(row: &tokio_postgres::Row) -> RepoResult<Self> {
///         Ok(Self {
///             machine_id: row.try_get_column("MachineId")?,
///             machine_code: row.try_get_column("MachineCode")?,
///             deleted: row.try_get_column("Deleted")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> RepoResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value by name, returning RepoError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> RepoResult<T>
    where
        T: for<'a> FromSql<'a>;

    /// Try to get a column value by position, returning RepoError::Decode on failure
    fn try_get_index<T>(&self, idx: usize) -> RepoResult<T>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> RepoResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| RepoError::decode(column, e.to_string()))
    }

    fn try_get_index<T>(&self, idx: usize) -> RepoResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(idx)
            .map_err(|e| RepoError::decode(idx.to_string(), e.to_string()))
    }
}

// Positional tuples: `(i32, String)` reads columns 0 and 1.
macro_rules! impl_from_row_tuple {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty),+> FromRow for ($($ty,)+)
        where
            $($ty: for<'a> FromSql<'a>),+
        {
            fn from_row(row: &Row) -> RepoResult<Self> {
                Ok(($(row.try_get_index::<$ty>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(A => 0);
impl_from_row_tuple!(A => 0, B => 1);
impl_from_row_tuple!(A => 0, B => 1, C => 2);
impl_from_row_tuple!(A => 0, B => 1, C => 2, D => 3);
impl_from_row_tuple!(A => 0, B => 1, C => 2, D => 3, E => 4);
