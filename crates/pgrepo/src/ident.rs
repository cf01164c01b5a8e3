//! Identifier quoting.
//!
//! Every table and column name that reaches generated SQL goes through
//! [`quote_ident`]. This is the single trust boundary for identifiers:
//! names are caller-supplied and **not** checked against an allow-list, but
//! they are always emitted as one double-quoted identifier, so a name can
//! never terminate the quoting and inject SQL.
//!
//! - `Person` renders as `"Person"` (case preserved)
//! - `"Person"` (already quoted) renders unchanged
//! - `Say "hi"` renders as `"Say ""hi"""`
//!
//! Empty names and names containing NUL are rejected.
//!
//! # Example
//! ```ignore
//! use pgrepo::{TableRef, quote_ident};
//!
//! assert_eq!(quote_ident("SOPId")?, r#""SOPId""#);
//! assert_eq!(TableRef::new("SOP").render("public")?, r#"public."SOP""#);
//! # Ok::<(), pgrepo::RepoError>(())
//! ```

use crate::error::{RepoError, RepoResult};
use std::fmt;

/// Quote a single SQL identifier (table, column or schema name).
pub fn quote_ident(name: &str) -> RepoResult<String> {
    let raw = unquote(name)?;
    let mut out = String::with_capacity(raw.len() + 2);
    write_quoted(&raw, &mut out);
    Ok(out)
}

/// Quote a comma-separated column list (`Name, Age` -> `"Name", "Age"`).
///
/// `*` passes through unchanged.
pub fn quote_column_list(columns: &str) -> RepoResult<String> {
    let trimmed = columns.trim();
    if trimmed == "*" {
        return Ok("*".to_string());
    }

    let mut out = String::new();
    for (i, column) in split_columns(trimmed)?.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&quote_ident(column)?);
    }
    Ok(out)
}

/// Strip surrounding quotes (if any) and unescape `""`.
pub(crate) fn unquote(name: &str) -> RepoResult<String> {
    if name.is_empty() {
        return Err(RepoError::validation("Identifier cannot be empty"));
    }
    if name.contains('\0') {
        return Err(RepoError::validation(
            "Identifier cannot contain NUL character",
        ));
    }

    let quoted = name.len() >= 2 && name.starts_with('"') && name.ends_with('"');
    if !quoted {
        return Ok(name.to_string());
    }

    let inner = &name[1..name.len() - 1];
    if inner.is_empty() {
        return Err(RepoError::validation("Empty quoted identifier"));
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            // Inside a quoted identifier a quote must be doubled.
            if chars.peek() == Some(&'"') {
                chars.next();
            } else {
                return Err(RepoError::validation(format!(
                    "Unescaped quote in identifier {name}"
                )));
            }
        }
        out.push(c);
    }
    Ok(out)
}

fn write_quoted(raw: &str, out: &mut String) {
    out.push('"');
    for ch in raw.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}

/// Split on commas that are not inside a quoted identifier.
fn split_columns(list: &str) -> RepoResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());

    if parts.iter().any(|p| p.is_empty()) {
        return Err(RepoError::validation(format!(
            "Empty column in column list '{list}'"
        )));
    }
    Ok(parts)
}

/// A table reference: a table name plus an optional explicit schema.
///
/// Without a schema the repository's configured schema is used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    schema: Option<String>,
    name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Pin the table to an explicit schema.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Render as `schema."Table"`, falling back to `default_schema`.
    ///
    /// The schema is emitted unquoted when it is a plain lower-case name
    /// (`public`), quoted otherwise.
    pub fn render(&self, default_schema: &str) -> RepoResult<String> {
        let schema = self.schema.as_deref().unwrap_or(default_schema);
        let mut out = render_schema(schema)?;
        out.push('.');
        out.push_str(&quote_ident(&self.name)?);
        Ok(out)
    }
}

fn render_schema(schema: &str) -> RepoResult<String> {
    let plain = !schema.is_empty()
        && schema
            .chars()
            .next()
            .is_some_and(|c| c == '_' || c.is_ascii_lowercase())
        && schema
            .chars()
            .all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit());
    if plain {
        Ok(schema.to_string())
    } else {
        quote_ident(schema)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&String> for TableRef {
    fn from(name: &String) -> Self {
        Self::new(name.as_str())
    }
}

impl From<&TableRef> for TableRef {
    fn from(table: &TableRef) -> Self {
        table.clone()
    }
}
