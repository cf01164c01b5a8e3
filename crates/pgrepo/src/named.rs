//! Named-marker statements.
//!
//! Callers write predicates and raw statements with `@Name` markers; the
//! driver only understands positional `$1, $2, ...`. [`NamedSql::parse`]
//! rewrites the text once and remembers which name sits behind each
//! position, and [`NamedSql::bind`] resolves those names against a
//! [`ParamSource`] at execution time.
//!
//! - A repeated name reuses its first placeholder.
//! - Markers inside string literals (including `E'...'` with backslash
//!   escapes), quoted identifiers and comments are left alone, as are
//!   operators that start with `@` (`@>`, `@@`, `@-@`).
//! - Dollar-quoted bodies (`$$ ... $$`, `$fn$ ... $fn$`) are not scanned.
//! - Only ASCII names (`[A-Za-z_][A-Za-z0-9_]*`) are markers.

use crate::error::{RepoError, RepoResult};
use crate::params::{ParamSource, Value};
use tokio_postgres::types::ToSql;

/// A statement whose `@Name` markers have been rewritten to `$n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSql {
    sql: String,
    names: Vec<String>,
}

impl NamedSql {
    /// Rewrite every `@Name` marker in `sql`.
    pub fn parse(sql: &str) -> Self {
        let mut out = String::with_capacity(sql.len());
        let mut names: Vec<String> = Vec::new();
        let bytes = sql.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];
            match b {
                b'\'' if is_escape_string(bytes, i) => {
                    let end = skip_escaped(bytes, i);
                    out.push_str(&sql[i..end]);
                    i = end;
                }
                b'\'' | b'"' => {
                    let end = skip_quoted(bytes, i, b);
                    out.push_str(&sql[i..end]);
                    i = end;
                }
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    let end = sql[i..].find('\n').map_or(bytes.len(), |p| i + p + 1);
                    out.push_str(&sql[i..end]);
                    i = end;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let end = sql[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
                    out.push_str(&sql[i..end]);
                    i = end;
                }
                b'$' if dollar_tag_end(bytes, i).is_some() => {
                    let body = dollar_tag_end(bytes, i).unwrap_or(bytes.len());
                    let tag = &sql[i..body];
                    let end = sql[body..].find(tag).map_or(bytes.len(), |p| body + p + tag.len());
                    out.push_str(&sql[i..end]);
                    i = end;
                }
                b'@' if is_marker_start(bytes, i) => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && is_ident_char(bytes[end]) {
                        end += 1;
                    }
                    let name = &sql[start..end];
                    let idx = match names.iter().position(|n| n == name) {
                        Some(pos) => pos + 1,
                        None => {
                            names.push(name.to_string());
                            names.len()
                        }
                    };
                    out.push('$');
                    out.push_str(&idx.to_string());
                    i = end;
                }
                _ => {
                    // Copy one UTF-8 character.
                    let ch_len = utf8_len(b);
                    out.push_str(&sql[i..i + ch_len]);
                    i += ch_len;
                }
            }
        }

        Self { sql: out, names }
    }

    /// Statement text with positional placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter names in placeholder order (`names()[0]` is `$1`).
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolve every placeholder against `source`.
    pub fn bind<'a>(&self, source: &'a dyn ParamSource) -> RepoResult<Vec<&'a Value>> {
        self.names
            .iter()
            .map(|name| {
                source.lookup(name).ok_or_else(|| {
                    RepoError::validation(format!("missing value for parameter @{name}"))
                })
            })
            .collect()
    }
}

/// Parameter refs compatible with `tokio-postgres`.
pub(crate) fn params_ref<'a>(values: &[&'a Value]) -> Vec<&'a (dyn ToSql + Sync)> {
    values
        .iter()
        .map(|&v| v.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

fn is_marker_start(bytes: &[u8], i: usize) -> bool {
    let next_ok = bytes
        .get(i + 1)
        .is_some_and(|&c| c == b'_' || c.is_ascii_alphabetic());
    let prev_ok = i == 0 || !(is_ident_char(bytes[i - 1]) || bytes[i - 1] == b'@');
    next_ok && prev_ok
}

fn is_ident_char(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}

/// Return the index just past a quoted run starting at `start`.
///
/// A doubled quote inside the run is an escape, not a terminator.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Whether the quote at `quote` opens an `E'...'` escape string.
fn is_escape_string(bytes: &[u8], quote: usize) -> bool {
    quote > 0
        && matches!(bytes[quote - 1], b'E' | b'e')
        && (quote == 1 || !is_ident_char(bytes[quote - 2]))
}

/// Like [`skip_quoted`] for `'`, but a backslash also escapes the next byte.
fn skip_escaped(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// If a dollar-quote tag (`$$` or `$tag$`) starts at `start`, the index just
/// past it. `$1` style positional parameters are not tags.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    if start > 0 && (is_ident_char(bytes[start - 1]) || bytes[start - 1] == b'$') {
        return None;
    }
    let mut i = start + 1;
    match bytes.get(i) {
        Some(b'$') => return Some(i + 1),
        Some(&c) if c == b'_' || c.is_ascii_alphabetic() => {}
        _ => return None,
    }
    while i < bytes.len() && is_ident_char(bytes[i]) {
        i += 1;
    }
    (bytes.get(i) == Some(&b'$')).then_some(i + 1)
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;

    #[test]
    fn rewrites_markers_in_order() {
        let q = NamedSql::parse(r#""Deleted" = 0 AND "MachineId" = @MachineId AND "Kind" = @Kind"#);
        assert_eq!(q.sql(), r#""Deleted" = 0 AND "MachineId" = $1 AND "Kind" = $2"#);
        assert_eq!(q.names(), ["MachineId", "Kind"]);
    }

    #[test]
    fn repeated_name_reuses_placeholder() {
        let q = NamedSql::parse(
            r#""Code" LIKE CONCAT('%', @Keyword, '%') OR "Name" LIKE CONCAT('%', @Keyword, '%')"#,
        );
        assert_eq!(
            q.sql(),
            r#""Code" LIKE CONCAT('%', $1, '%') OR "Name" LIKE CONCAT('%', $1, '%')"#
        );
        assert_eq!(q.names(), ["Keyword"]);
    }

    #[test]
    fn ignores_markers_in_literals_identifiers_and_comments() {
        let q = NamedSql::parse(
            "SELECT '@nope', \"@col\" -- @comment\n FROM t /* @block */ WHERE a = @Yes",
        );
        assert_eq!(
            q.sql(),
            "SELECT '@nope', \"@col\" -- @comment\n FROM t /* @block */ WHERE a = $1"
        );
        assert_eq!(q.names(), ["Yes"]);
    }

    #[test]
    fn escaped_quotes_do_not_end_literal() {
        let q = NamedSql::parse("SELECT 'it''s @x' WHERE a = @A");
        assert_eq!(q.sql(), "SELECT 'it''s @x' WHERE a = $1");
    }

    #[test]
    fn escape_strings_honour_backslashes() {
        let q = NamedSql::parse(r"SELECT E'it\'s @x', e'\\' WHERE a = @A");
        assert_eq!(q.sql(), r"SELECT E'it\'s @x', e'\\' WHERE a = $1");
        assert_eq!(q.names(), ["A"]);
    }

    #[test]
    fn tagged_dollar_quotes_are_not_scanned() {
        let q = NamedSql::parse("DO $fn$ BEGIN PERFORM @inner; END $fn$; SELECT $$@x$$, @Outer");
        assert_eq!(
            q.sql(),
            "DO $fn$ BEGIN PERFORM @inner; END $fn$; SELECT $$@x$$, $1"
        );
        assert_eq!(q.names(), ["Outer"]);
    }

    #[test]
    fn params_ref_borrows_from_the_source_not_the_slice() {
        let params = Params::new().bind("A", 1_i32);
        let refs = {
            let values = NamedSql::parse("a = @A").bind(&params).unwrap();
            params_ref(&values)
        };
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn leaves_operators_alone() {
        let q = NamedSql::parse("tags @> @Tags AND doc @@ to_tsquery(@Q) AND user@host");
        assert_eq!(q.sql(), "tags @> $1 AND doc @@ to_tsquery($2) AND user@host");
        assert_eq!(q.names(), ["Tags", "Q"]);
    }

    #[test]
    fn any_array_marker() {
        let q = NamedSql::parse(r#""SOPId" = ANY (@SOPIds)"#);
        assert_eq!(q.sql(), r#""SOPId" = ANY ($1)"#);
    }

    #[test]
    fn passes_through_text_without_markers() {
        let sql = "SELECT * FROM public.\"Machine\" WHERE \"Deleted\" = 0 -- ünïcode";
        assert_eq!(NamedSql::parse(sql).sql(), sql);
    }

    #[test]
    fn bind_resolves_names_and_reports_missing() {
        let q = NamedSql::parse("a = @A AND b = @B");
        let ok = Params::new().bind("A", 1_i32).bind("B", "x");
        assert_eq!(q.bind(&ok).unwrap().len(), 2);

        let missing = Params::new().bind("A", 1_i32);
        let err = q.bind(&missing).unwrap_err();
        assert!(err.to_string().contains("@B"));
    }
}
