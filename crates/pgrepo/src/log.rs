//! `tracing` output for executed SQL.
//!
//! Events are emitted with target `pgrepo.sql` **before** a statement is sent,
//! so failed statements are visible too. Install any subscriber to see them,
//! e.g. `RUST_LOG=pgrepo.sql=debug`.

use crate::config::LogSettings;
use crate::error::{RepoError, RepoResult};
use tracing::Level;

/// How executed SQL is logged.
#[derive(Debug, Clone)]
pub struct SqlLog {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLog {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &LogSettings) -> RepoResult<Self> {
        Ok(Self {
            level: parse_level(&settings.level)?,
            max_sql_length: settings.max_sql_length,
        })
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_bytes(sql, max)).into(),
            _ => sql.into(),
        }
    }

    /// Emit one statement event. `table` is empty for caller-written SQL.
    pub(crate) fn statement(&self, op: &'static str, table: &str, sql: &str, param_count: usize) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    _ => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        emit_at_level!(
            self.level,
            target: "pgrepo.sql",
            op,
            table,
            param_count,
            sql = %sql,
        );
    }
}

/// Parse a level name (`error`..`trace`, case-insensitive).
pub fn parse_level(level: &str) -> RepoResult<Level> {
    level
        .trim()
        .parse::<Level>()
        .map_err(|_| RepoError::Config(format!("unknown log level '{level}'")))
}

/// Truncate at a char boundary at or below `max` bytes.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
