//! Log data model and the store abstraction.
//!
//! `LogStore` is the seam between the query/tail/stats logic and the wire. The
//! application runtime depends on this trait; `rest::RestStore` is the HTTP
//! backend and tests plug in an in-memory one.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::filter::LogQuery;

/// Severity of a log row, lowercase on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub const ALL: [Level; 5] = [Level::Debug, Level::Info, Level::Warn, Level::Error, Level::Fatal];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the remote log table. Read-only once decoded.
///
/// Columns the tool does not know about are kept in `extra` so JSON output and
/// exports reproduce the row as the server sent it. Two things are normalised:
/// `timestamp` is written back as RFC 3339 UTC, and absent `module` or
/// `user_email` columns stay absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "log_level")]
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(rename = "user_email", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts RFC 3339 with any offset, or a bare `timestamp without time zone`
/// which is taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

/// Read-only view of the remote log and crash-report collections.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Rows matching `query`, in the order the query asks for.
    async fn list(&self, query: &LogQuery) -> Result<Vec<LogRecord>, TransportError>;

    /// Number of log rows at or after `since`, optionally of one level.
    async fn count_logs(
        &self,
        since: DateTime<Utc>,
        level: Option<Level>,
    ) -> Result<u64, TransportError>;

    /// User identifiers of at most `cap` log rows at or after `since`.
    async fn sample_users(
        &self,
        since: DateTime<Utc>,
        cap: usize,
    ) -> Result<Vec<Option<String>>, TransportError>;

    /// Number of unresolved crash reports at or after `since`.
    async fn count_unresolved_crashes(&self, since: DateTime<Utc>) -> Result<u64, TransportError>;
}
