//! Query construction: turns a filter set into PostgREST query parameters, and
//! the search term into a highlight pattern for display.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::{Regex, RegexBuilder};

use crate::log::Level;

/// Rows fetched per tail poll.
pub const TAIL_PAGE_SIZE: usize = 10;

/// Rows read to estimate distinct users. Stats report when the sample is full.
pub const USER_SAMPLE_CAP: usize = 1000;

/// Canonical parameter set: keys are unique and iterate in sorted order.
pub type QueryParams = BTreeMap<&'static str, String>;

/// Filter set for one request. Empty strings are treated as absent.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub since: DateTime<Utc>,
    pub level: Option<Level>,
    pub module: Option<String>,
    pub user: Option<String>,
    pub search: Option<String>,
    pub limit: usize,
}

impl QueryFilter {
    pub fn since(since: DateTime<Utc>, limit: usize) -> Self {
        Self {
            since,
            level: None,
            module: None,
            user: None,
            search: None,
            limit,
        }
    }
}

/// Snapshot reads a window newest-first; Tail reads strictly after a cursor,
/// oldest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Snapshot,
    Tail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub filter: QueryFilter,
    pub mode: QueryMode,
}

impl LogQuery {
    pub fn snapshot(filter: QueryFilter) -> Self {
        Self { filter, mode: QueryMode::Snapshot }
    }

    pub fn tail(filter: QueryFilter) -> Self {
        Self { filter, mode: QueryMode::Tail }
    }

    /// Parameters for the "list rows" endpoint.
    pub fn params(&self) -> QueryParams {
        let f = &self.filter;
        let mut params = QueryParams::new();

        let (bound, order) = match self.mode {
            QueryMode::Snapshot => ("gte", "timestamp.desc"),
            QueryMode::Tail => ("gt", "timestamp.asc"),
        };
        params.insert("timestamp", format!("{bound}.{}", format_instant(f.since)));
        params.insert("order", order.to_string());
        params.insert("limit", f.limit.to_string());

        if let Some(level) = f.level {
            params.insert("log_level", format!("eq.{level}"));
        }
        if let Some(module) = present(&f.module) {
            params.insert("module", format!("eq.{module}"));
        }
        if let Some(user) = present(&f.user) {
            params.insert("user_email", format!("eq.{user}"));
        }
        if let Some(search) = present(&f.search) {
            params.insert("message", format!("ilike.%{}%", escape_like(search)));
        }
        params
    }
}

/// Filters for a count-only request over a window, optionally one level. The
/// count itself comes from the `content-range` header.
pub fn count_params(since: DateTime<Utc>, level: Option<Level>) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("timestamp", format!("gte.{}", format_instant(since)));
    if let Some(level) = level {
        params.insert("log_level", format!("eq.{level}"));
    }
    params
}

/// Parameters for the bounded user sample.
pub fn user_sample_params(since: DateTime<Utc>, cap: usize) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("timestamp", format!("gte.{}", format_instant(since)));
    params.insert("select", "user_email".to_string());
    params.insert("limit", cap.to_string());
    params
}

/// Parameters for counting unresolved crash reports.
pub fn unresolved_crash_params(since: DateTime<Utc>) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("timestamp", format!("gte.{}", format_instant(since)));
    params.insert("resolved", "eq.false".to_string());
    params
}

/// RFC 3339 in UTC with `Z`, keeping sub-second digits the row carried.
pub fn format_instant(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Escape LIKE metacharacters so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Case-insensitive literal matcher for the search term, used to highlight
/// matches in rendered messages.
pub fn build_highlight(search: Option<&str>) -> anyhow::Result<Option<Regex>> {
    match search {
        Some(term) if !term.is_empty() => {
            let re = RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()?;
            Ok(Some(re))
        }
        _ => Ok(None),
    }
}
