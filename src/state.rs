use chrono::{DateTime, Utc};

use crate::filter::{LogQuery, QueryFilter};
use crate::log::LogRecord;

/// Tail loop state. The cursor only exists once polling has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Waiting,
    Polling { cursor: DateTime<Utc> },
}

impl TailState {
    pub fn new() -> Self {
        TailState::Waiting
    }

    /// Waiting -> Polling with the cursor at `now`. Already polling: unchanged.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if let TailState::Waiting = self {
            *self = TailState::Polling { cursor: now };
        }
    }

    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        match self {
            TailState::Waiting => None,
            TailState::Polling { cursor } => Some(*cursor),
        }
    }

    /// Query for rows strictly after the cursor, or `None` before `start`.
    pub fn next_query(&self, template: &QueryFilter) -> Option<LogQuery> {
        self.cursor().map(|cursor| {
            LogQuery::tail(QueryFilter {
                since: cursor,
                ..template.clone()
            })
        })
    }

    /// Move the cursor to `record`'s timestamp. A row older than the cursor
    /// leaves it where it is.
    pub fn observe(&mut self, record: &LogRecord) {
        if let TailState::Polling { cursor } = self {
            if record.timestamp > *cursor {
                *cursor = record.timestamp;
            }
        }
    }
}

impl Default for TailState {
    fn default() -> Self {
        Self::new()
    }
}
