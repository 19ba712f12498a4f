//! Polling tail: repeatedly asks for rows newer than the cursor.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::filter::{QueryFilter, TAIL_PAGE_SIZE};
use crate::log::{LogRecord, LogStore};
use crate::state::TailState;

#[derive(Debug, Clone)]
pub struct TailSettings {
    /// Pause after a successful poll.
    pub interval: Duration,
    /// Pause after a failed poll, before retrying with the same cursor.
    pub retry_delay: Duration,
    pub page_size: usize,
}

impl Default for TailSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            retry_delay: Duration::from_secs(5),
            page_size: TAIL_PAGE_SIZE,
        }
    }
}

/// Follow the store from `now` until `cancel` fires, handing every new row to
/// `emit` in ascending timestamp order. Returns the final state.
///
/// Cancellation is observed before each request, while a request is in flight
/// and during each pause. An abandoned request has emitted nothing, so a page
/// is either emitted in full or not at all.
pub async fn follow<S, F>(
    store: &S,
    filter: &QueryFilter,
    settings: &TailSettings,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
    mut emit: F,
) -> TailState
where
    S: LogStore + ?Sized,
    F: FnMut(&LogRecord),
{
    let template = QueryFilter {
        limit: settings.page_size,
        ..filter.clone()
    };
    let mut state = TailState::new();
    state.start(now);
    info!(cursor = %now, "tail started");

    while !cancel.is_cancelled() {
        let Some(query) = state.next_query(&template) else {
            break;
        };

        let polled = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = store.list(&query) => polled,
        };
        let pause = match polled {
            Ok(records) => {
                debug!(rows = records.len(), "tail poll");
                for record in &records {
                    emit(record);
                    state.observe(record);
                }
                settings.interval
            }
            Err(e) => {
                warn!(error = %e, cursor = %query.filter.since, "tail poll failed, retrying");
                settings.retry_delay
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    info!(cursor = ?state.cursor(), "tail stopped");
    state
}
