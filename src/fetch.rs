use tracing::{info, warn};

use crate::error::TransportError;
use crate::filter::{LogQuery, QueryFilter};
use crate::log::{LogRecord, LogStore};

/// One bounded request for the window described by `filter`, newest first.
pub async fn fetch<S>(store: &S, filter: &QueryFilter) -> Result<Vec<LogRecord>, TransportError>
where
    S: LogStore + ?Sized,
{
    let records = store.list(&LogQuery::snapshot(filter.clone())).await?;
    info!(rows = records.len(), "fetched logs");
    if records.len() >= filter.limit {
        warn!(limit = filter.limit, "result truncated at limit, narrow the filters or raise --limit");
    }
    Ok(records)
}

/// Display order for a newest-first result.
pub fn oldest_first(mut records: Vec<LogRecord>) -> Vec<LogRecord> {
    records.reverse();
    records
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::filter::QueryMode;
    use crate::log::Level;
    use crate::testing::{Failure, MemoryStore, record, t0};

    fn mixed_store() -> MemoryStore {
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(record(t0() - Duration::hours(i * 3 + 1), Level::Error, "err"));
        }
        for i in 0..10 {
            records.push(record(t0() - Duration::hours(i * 2), Level::Info, "ok"));
        }
        // Outside the window.
        records.push(record(t0() - Duration::hours(30), Level::Error, "old"));
        MemoryStore::with_records(records)
    }

    #[tokio::test]
    async fn level_filter_returns_only_matching_rows_newest_first() {
        let store = mixed_store();
        let filter = QueryFilter {
            level: Some(Level::Error),
            ..QueryFilter::since(t0() - Duration::hours(24), 100)
        };

        let records = fetch(&store, &filter).await.unwrap();

        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.level == Level::Error && r.message == "err"));
        assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let shown = oldest_first(records);
        assert!(shown.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(shown.last().unwrap().timestamp, t0() - Duration::hours(1));

        let seen = store.seen.lock().unwrap();
        assert_eq!(seen[0].mode, QueryMode::Snapshot);
    }

    #[tokio::test]
    async fn limit_bounds_the_result() {
        let store = mixed_store();
        let filter = QueryFilter::since(t0() - Duration::hours(24), 3);
        let records = fetch(&store, &filter).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].timestamp, t0());
    }

    #[tokio::test]
    async fn transport_failure_is_returned_to_caller() {
        let store = MemoryStore {
            failures: vec![Failure::List],
            ..mixed_store()
        };
        let filter = QueryFilter::since(t0() - Duration::hours(24), 100);
        assert!(matches!(
            fetch(&store, &filter).await,
            Err(TransportError::Status { .. })
        ));
    }
}
