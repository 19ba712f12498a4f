//! Window statistics assembled from independent count queries.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::TransportError;
use crate::filter::USER_SAMPLE_CAP;
use crate::log::{Level, LogStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub hours: u32,
    pub total: u64,
    pub level_counts: BTreeMap<Level, u64>,
    /// Percentage of error and fatal rows, in `[0, 100]`.
    pub error_rate: f64,
    /// Distinct users within the first `USER_SAMPLE_CAP` rows of the window.
    pub unique_users: u64,
    /// The user sample was full, so `unique_users` may undercount.
    pub unique_users_capped: bool,
    pub unresolved_crashes: u64,
    /// Sub-metrics that could not be fetched and were reported as zero.
    pub unavailable: Vec<String>,
}

/// `(error + fatal) / total * 100`, 0 for an empty window.
pub fn error_rate(total: u64, errors: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (errors as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Collects per-metric outcomes, substituting zero for failures.
struct Tally {
    unavailable: Vec<String>,
}

impl Tally {
    fn take<T: Default>(&mut self, metric: &str, result: Result<T, TransportError>) -> T {
        match result {
            Ok(v) => v,
            Err(e) => {
                warn!(metric, error = %e, "stats sub-query failed, counting as zero");
                self.unavailable.push(metric.to_string());
                T::default()
            }
        }
    }
}

/// Gather statistics for rows at or after `since`. Never fails as a whole.
pub async fn collect<S>(store: &S, since: DateTime<Utc>, hours: u32) -> StatsSummary
where
    S: LogStore + ?Sized,
{
    let mut tally = Tally { unavailable: Vec::new() };

    let total = tally.take("total", store.count_logs(since, None).await);

    let mut level_counts = BTreeMap::new();
    for level in Level::ALL {
        let count = tally.take(level.as_str(), store.count_logs(since, Some(level)).await);
        level_counts.insert(level, count);
    }

    let sample = tally.take("unique_users", store.sample_users(since, USER_SAMPLE_CAP).await);
    let unique_users_capped = sample.len() >= USER_SAMPLE_CAP;
    let unique_users = sample
        .into_iter()
        .flatten()
        .filter(|u| !u.is_empty())
        .collect::<HashSet<_>>()
        .len() as u64;

    let unresolved_crashes = tally.take(
        "unresolved_crashes",
        store.count_unresolved_crashes(since).await,
    );

    let errors = level_counts[&Level::Error] + level_counts[&Level::Fatal];

    StatsSummary {
        hours,
        total,
        level_counts,
        error_rate: error_rate(total, errors),
        unique_users,
        unique_users_capped,
        unresolved_crashes,
        unavailable: tally.unavailable,
    }
}
