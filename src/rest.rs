//! HTTP backend for `LogStore`, speaking PostgREST.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::auth::Session;
use crate::error::TransportError;
use crate::filter::{self, LogQuery, QueryParams};
use crate::log::{Level, LogRecord, LogStore};

const LOG_TABLE: &str = "app_logs";
const CRASH_TABLE: &str = "crash_reports";

/// Whole-request deadline. A stalled call ends as `TransportError::Request`.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared client for auth and table requests.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("supalog/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
}

/// Project URL and public API key. Immutable for the life of the process.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub anon_key: String,
}

impl Endpoint {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn table(&self, table: &str) -> String {
        self.url(&format!("/rest/v1/{table}"))
    }
}

/// Authenticated client for the log and crash-report tables.
///
/// Every request carries the API key and bearer token; nothing is mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    endpoint: Endpoint,
    headers: HeaderMap,
}

impl RestStore {
    pub fn new(client: Client, endpoint: Endpoint, session: &Session) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&endpoint.anon_key)?);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", session.access_token))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        Ok(Self { client, endpoint, headers })
    }

    fn get(&self, table: &str, params: &QueryParams) -> RequestBuilder {
        self.client
            .get(self.endpoint.table(table))
            .headers(self.headers.clone())
            .query(&params.iter().collect::<Vec<_>>())
    }

    async fn select<T>(&self, table: &str, params: &QueryParams) -> Result<Vec<T>, TransportError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let resp = self.get(table, params).send().await.map_err(TransportError::Request)?;
        let resp = ensure_success(resp).await?;
        resp.json().await.map_err(TransportError::Decode)
    }

    /// Exact row count via `HEAD` + `Prefer: count=exact`.
    async fn count(&self, table: &str, params: &QueryParams) -> Result<u64, TransportError> {
        let resp = self
            .client
            .head(self.endpoint.table(table))
            .headers(self.headers.clone())
            .header("Prefer", "count=exact")
            .query(&params.iter().collect::<Vec<_>>())
            .send()
            .await
            .map_err(TransportError::Request)?;
        let resp = ensure_success(resp).await?;
        let header = resp
            .headers()
            .get(CONTENT_RANGE)
            .ok_or(TransportError::MissingCount)?;
        let raw = header
            .to_str()
            .map_err(|_| TransportError::InvalidContentRange(format!("{header:?}")))?;
        parse_content_range(raw)
    }
}

#[async_trait]
impl LogStore for RestStore {
    #[instrument(level = "debug", skip_all, fields(mode = ?query.mode))]
    async fn list(&self, query: &LogQuery) -> Result<Vec<LogRecord>, TransportError> {
        let params = query.params();
        debug!(?params, "listing log rows");
        self.select(LOG_TABLE, &params).await
    }

    async fn count_logs(
        &self,
        since: DateTime<Utc>,
        level: Option<Level>,
    ) -> Result<u64, TransportError> {
        self.count(LOG_TABLE, &filter::count_params(since, level)).await
    }

    async fn sample_users(
        &self,
        since: DateTime<Utc>,
        cap: usize,
    ) -> Result<Vec<Option<String>>, TransportError> {
        #[derive(Deserialize)]
        struct UserRow {
            user_email: Option<String>,
        }

        let rows: Vec<UserRow> = self
            .select(LOG_TABLE, &filter::user_sample_params(since, cap))
            .await?;
        Ok(rows.into_iter().map(|r| r.user_email).collect())
    }

    async fn count_unresolved_crashes(&self, since: DateTime<Utc>) -> Result<u64, TransportError> {
        self.count(CRASH_TABLE, &filter::unresolved_crash_params(since)).await
    }
}

async fn ensure_success(resp: Response) -> Result<Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status { status, body })
}

/// Total from `content-range: <start>-<end>/<total>` (`*/<total>` when empty).
pub fn parse_content_range(raw: &str) -> Result<u64, TransportError> {
    raw.rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
        .ok_or_else(|| TransportError::InvalidContentRange(raw.to_string()))
}
