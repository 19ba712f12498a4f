//! In-memory `LogStore` and record builders shared by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::Map;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::filter::{LogQuery, QueryMode};
use crate::log::{Level, LogRecord, LogStore};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 20, 12, 0, 0).unwrap()
}

pub fn record(ts: DateTime<Utc>, level: Level, message: &str) -> LogRecord {
    LogRecord {
        timestamp: ts,
        level,
        module: None,
        user: None,
        message: message.to_string(),
        extra: Map::new(),
    }
}

pub fn unavailable() -> TransportError {
    TransportError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "upstream down".into(),
    }
}

/// Sub-queries a `MemoryStore` can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    List,
    Total,
    Level(Level),
    Users,
    Crashes,
}

/// Evaluates queries against a fixed set of rows, the way the server would.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Vec<LogRecord>,
    pub unresolved_crashes: u64,
    pub failures: Vec<Failure>,
    pub seen: Mutex<Vec<LogQuery>>,
}

impl MemoryStore {
    pub fn with_records(records: Vec<LogRecord>) -> Self {
        Self { records, ..Self::default() }
    }

    fn fails(&self, failure: Failure) -> Result<(), TransportError> {
        if self.failures.contains(&failure) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }

    fn in_window(&self, since: DateTime<Utc>) -> impl Iterator<Item = &LogRecord> {
        self.records.iter().filter(move |r| r.timestamp >= since)
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn list(&self, query: &LogQuery) -> Result<Vec<LogRecord>, TransportError> {
        self.seen.lock().unwrap().push(query.clone());
        self.fails(Failure::List)?;

        let f = &query.filter;
        let mut rows: Vec<LogRecord> = self
            .records
            .iter()
            .filter(|r| match query.mode {
                QueryMode::Snapshot => r.timestamp >= f.since,
                QueryMode::Tail => r.timestamp > f.since,
            })
            .filter(|r| f.level.is_none_or(|l| r.level == l))
            .filter(|r| f.module.is_none() || r.module == f.module)
            .filter(|r| f.user.is_none() || r.user == f.user)
            .filter(|r| {
                f.search.as_deref().is_none_or(|s| {
                    r.message.to_lowercase().contains(&s.to_lowercase())
                })
            })
            .cloned()
            .collect();

        rows.sort_by_key(|r| r.timestamp);
        if query.mode == QueryMode::Snapshot {
            rows.reverse();
        }
        rows.truncate(f.limit);
        Ok(rows)
    }

    async fn count_logs(
        &self,
        since: DateTime<Utc>,
        level: Option<Level>,
    ) -> Result<u64, TransportError> {
        match level {
            Some(l) => self.fails(Failure::Level(l))?,
            None => self.fails(Failure::Total)?,
        }
        Ok(self
            .in_window(since)
            .filter(|r| level.is_none_or(|l| r.level == l))
            .count() as u64)
    }

    async fn sample_users(
        &self,
        since: DateTime<Utc>,
        cap: usize,
    ) -> Result<Vec<Option<String>>, TransportError> {
        self.fails(Failure::Users)?;
        Ok(self.in_window(since).take(cap).map(|r| r.user.clone()).collect())
    }

    async fn count_unresolved_crashes(&self, _since: DateTime<Utc>) -> Result<u64, TransportError> {
        self.fails(Failure::Crashes)?;
        Ok(self.unresolved_crashes)
    }
}

/// One-shot HTTP/1.1 server on a loopback port. Captures the raw request it
/// receives and answers with a canned response.
pub struct Stub {
    pub base_url: String,
    request: JoinHandle<String>,
}

impl Stub {
    pub async fn reply(response: String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let request = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            raw
        });
        Self { base_url, request }
    }

    /// Accepts connections and never answers.
    pub async fn stall() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let request = tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                held.push(socket);
            }
        });
        Self { base_url, request }
    }

    /// The raw request (head and body) the server received.
    pub async fn request(self) -> String {
        self.request.await.unwrap()
    }
}

/// A complete response with `content-length` set and the connection closed.
pub fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("content-length: {}\r\nconnection: close\r\n\r\n{body}", body.len()));
    out
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
