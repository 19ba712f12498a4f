use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Credentials rejected, or the auth endpoint could not be reached.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("could not reach the auth endpoint: {0}")]
    Network(#[source] reqwest::Error),

    #[error("auth endpoint returned an unreadable response: {0}")]
    MalformedResponse(#[source] reqwest::Error),
}

/// Any failure while querying the remote store.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response body: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("response carried no content-range header")]
    MissingCount,

    #[error("unparsable content-range header '{0}'")]
    InvalidContentRange(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export I/O error '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON export error '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
