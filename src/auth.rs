//! Password grant against the project's auth endpoint.

use std::fmt;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::AuthError;
use crate::rest::Endpoint;

pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token issued for the signed-in user.
#[derive(Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("access_token", &"<redacted>").finish()
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// Error bodies differ between auth server versions.
#[derive(Deserialize)]
struct AuthErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl AuthErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

#[instrument(level = "debug", skip_all, fields(email = %credentials.email))]
pub async fn authenticate(
    client: &Client,
    endpoint: &Endpoint,
    credentials: &Credentials,
) -> Result<Session, AuthError> {
    let resp = client
        .post(endpoint.url("/auth/v1/token"))
        .query(&[("grant_type", "password")])
        .header("apikey", &endpoint.anon_key)
        .json(&PasswordGrant {
            email: &credentials.email,
            password: &credentials.password,
        })
        .send()
        .await
        .map_err(AuthError::Network)?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<AuthErrorBody>(&text)
            .ok()
            .and_then(AuthErrorBody::into_message)
            .unwrap_or(text);
        return Err(AuthError::Rejected { status, message });
    }

    let session: Session = resp.json().await.map_err(AuthError::MalformedResponse)?;
    debug!("access token issued");
    Ok(session)
}
