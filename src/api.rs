//! HTTP client for the deals backend.
//!
//! Every call goes through [`ApiClient`], which attaches credentials when the
//! caller passes a session and turns failed responses into [`ApiError`]s.
//! Reacting to those errors (clearing state, notices, redirects) is the job of
//! [`crate::session::SessionContext`].

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Session;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const FALLBACK_MESSAGE: &str = "An error occurred while processing your request.";

const SESSION_CONFLICT_MARKER: &str = "SESSION_CONFLICT";
const UNAUTHORIZED_MARKER: &str = "UNAUTHORIZED";

/// Backend routes this client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    ListDeals,
    DealFiles(i64),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::Login => "/auth/login".to_string(),
            Endpoint::ListDeals => "/deals/list".to_string(),
            Endpoint::DealFiles(id) => format!("/deals/{}/files", id),
        }
    }

    /// A rejected login is a bad password, not an expired session.
    pub fn is_login(&self) -> bool {
        matches!(self, Endpoint::Login)
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// The same account signed in somewhere else.
    #[error("session terminated by a login from another device")]
    SessionConflict { message: Option<String> },

    /// The backend no longer accepts the stored token.
    #[error("session expired")]
    SessionExpired { message: Option<String> },

    /// No response was received.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Any other failed response.
    #[error("Error {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// The envelope's `detail` when the backend sent it as plain text.
        detail: Option<String>,
    },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// True for the failures that end the session.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            ApiError::SessionConflict { .. } | ApiError::SessionExpired { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// POST a JSON body. Passing `credentials` merges the session token and
    /// website into the body.
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        body: Value,
        credentials: Option<&Session>,
    ) -> Result<T> {
        let body = match credentials {
            Some(session) => with_credentials(body, session),
            None => body,
        };
        let url = self.url(&endpoint.path());
        debug!(%url, authenticated = credentials.is_some(), "POST");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "no response from backend");
                ApiError::Network(e)
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiError::Network)?;
        if !status.is_success() {
            let err = classify(status, &bytes, endpoint.is_login());
            warn!(%url, status = status.as_u16(), error = %err, "request failed");
            return Err(err);
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET a file. Relative URLs resolve against the base URL.
    pub async fn download(&self, download_url: &str) -> Result<Vec<u8>> {
        let url = if download_url.starts_with("http://") || download_url.starts_with("https://") {
            download_url.to_string()
        } else {
            self.url(download_url)
        };
        debug!(%url, "GET");

        let response = self.http.get(&url).send().await.map_err(ApiError::Network)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiError::Network)?;
        if !status.is_success() {
            return Err(classify(status, &bytes, false));
        }
        Ok(bytes.to_vec())
    }
}

/// Merge `token` and `website` into a JSON object body. Anything else is
/// sent as it is.
pub fn with_credentials(body: Value, session: &Session) -> Value {
    match body {
        Value::Object(mut map) => {
            map.insert("token".to_string(), Value::String(session.token.clone()));
            map.insert(
                "website".to_string(),
                Value::String(session.site.as_str().to_string()),
            );
            Value::Object(map)
        }
        other => other,
    }
}

/// Turn a failed response into an error, most specific case first.
pub fn classify(status: StatusCode, body: &[u8], is_login: bool) -> ApiError {
    let envelope: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let detail = envelope.get("detail");
    let marker = detail
        .and_then(|d| d.get("error"))
        .and_then(Value::as_str);
    let detail_message = detail
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if status == StatusCode::CONFLICT && marker == Some(SESSION_CONFLICT_MARKER) {
        return ApiError::SessionConflict {
            message: detail_message,
        };
    }

    if status == StatusCode::UNAUTHORIZED && !is_login && marker == Some(UNAUTHORIZED_MARKER) {
        return ApiError::SessionExpired {
            message: detail_message,
        };
    }

    ApiError::Status {
        status: status.as_u16(),
        message: error_message(&envelope),
        detail: detail.and_then(Value::as_str).map(str::to_string),
    }
}

/// Best message in an error envelope: string `detail`, then
/// `detail.message`, then top-level `message`.
pub fn error_message(envelope: &Value) -> String {
    let empty = Map::new();
    let fields = envelope.as_object().unwrap_or(&empty);

    match fields.get("detail") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.is_empty() => {}
        Some(Value::String(s)) => return s.clone(),
        Some(detail) => {
            return detail
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(FALLBACK_MESSAGE)
                .to_string();
        }
    }

    fields
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(FALLBACK_MESSAGE)
        .to_string()
}
