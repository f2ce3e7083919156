//! Backend REST client.
//!
//! Thin typed wrapper over reqwest. Endpoints that need a bearer token are
//! only reachable through [`crate::session::SessionGuard::authorized_request`];
//! this module builds those requests and handles the unauthenticated ones
//! (login, refresh, sample CSV) itself.

use pcsetup_core::config::ApiConfig;
use pcsetup_core::{Computer, Error, Result, SetupRequest};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::Role;

/// Response of `POST /token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Response of `POST /refresh-token`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    /// Absent when the backend keeps the old refresh token valid.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Response of `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub computers: Vec<Computer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateResponse {
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub requests: Vec<SetupRequest>,
}

/// Body of `POST /setup/approve`.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalDecision {
    pub request_id: String,
    pub approver: String,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Setup backend HTTP client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::Config("api.base_url is empty".into()));
        }

        // reqwest is built with rustls-no-provider; an `Err` here only means a
        // provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    /// Exchange username and password for a token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let request = self
            .post("/token")
            .form(&[("username", username), ("password", password)]);
        let resp = check_status(send(request).await?).await?;
        read_json(resp).await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let request = self
            .post("/refresh-token")
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        let resp = check_status(send(request).await?).await?;
        read_json(resp).await
    }

    /// Download the CSV template. No credential required.
    pub async fn sample_csv(&self) -> Result<Vec<u8>> {
        let resp = check_status(send(self.get("/sample-csv")).await?).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Send a request, mapping transport failures to [`Error::Network`].
pub(crate) async fn send(request: RequestBuilder) -> Result<Response> {
    request.send().await.map_err(|e| {
        debug!(error = %e, "request failed before a response arrived");
        Error::Network(e.to_string())
    })
}

/// Pass success responses through; turn anything else into [`Error::Api`].
pub(crate) async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(Error::Api {
        status: status.as_u16(),
        message: read_error_message(resp).await,
    })
}

/// Best-effort server message for a failed response.
pub(crate) async fn read_error_message(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    error_message(status, &body)
}

pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Extract the human-readable message from an error body.
///
/// Prefers `detail`, then `message`; any other body is returned as opaque
/// text, and an empty body falls back to the status reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["detail", "message"] {
            match map.get(field) {
                Some(serde_json::Value::String(s)) => return s.clone(),
                Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}
