//! Session guard: owns the credential and gates every authorized call.
//!
//! The access token is checked before each use and renewed through the
//! refresh endpoint when it is within the expiry buffer. Any refresh failure,
//! a 401, or a server message about the token ends the session.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pcsetup_core::{Error, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::api::{self, ApiClient, UserInfo};
use crate::store::{Credential, CredentialStore, Role};

/// Authentication state observed by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn(Role),
}

impl SessionState {
    fn from_store(store: &CredentialStore) -> Self {
        store
            .credential()
            .map_or(Self::LoggedOut, |c| Self::LoggedIn(c.role.clone()))
    }
}

struct Inner {
    api: ApiClient,
    /// Held across the refresh exchange so concurrent callers share one refresh.
    store: Mutex<CredentialStore>,
    expiry_buffer_secs: u64,
    state_tx: watch::Sender<SessionState>,
}

/// Cheaply cloneable handle to the single session.
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<Inner>,
}

impl SessionGuard {
    pub fn new(api: ApiClient, store: CredentialStore, expiry_buffer_secs: u64) -> Self {
        let (state_tx, _) = watch::channel(SessionState::from_store(&store));
        Self {
            inner: Arc::new(Inner {
                api,
                store: Mutex::new(store),
                expiry_buffer_secs,
                state_tx,
            }),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn state(&self) -> SessionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receive every login/logout transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Current access token, valid or not.
    pub async fn credential(&self) -> Option<String> {
        let store = self.inner.store.lock().await;
        store.credential().map(|c| c.access_token.clone())
    }

    pub async fn username(&self) -> Option<String> {
        let store = self.inner.store.lock().await;
        store.credential().map(|c| c.username.clone())
    }

    pub async fn role(&self) -> Option<Role> {
        let store = self.inner.store.lock().await;
        store.credential().map(|c| c.role.clone())
    }

    /// Authenticate and persist the resulting credential.
    ///
    /// On failure the existing session, if any, is left untouched.
    pub async fn login(&self, username: &str, password: &str) -> Result<Role> {
        let tokens = self.inner.api.login(username, password).await?;
        let role = tokens.role.unwrap_or(Role::User);
        let mut store = self.inner.store.lock().await;
        store.set(Credential {
            username: username.to_string(),
            role: role.clone(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })?;
        info!(%username, %role, "logged in");
        self.inner
            .state_tx
            .send_replace(SessionState::LoggedIn(role.clone()));
        Ok(role)
    }

    /// Clear the session. Calling this while logged out is a no-op.
    pub async fn logout(&self) -> Result<()> {
        let mut store = self.inner.store.lock().await;
        self.end_session(&mut store)
    }

    fn end_session(&self, store: &mut CredentialStore) -> Result<()> {
        let had_session = store.credential().is_some();
        // The state flips even if the file cannot be rewritten.
        let cleared = store.clear();
        self.inner.state_tx.send_if_modified(|state| {
            let changed = *state != SessionState::LoggedOut;
            *state = SessionState::LoggedOut;
            changed
        });
        if had_session {
            info!("session cleared");
        }
        cleared
    }

    /// Force a logout on an auth failure and return the error to propagate.
    fn force_logout(&self, store: &mut CredentialStore, message: String) -> Error {
        warn!(reason = %message, "forcing logout");
        if let Err(e) = self.end_session(store) {
            warn!(error = %e, "failed to clear session file");
        }
        Error::Auth(message)
    }

    /// Return an access token that is not about to expire, refreshing it if
    /// necessary.
    pub async fn ensure_fresh_credential(&self) -> Result<String> {
        let mut store = self.inner.store.lock().await;
        let Some(credential) = store.credential().cloned() else {
            return Err(Error::Auth("Not logged in".into()));
        };
        if !is_expired(
            Some(&credential.access_token),
            unix_now(),
            self.inner.expiry_buffer_secs,
        ) {
            return Ok(credential.access_token);
        }

        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            return Err(self.force_logout(&mut store, "Session expired".into()));
        };
        debug!("access token expiring, refreshing");
        let renewed = match self.inner.api.refresh(refresh_token).await {
            Ok(renewed) => renewed,
            Err(e) => {
                return Err(self.force_logout(&mut store, format!("Session expired: {e}")));
            }
        };

        let access_token = renewed.access_token;
        store.set(Credential {
            access_token: access_token.clone(),
            refresh_token: renewed.refresh_token.or(credential.refresh_token),
            ..credential
        })?;
        debug!("access token refreshed");
        Ok(access_token)
    }

    /// Send `request` with a fresh bearer token.
    ///
    /// Non-success responses become [`Error::Api`], except those that signal a
    /// credential problem: those end the session and become [`Error::Auth`].
    pub async fn authorized_request(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.ensure_fresh_credential().await?;
        let resp = api::send(request.bearer_auth(token)).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = api::read_error_message(resp).await;
        if status == StatusCode::UNAUTHORIZED || mentions_credential_problem(&message) {
            let mut store = self.inner.store.lock().await;
            return Err(self.force_logout(&mut store, message));
        }
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// `GET /users/me`.
    pub async fn whoami(&self) -> Result<UserInfo> {
        let resp = self
            .authorized_request(self.inner.api.get("/users/me"))
            .await?;
        api::read_json(resp).await
    }
}

fn mentions_credential_problem(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("token") || lower.contains("credential")
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Expiry claim of a JWT-shaped token, if it can be read.
#[allow(clippy::cast_possible_truncation)]
pub fn token_expiry(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    match claims.get("exp")? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        _ => None,
    }
}

/// Whether `token` must be refreshed before use at time `now` (unix seconds).
///
/// Absent or unreadable tokens count as expired.
pub fn is_expired(token: Option<&str>, now: i64, buffer_secs: u64) -> bool {
    let Some(exp) = token.and_then(token_expiry) else {
        return true;
    };
    let buffer = i64::try_from(buffer_secs).unwrap_or(i64::MAX);
    exp.saturating_sub(now) <= buffer
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn token_with(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn expiry_buffer_boundaries() {
        let now = 1_700_000_000;
        let token = |offset: i64| token_with(&format!(r#"{{"exp": {}}}"#, now + offset));

        assert!(is_expired(Some(&token(30)), now, 60));
        assert!(is_expired(Some(&token(60)), now, 60));
        assert!(!is_expired(Some(&token(61)), now, 60));
        assert!(!is_expired(Some(&token(120)), now, 60));
        assert!(is_expired(Some(&token(-5)), now, 60));
    }

    #[test]
    fn unreadable_tokens_are_expired() {
        let now = 1_700_000_000;
        assert!(is_expired(None, now, 60));
        assert!(is_expired(Some("not-a-token"), now, 60));
        assert!(is_expired(Some("a.b"), now, 60));
        assert!(is_expired(Some("a.!!!.c"), now, 60));
        assert!(is_expired(Some(&token_with("not json")), now, 60));
        assert!(is_expired(Some(&token_with(r#"{"sub": "alice"}"#)), now, 60));
        assert!(is_expired(Some(&token_with(r#"{"exp": "soon"}"#)), now, 60));
        assert!(is_expired(Some("a.b.c.d"), now, 60));
    }

    #[test]
    fn padded_payload_is_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp": 100}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(token_expiry(&token), Some(100));
    }

    #[test]
    fn credential_problem_heuristic() {
        assert!(mentions_credential_problem("Could not validate credentials"));
        assert!(mentions_credential_problem("Token has expired"));
        assert!(!mentions_credential_problem("Request REQ1 not found"));
    }

    #[tokio::test]
    async fn initial_state_reflects_store() {
        let api = ApiClient::new(&pcsetup_core::config::ApiConfig::default()).unwrap();
        let guard = SessionGuard::new(api, CredentialStore::in_memory(), 60);
        assert_eq!(guard.state(), SessionState::LoggedOut);
        assert!(guard.credential().await.is_none());
        assert!(matches!(
            guard.ensure_fresh_credential().await,
            Err(Error::Auth(_))
        ));
    }
}
