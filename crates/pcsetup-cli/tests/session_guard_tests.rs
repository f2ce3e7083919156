#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Session guard behavior against a live HTTP backend: login, refresh
//! before expiry, forced logout on credential failures.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{ADMIN, USER, make_token, now, spawn_backend};
use pcsetup_cli::api::ApiClient;
use pcsetup_cli::service::SetupService;
use pcsetup_cli::session::{SessionGuard, SessionState};
use pcsetup_cli::store::{Credential, CredentialStore, Role};
use pcsetup_core::Error;
use pcsetup_core::config::ApiConfig;

// =========================================================================
// Login and logout
// =========================================================================

#[tokio::test]
async fn login_persists_the_credential() {
    let backend = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let guard = SessionGuard::new(backend.api(), CredentialStore::open(&path), 60);

    let role = guard.login(ADMIN.0, ADMIN.1).await.unwrap();
    assert_eq!(role, Role::Admin);
    assert_eq!(guard.state(), SessionState::LoggedIn(Role::Admin));

    let reopened = CredentialStore::open(&path);
    let cred = reopened.credential().unwrap();
    assert_eq!(cred.username, "admin");
    assert!(cred.refresh_token.is_some());
}

#[tokio::test]
async fn failed_login_keeps_the_current_session() {
    let backend = spawn_backend().await;
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();

    let err = guard.login(USER.0, "wrong").await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect username or password");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(guard.state(), SessionState::LoggedIn(Role::User));
    assert_eq!(guard.username().await.as_deref(), Some("taro"));
}

#[tokio::test]
async fn logout_is_idempotent() {
    let backend = spawn_backend().await;
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();
    let mut rx = guard.subscribe();

    guard.logout().await.unwrap();
    assert!(rx.has_changed().unwrap());
    let _ = rx.borrow_and_update();

    guard.logout().await.unwrap();
    assert!(!rx.has_changed().unwrap());
    assert_eq!(guard.state(), SessionState::LoggedOut);
    assert!(guard.credential().await.is_none());
}

#[tokio::test]
async fn calls_without_a_session_are_auth_errors() {
    let backend = spawn_backend().await;
    let guard = backend.guard();
    let err = guard.whoami().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(backend.hits("users/me"), 0);
}

// =========================================================================
// Refresh before expiry
// =========================================================================

#[tokio::test]
async fn fresh_token_is_used_as_is() {
    let backend = spawn_backend().await;
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();

    let me = guard.whoami().await.unwrap();
    assert_eq!(me.username, "taro");
    assert_eq!(backend.hits("refresh-token"), 0);
}

#[tokio::test]
async fn token_inside_the_buffer_is_refreshed_first() {
    let backend = spawn_backend().await;
    backend.with(|s| s.login_ttl_secs = 30);
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();
    let before = guard.credential().await.unwrap();

    let me = guard.whoami().await.unwrap();
    assert_eq!(me.username, "taro");
    assert_eq!(backend.hits("refresh-token"), 1);
    assert_eq!(backend.hits("users/me"), 1);
    assert_ne!(guard.credential().await.unwrap(), before);
    assert_eq!(guard.state(), SessionState::LoggedIn(Role::User));
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let backend = spawn_backend().await;
    backend.with(|s| s.login_ttl_secs = 30);
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();

    let (a, b) = tokio::join!(guard.whoami(), guard.whoami());
    a.unwrap();
    b.unwrap();
    assert_eq!(backend.hits("refresh-token"), 1);
}

#[tokio::test]
async fn rejected_refresh_logs_out() {
    let backend = spawn_backend().await;
    backend.with(|s| {
        s.login_ttl_secs = 30;
        s.refresh_fails = true;
    });
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();
    let mut rx = guard.subscribe();

    let err = guard.whoami().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(guard.state(), SessionState::LoggedOut);
    assert!(guard.credential().await.is_none());
    assert_eq!(backend.hits("users/me"), 0);
    assert!(rx.has_changed().unwrap());
}

#[tokio::test]
async fn unreachable_refresh_endpoint_logs_out() {
    let api = ApiClient::new(&ApiConfig {
        base_url: "http://127.0.0.1:1/api".into(),
        request_timeout_secs: 2,
    })
    .unwrap();
    let mut store = CredentialStore::in_memory();
    store
        .set(Credential {
            username: "taro".into(),
            role: Role::User,
            access_token: make_token(now() + 10, 1),
            refresh_token: Some("refresh-1".into()),
        })
        .unwrap();
    let guard = SessionGuard::new(api, store, 60);
    assert_eq!(guard.state(), SessionState::LoggedIn(Role::User));

    let err = guard.ensure_fresh_credential().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(guard.state(), SessionState::LoggedOut);
}

#[tokio::test]
async fn expired_token_without_refresh_token_logs_out() {
    let backend = spawn_backend().await;
    let mut store = CredentialStore::in_memory();
    store
        .set(Credential {
            username: "taro".into(),
            role: Role::User,
            access_token: make_token(now() - 5, 1),
            refresh_token: None,
        })
        .unwrap();
    let guard = SessionGuard::new(backend.api(), store, 60);

    assert!(guard.whoami().await.unwrap_err().is_auth());
    assert_eq!(guard.state(), SessionState::LoggedOut);
    assert_eq!(backend.hits("refresh-token"), 0);
}

// =========================================================================
// Credential failures on authorized calls
// =========================================================================

#[tokio::test]
async fn unauthorized_response_logs_out() {
    let backend = spawn_backend().await;
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();
    backend.with(|s| {
        s.status_error = Some((
            StatusCode::UNAUTHORIZED,
            json!({"detail": "Session revoked"}),
        ));
    });

    let service = SetupService::new(guard.clone());
    assert!(service.fetch_status("REQ1").await.unwrap_err().is_auth());
    assert_eq!(guard.state(), SessionState::LoggedOut);
}

#[tokio::test]
async fn token_complaint_in_error_body_logs_out() {
    let backend = spawn_backend().await;
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();
    backend.with(|s| {
        s.status_error = Some((
            StatusCode::BAD_REQUEST,
            json!({"detail": "Token has been revoked"}),
        ));
    });

    let service = SetupService::new(guard.clone());
    assert!(service.fetch_status("REQ1").await.unwrap_err().is_auth());
    assert_eq!(guard.state(), SessionState::LoggedOut);
}

#[tokio::test]
async fn other_api_errors_keep_the_session() {
    let backend = spawn_backend().await;
    let guard = backend.guard();
    guard.login(USER.0, USER.1).await.unwrap();
    backend.with(|s| {
        s.status_error = Some((StatusCode::NOT_FOUND, json!({"detail": "Request not found"})));
    });

    let service = SetupService::new(guard.clone());
    match service.fetch_status("REQ404").await.unwrap_err() {
        Error::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Request not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(guard.state(), SessionState::LoggedIn(Role::User));
}
