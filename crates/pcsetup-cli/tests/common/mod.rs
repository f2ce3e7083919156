//! In-process fake of the setup backend.
//!
//! Issues JWT-shaped tokens with a real `exp` claim, enforces bearer auth on
//! the authorized routes, and records every call for assertions.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

use pcsetup_cli::api::ApiClient;
use pcsetup_cli::dispatch::Controller;
use pcsetup_cli::draft::DraftStore;
use pcsetup_cli::service::SetupService;
use pcsetup_cli::session::SessionGuard;
use pcsetup_cli::store::CredentialStore;
use pcsetup_core::config::ApiConfig;

pub const ADMIN: (&str, &str) = ("admin", "admin-pass");
pub const USER: (&str, &str) = ("taro", "taro-pass");

/// A `POST /setup/create` call as the backend saw it.
#[derive(Debug, Clone)]
pub struct CreatedRequest {
    pub requester: String,
    pub computers: Value,
    pub options: Value,
}

struct Issued {
    username: String,
    role: String,
    exp: i64,
}

pub struct BackendState {
    hits: HashMap<&'static str, usize>,
    tokens: HashMap<String, Issued>,
    refresh_tokens: HashMap<String, String>,
    serial: u64,
    /// Lifetime of tokens issued by `/token`.
    pub login_ttl_secs: i64,
    /// Lifetime of tokens issued by `/refresh-token`.
    pub refresh_ttl_secs: i64,
    pub refresh_fails: bool,
    pub upload_rows: Vec<Value>,
    pub uploaded_files: Vec<(String, Vec<u8>)>,
    pub created: Vec<CreatedRequest>,
    pub create_error: Option<(StatusCode, Value)>,
    pub decisions: Vec<Value>,
    pub requests: Vec<Value>,
    pub list_queries: Vec<HashMap<String, String>>,
    pub status_reply: Value,
    pub status_error: Option<(StatusCode, Value)>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            hits: HashMap::new(),
            tokens: HashMap::new(),
            refresh_tokens: HashMap::new(),
            serial: 0,
            login_ttl_secs: 3600,
            refresh_ttl_secs: 3600,
            refresh_fails: false,
            upload_rows: Vec::new(),
            uploaded_files: Vec::new(),
            created: Vec::new(),
            create_error: None,
            decisions: Vec::new(),
            requests: Vec::new(),
            list_queries: Vec::new(),
            status_reply: json!({"status": "in_progress", "progress": 10}),
            status_error: None,
        }
    }
}

impl BackendState {
    fn hit(&mut self, route: &'static str) {
        *self.hits.entry(route).or_default() += 1;
    }

    fn issue(&mut self, username: &str, role: &str, ttl: i64) -> (String, String) {
        self.serial += 1;
        let exp = now() + ttl;
        let access = make_token(exp, self.serial);
        self.tokens.insert(
            access.clone(),
            Issued {
                username: username.to_string(),
                role: role.to_string(),
                exp,
            },
        );
        let refresh = format!("refresh-{}", self.serial);
        self.refresh_tokens.insert(refresh.clone(), access.clone());
        (access, refresh)
    }

    /// Username and role behind a valid bearer header.
    fn authorize(&self, headers: &HeaderMap) -> Result<(String, String), Response> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match token.and_then(|t| self.tokens.get(t)) {
            Some(issued) if issued.exp > now() => Ok((issued.username.clone(), issued.role.clone())),
            _ => Err(error(StatusCode::UNAUTHORIZED, "Could not validate credentials")),
        }
    }
}

type Shared = Arc<Mutex<BackendState>>;

pub struct Backend {
    pub addr: SocketAddr,
    pub base_url: String,
    state: Shared,
}

impl Backend {
    /// Run `f` against the backend state.
    pub fn with<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn hits(&self, route: &str) -> usize {
        self.with(|s| s.hits.get(route).copied().unwrap_or(0))
    }

    pub fn created(&self) -> Vec<CreatedRequest> {
        self.with(|s| s.created.clone())
    }

    pub fn api(&self) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: self.base_url.clone(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    /// Guard with an in-memory credential store.
    pub fn guard(&self) -> SessionGuard {
        SessionGuard::new(self.api(), CredentialStore::in_memory(), 60)
    }

    pub fn controller(&self) -> Controller {
        Controller::new(
            SetupService::new(self.guard()),
            Duration::from_secs(5),
            DraftStore::in_memory(),
        )
    }
}

pub fn now() -> i64 {
    i64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()).unwrap()
}

/// JWT-shaped token whose payload carries `exp`.
pub fn make_token(exp: i64, nonce: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({"sub": "test", "exp": exp, "n": nonce}).to_string());
    format!("{header}.{payload}.signature")
}

/// One upload row in the backend's computer shape.
pub fn computer_row(name: &str) -> Value {
    json!({
        "computer_name": name,
        "ip_address": format!("10.0.0.{}", name.len()),
        "login_type": "LocalExisting",
        "local_existing_username": "admin",
        "local_existing_password": "secret",
        "full_name": "",
        "admin_privilege": false
    })
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

pub async fn spawn_backend() -> Backend {
    let state: Shared = Arc::new(Mutex::new(BackendState::default()));
    let app = Router::new()
        .route("/api/token", post(token))
        .route("/api/refresh-token", post(refresh_token))
        .route("/api/users/me", get(users_me))
        .route("/api/sample-csv", get(sample_csv))
        .route("/api/setup/upload-csv", post(upload_csv))
        .route("/api/setup/create", post(create))
        .route("/api/setup/list", get(list))
        .route("/api/setup/approve", post(approve))
        .route("/api/setup/{request_id}/status", get(status))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend {
        addr,
        base_url: format!("http://{addr}/api"),
        state,
    }
}

// =========================================================================
// Handlers
// =========================================================================

async fn token(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut s = state.lock().unwrap();
    s.hit("token");
    let username = form.get("username").map_or("", String::as_str);
    let password = form.get("password").map_or("", String::as_str);
    let role = match (username, password) {
        u if u == ADMIN => "admin",
        u if u == USER => "user",
        _ => return error(StatusCode::UNAUTHORIZED, "Incorrect username or password"),
    };
    let ttl = s.login_ttl_secs;
    let (access, refresh) = s.issue(username, role, ttl);
    Json(json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "role": role
    }))
    .into_response()
}

async fn refresh_token(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    s.hit("refresh-token");
    if s.refresh_fails {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    let old_access = body["refresh_token"]
        .as_str()
        .and_then(|r| s.refresh_tokens.get(r))
        .cloned();
    let Some((username, role)) = old_access
        .and_then(|a| s.tokens.get(&a).map(|i| (i.username.clone(), i.role.clone())))
    else {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    };
    let ttl = s.refresh_ttl_secs;
    let (access, refresh) = s.issue(&username, &role, ttl);
    Json(json!({ "access_token": access, "refresh_token": refresh })).into_response()
}

async fn users_me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut s = state.lock().unwrap();
    s.hit("users/me");
    match s.authorize(&headers) {
        Ok((username, role)) => Json(json!({ "username": username, "role": role })).into_response(),
        Err(resp) => resp,
    }
}

async fn sample_csv(State(state): State<Shared>) -> Response {
    state.lock().unwrap().hit("sample-csv");
    (
        [("content-type", "text/csv")],
        "computer_name,ip_address,login_type\nPC1,10.0.0.1,AD\n",
    )
        .into_response()
}

async fn upload_csv(State(state): State<Shared>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    {
        let mut s = state.lock().unwrap();
        s.hit("upload-csv");
        if let Err(resp) = s.authorize(&headers) {
            return resp;
        }
    }
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            files.push((name, field.bytes().await.unwrap().to_vec()));
        }
    }
    let mut s = state.lock().unwrap();
    s.uploaded_files.extend(files);
    Json(json!({ "computers": s.upload_rows })).into_response()
}

async fn create(State(state): State<Shared>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    {
        let mut s = state.lock().unwrap();
        s.hit("create");
        if let Err(resp) = s.authorize(&headers) {
            return resp;
        }
    }
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        fields.insert(name, field.text().await.unwrap());
    }
    let mut s = state.lock().unwrap();
    if let Some((status, body)) = s.create_error.clone() {
        return (status, Json(body)).into_response();
    }
    s.created.push(CreatedRequest {
        requester: fields.remove("requester").unwrap_or_default(),
        computers: serde_json::from_str(&fields.remove("computers_json").unwrap_or_default())
            .unwrap_or(Value::Null),
        options: serde_json::from_str(&fields.remove("options_json").unwrap_or_default())
            .unwrap_or(Value::Null),
    });
    let request_id = format!("REQ{:04}", s.created.len());
    Json(json!({ "request_id": request_id, "message": "accepted" })).into_response()
}

async fn list(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.hit("list");
    if let Err(resp) = s.authorize(&headers) {
        return resp;
    }
    let requests: Vec<Value> = s
        .requests
        .iter()
        .filter(|r| query.get("status").is_none_or(|st| r["status"] == st.as_str()))
        .filter(|r| query.get("requester").is_none_or(|rq| r["requester"] == rq.as_str()))
        .cloned()
        .collect();
    s.list_queries.push(query);
    Json(json!({ "requests": requests })).into_response()
}

async fn approve(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    s.hit("approve");
    if let Err(resp) = s.authorize(&headers) {
        return resp;
    }
    s.decisions.push(body);
    Json(json!({ "message": "ok" })).into_response()
}

async fn status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.hit("status");
    if let Err(resp) = s.authorize(&headers) {
        return resp;
    }
    if let Some((code, body)) = s.status_error.clone() {
        return (code, Json(body)).into_response();
    }
    let mut reply = s.status_reply.clone();
    reply["request_id"] = Value::String(request_id);
    Json(reply).into_response()
}
