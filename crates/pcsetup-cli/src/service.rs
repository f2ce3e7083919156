//! Authorized setup endpoints.

use std::path::Path;

use pcsetup_core::{Computer, Error, RequestStatus, Result, SetupRequest, StatusReport};
use reqwest::multipart::{Form, Part};
use tracing::info;

use crate::api::{self, ApprovalDecision, CreateResponse, ListResponse, UploadResponse};
use crate::poller::StatusSource;
use crate::session::SessionGuard;

/// Filters for `GET /setup/list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<RequestStatus>,
    pub requester: Option<String>,
}

/// Setup request operations, all sent through the session guard.
#[derive(Clone)]
pub struct SetupService {
    guard: SessionGuard,
}

impl SetupService {
    pub const fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    pub const fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    /// Upload a CSV file; the backend parses it into computers.
    pub async fn upload_csv(&self, path: &Path) -> Result<Vec<Computer>> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "computers.csv".to_string(), |n| n.to_string_lossy().into_owned());
        self.upload_csv_bytes(file_name, bytes).await
    }

    pub async fn upload_csv_bytes(&self, file_name: String, bytes: Vec<u8>) -> Result<Vec<Computer>> {
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/csv")
            .map_err(|e| Error::Network(e.to_string()))?;
        let request = self
            .guard
            .api()
            .post("/setup/upload-csv")
            .multipart(Form::new().part("file", part));
        let resp = self.guard.authorized_request(request).await?;
        let parsed: UploadResponse = api::read_json(resp).await?;
        Ok(parsed.computers)
    }

    /// `POST /setup/create`. Returns the new request id.
    pub async fn create_request(
        &self,
        requester: &str,
        computers_json: String,
        options_json: String,
    ) -> Result<String> {
        let form = Form::new()
            .text("requester", requester.to_string())
            .text("computers_json", computers_json)
            .text("options_json", options_json);
        let request = self.guard.api().post("/setup/create").multipart(form);
        let resp = self.guard.authorized_request(request).await?;
        let created: CreateResponse = api::read_json(resp).await?;
        info!(request_id = %created.request_id, "setup request created");
        Ok(created.request_id)
    }

    pub async fn list_requests(&self, filter: &ListFilter) -> Result<Vec<SetupRequest>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = &filter.status {
            query.push(("status", status.to_string()));
        }
        if let Some(requester) = &filter.requester {
            query.push(("requester", requester.clone()));
        }
        let request = self.guard.api().get("/setup/list").query(&query);
        let resp = self.guard.authorized_request(request).await?;
        let listed: ListResponse = api::read_json(resp).await?;
        Ok(listed.requests)
    }

    /// `POST /setup/approve`, used for both approval and rejection.
    pub async fn decide(&self, decision: &ApprovalDecision) -> Result<()> {
        let request = self.guard.api().post("/setup/approve").json(decision);
        self.guard.authorized_request(request).await?;
        info!(
            request_id = %decision.request_id,
            approved = decision.approved,
            "approval decision recorded"
        );
        Ok(())
    }

    pub async fn fetch_status(&self, request_id: &str) -> Result<StatusReport> {
        let request = self
            .guard
            .api()
            .get(&format!("/setup/{request_id}/status"));
        let resp = self.guard.authorized_request(request).await?;
        api::read_json(resp).await
    }
}

impl StatusSource for SetupService {
    async fn fetch_status(&self, request_id: &str) -> Result<StatusReport> {
        Self::fetch_status(self, request_id).await
    }
}
