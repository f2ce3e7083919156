//! Setup requests and their execution status, as projected by the server.
//!
//! The client never invents or mutates a request: it creates one, moves it
//! through approval, and reads status snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::computer::Computer;
use crate::error::Error;

/// Lifecycle of a setup request.
///
/// `Pending`, `Approved` and `Rejected` precede execution; `InProgress` is the
/// run itself; everything after that is a terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
    Failed,
    PartiallyFailed,
    Warning,
    Skipped,
    Rollback,
    RollbackFailed,
    /// A status this client does not know yet.
    Unknown(String),
}

impl RequestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::PartiallyFailed => "partially_failed",
            Self::Warning => "warning",
            Self::Skipped => "skipped",
            Self::Rollback => "rollback",
            Self::RollbackFailed => "rollback_failed",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Awaiting approval",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::InProgress => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::PartiallyFailed => "Partially failed",
            Self::Warning => "Completed with warnings",
            Self::Skipped => "Skipped",
            Self::Rollback => "Rolled back",
            Self::RollbackFailed => "Rollback failed",
            Self::Unknown(raw) => raw,
        }
    }

    /// No further automatic state change is expected.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected
                | Self::Completed
                | Self::Failed
                | Self::PartiallyFailed
                | Self::Warning
                | Self::Skipped
                | Self::Rollback
                | Self::RollbackFailed
        )
    }

    /// Terminal and the requested work is in place.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Warning)
    }

    /// The system tried to undo partial work.
    pub const fn is_rollback(&self) -> bool {
        matches!(self, Self::Rollback | Self::RollbackFailed)
    }
}

impl From<String> for RequestStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "partially_failed" => Self::PartiallyFailed,
            "warning" => Self::Warning,
            "skipped" => Self::Skipped,
            "rollback" => Self::Rollback,
            "rollback_failed" => Self::RollbackFailed,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<RequestStatus> for String {
    fn from(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from(s.to_string()) {
            Self::Unknown(raw) => Err(Error::validation(format!("unknown status '{raw}'"))),
            status => Ok(status),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side projection of a server-owned setup request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupRequest {
    pub request_id: String,
    pub requester: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub computers: Vec<Computer>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Outcome of one task in the execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Started,
    InProgress,
    Completed,
    Failed,
    Warning,
    Skipped,
    Rollback,
    RollbackFailed,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Started => "started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Warning => "warning",
            Self::Skipped => "skipped",
            Self::Rollback => "rollback",
            Self::RollbackFailed => "rollback_failed",
            Self::Other(raw) => raw,
        }
    }

    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::RollbackFailed)
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "started" => Self::Started,
            "in_progress" | "running" => Self::InProgress,
            "completed" | "success" | "succeeded" => Self::Completed,
            "failed" | "failure" | "error" => Self::Failed,
            "warning" => Self::Warning,
            "skipped" => Self::Skipped,
            "rollback" | "rolled_back" => Self::Rollback,
            "rollback_failed" => Self::RollbackFailed,
            _ => Self::Other(raw),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the per-task execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub computer_name: String,
    pub task_name: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub message: String,
    /// Task duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, alias = "resolution", skip_serializing_if = "Vec::is_empty")]
    pub resolution_steps: Vec<String>,
}

/// Status snapshot returned by `GET /setup/{request_id}/status`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    /// Overall progress, 0 to 100.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub computer_progress: BTreeMap<String, f64>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Accumulated execution time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<f64>,
}

/// Renders a server timestamp in local time; unparseable input is returned
/// as-is.
pub fn format_timestamp(raw: &str) -> String {
    const DISPLAY: &str = "%Y-%m-%d %H:%M:%S";
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format(DISPLAY).to_string();
    }
    // The backend emits naive ISO timestamps in server-local time.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map_or_else(|_| raw.to_string(), |dt| dt.format(DISPLAY).to_string())
}
