//! Turns the roster and overlay into one `POST /setup/create` call.

use std::collections::BTreeMap;

use pcsetup_core::{Computer, ConfigurationTree, Error, Result};
use serde::Serialize;
use tracing::info;

use crate::overlay::Overlay;
use crate::roster::Roster;
use crate::service::SetupService;

/// One selected computer with its resolved settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputerWithSettings {
    #[serde(flatten)]
    pub computer: Computer,
    pub settings: ConfigurationTree,
}

/// Everything sent for one submission, resolved at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub computers: Vec<ComputerWithSettings>,
    /// Request-wide options: the common tree as it stood at build time.
    pub options: BTreeMap<&'static str, bool>,
}

impl SubmissionPayload {
    pub fn computers_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.computers)?)
    }

    pub fn options_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.options)?)
    }

    pub fn computer_names(&self) -> impl Iterator<Item = &str> {
        self.computers
            .iter()
            .map(|c| c.computer.computer_name.as_str())
    }
}

/// Resolve the payload without touching the network.
pub fn build_submission(roster: &Roster, overlay: &Overlay) -> Result<SubmissionPayload> {
    roster.validate_proceed()?;
    let computers = roster
        .selected_computers()
        .filter_map(|computer| {
            let record = roster.record(&computer.computer_name)?;
            Some(ComputerWithSettings {
                computer: computer.clone(),
                settings: overlay.resolve_effective_config(record),
            })
        })
        .collect();
    Ok(SubmissionPayload {
        computers,
        options: overlay.common().flatten(),
    })
}

/// Validate, resolve and create the request. Returns the new request id.
///
/// The requester is the logged-in user. Nothing is sent when validation
/// fails, and a failed call leaves the roster and overlay as they were.
pub async fn submit(service: &SetupService, roster: &Roster, overlay: &Overlay) -> Result<String> {
    let payload = build_submission(roster, overlay)?;
    let requester = service
        .guard()
        .username()
        .await
        .ok_or_else(|| Error::Auth("Not logged in".into()))?;
    let computers_json = payload.computers_json()?;
    let options_json = payload.options_json()?;

    info!(
        %requester,
        computers = payload.computers.len(),
        "submitting setup request"
    );
    service
        .create_request(&requester, computers_json, options_json)
        .await
}
