//! Command dispatch: every user action is a [`Command`] run by the
//! [`Controller`], which owns the application state.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pcsetup_core::{Computer, Error, Result, SettingGroup, SettingKey, SetupRequest};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::{ApprovalDecision, UserInfo};
use crate::app::{AppState, View};
use crate::draft::DraftStore;
use crate::overlay;
use crate::poller::{PollEvent, StatusPoller};
use crate::service::{ListFilter, SetupService};
use crate::status_view::StatusView;
use crate::store::Role;
use crate::submission;

/// A user action.
pub enum Command {
    Login { username: String, password: String },
    Logout,
    WhoAmI,
    DownloadSample { dest: PathBuf },
    ImportCsv { path: PathBuf },
    /// Feed an already parsed upload result into the roster.
    ImportComputers(Vec<Computer>),
    ToggleSelection { name: String, selected: bool },
    SelectAll(bool),
    Proceed,
    SetCommonToggle { key: SettingKey, value: bool },
    SetCommonGroup { group: SettingGroup, value: bool },
    SetComputerToggle { name: String, key: SettingKey, value: bool },
    SetComputerGroup { name: String, group: SettingGroup, value: bool },
    SaveComputerSettings { name: String },
    Submit,
    ListRequests(ListFilter),
    Approve { request_id: String },
    Reject { request_id: String, reason: String },
    FetchStatus { request_id: String },
    Watch { request_id: String, events: mpsc::Sender<PollEvent> },
    StopWatching,
    ClearDraft,
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Logout => "logout",
            Self::WhoAmI => "whoami",
            Self::DownloadSample { .. } => "download_sample",
            Self::ImportCsv { .. } => "import_csv",
            Self::ImportComputers(_) => "import_computers",
            Self::ToggleSelection { .. } => "toggle_selection",
            Self::SelectAll(_) => "select_all",
            Self::Proceed => "proceed",
            Self::SetCommonToggle { .. } => "set_common_toggle",
            Self::SetCommonGroup { .. } => "set_common_group",
            Self::SetComputerToggle { .. } => "set_computer_toggle",
            Self::SetComputerGroup { .. } => "set_computer_group",
            Self::SaveComputerSettings { .. } => "save_computer_settings",
            Self::Submit => "submit",
            Self::ListRequests(_) => "list_requests",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::FetchStatus { .. } => "fetch_status",
            Self::Watch { .. } => "watch",
            Self::StopWatching => "stop_watching",
            Self::ClearDraft => "clear_draft",
        }
    }
}

// Login carries a password, so only the command name is printed.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a command produced.
#[derive(Debug)]
pub enum Outcome {
    LoggedIn(Role),
    LoggedOut,
    User(UserInfo),
    SampleSaved { path: PathBuf, bytes: usize },
    Imported { total: usize, created: usize },
    Updated,
    /// The named computer is not in the roster; nothing changed.
    UnknownComputer(String),
    Submitted(String),
    Requests(Vec<SetupRequest>),
    Decided { request_id: String, approved: bool },
    Status(StatusView),
    Watching(String),
    Stopped,
    DraftCleared,
}

/// Owner of the application state and the status poller.
pub struct Controller {
    state: AppState,
    service: SetupService,
    poller: StatusPoller,
    drafts: DraftStore,
}

impl Controller {
    /// Create a controller, resuming the saved draft.
    pub fn new(service: SetupService, poll_interval: Duration, drafts: DraftStore) -> Self {
        Self {
            state: drafts.load(),
            service,
            poller: StatusPoller::new(poll_interval),
            drafts,
        }
    }

    pub const fn state(&self) -> &AppState {
        &self.state
    }

    pub const fn service(&self) -> &SetupService {
        &self.service
    }

    pub const fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub async fn dispatch(&mut self, command: Command) -> Result<Outcome> {
        debug!(command = command.name(), "dispatch");
        match command {
            Command::Login { username, password } => {
                let role = self.service.guard().login(&username, &password).await?;
                Ok(Outcome::LoggedIn(role))
            }
            Command::Logout => {
                self.poller.stop_polling();
                self.service.guard().logout().await?;
                Ok(Outcome::LoggedOut)
            }
            Command::WhoAmI => Ok(Outcome::User(self.service.guard().whoami().await?)),
            Command::DownloadSample { dest } => {
                let bytes = self.service.guard().api().sample_csv().await?;
                tokio::fs::write(&dest, &bytes).await?;
                Ok(Outcome::SampleSaved {
                    path: dest,
                    bytes: bytes.len(),
                })
            }
            Command::ImportCsv { path } => {
                let computers = self.service.upload_csv(&path).await?;
                self.import(computers)
            }
            Command::ImportComputers(computers) => self.import(computers),
            Command::ToggleSelection { name, selected } => {
                let found = self.state.roster.toggle_selection(&name, selected);
                self.changed_if(found, name)
            }
            Command::SelectAll(selected) => {
                self.state.roster.select_all(selected);
                self.changed()
            }
            Command::Proceed => {
                self.state.roster.validate_proceed()?;
                self.state.view = View::Configure;
                self.changed()
            }
            Command::SetCommonToggle { key, value } => {
                self.state.overlay.set_common_toggle(key, value);
                self.changed()
            }
            Command::SetCommonGroup { group, value } => {
                self.state.overlay.set_common_group(group, value);
                self.changed()
            }
            Command::SetComputerToggle { name, key, value } => {
                let found = overlay::set_computer_toggle(&mut self.state.roster, &name, key, value);
                self.changed_if(found, name)
            }
            Command::SetComputerGroup { name, group, value } => {
                let found =
                    overlay::set_computer_group(&mut self.state.roster, &name, group, value);
                self.changed_if(found, name)
            }
            Command::SaveComputerSettings { name } => {
                let found = overlay::mark_customized(&mut self.state.roster, &name);
                self.changed_if(found, name)
            }
            Command::Submit => {
                let request_id =
                    submission::submit(&self.service, &self.state.roster, &self.state.overlay)
                        .await?;
                self.state.view = View::RequestList;
                self.persist()?;
                Ok(Outcome::Submitted(request_id))
            }
            Command::ListRequests(filter) => {
                let requests = self.service.list_requests(&filter).await?;
                Ok(Outcome::Requests(requests))
            }
            Command::Approve { request_id } => self.decide(request_id, true, None).await,
            Command::Reject { request_id, reason } => {
                self.decide(request_id, false, Some(reason)).await
            }
            Command::FetchStatus { request_id } => {
                let report = self.service.fetch_status(&request_id).await?;
                Ok(Outcome::Status(StatusView::from_report(&request_id, &report)))
            }
            Command::Watch { request_id, events } => {
                self.poller
                    .start_polling(&request_id, Arc::new(self.service.clone()), events);
                self.state.view = View::Status(request_id.clone());
                Ok(Outcome::Watching(request_id))
            }
            Command::StopWatching => {
                self.poller.stop_polling();
                if matches!(self.state.view, View::Status(_)) {
                    self.state.view = View::RequestList;
                }
                Ok(Outcome::Stopped)
            }
            Command::ClearDraft => {
                self.state = AppState::default();
                self.drafts.clear()?;
                Ok(Outcome::DraftCleared)
            }
        }
    }

    fn import(&mut self, computers: Vec<Computer>) -> Result<Outcome> {
        if computers.is_empty() {
            return Err(Error::validation("No computers found in the uploaded CSV"));
        }
        let created = self
            .state
            .roster
            .import_computers(computers, self.state.overlay.common());
        self.state.view = View::Import;
        self.persist()?;
        info!(total = self.state.roster.len(), created, "roster updated");
        Ok(Outcome::Imported {
            total: self.state.roster.len(),
            created,
        })
    }

    async fn decide(
        &self,
        request_id: String,
        approved: bool,
        reason: Option<String>,
    ) -> Result<Outcome> {
        let guard = self.service.guard();
        let role = guard
            .role()
            .await
            .ok_or_else(|| Error::Auth("Not logged in".into()))?;
        if !role.is_admin() {
            return Err(Error::validation(
                "Only administrators can approve or reject requests",
            ));
        }
        let rejection_reason = match reason {
            Some(reason) if reason.trim().is_empty() => {
                return Err(Error::validation("A rejection reason is required"));
            }
            Some(reason) => Some(reason.trim().to_string()),
            None => None,
        };
        let approver = guard
            .username()
            .await
            .ok_or_else(|| Error::Auth("Not logged in".into()))?;

        self.service
            .decide(&ApprovalDecision {
                request_id: request_id.clone(),
                approver,
                approved,
                rejection_reason,
            })
            .await?;
        Ok(Outcome::Decided {
            request_id,
            approved,
        })
    }

    fn changed(&self) -> Result<Outcome> {
        self.persist()?;
        Ok(Outcome::Updated)
    }

    fn changed_if(&self, found: bool, name: String) -> Result<Outcome> {
        if found {
            self.changed()
        } else {
            Ok(Outcome::UnknownComputer(name))
        }
    }

    fn persist(&self) -> Result<()> {
        self.drafts.save(&self.state)
    }
}
