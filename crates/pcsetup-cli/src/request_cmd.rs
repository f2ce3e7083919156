//! Request subcommands: list, approve, reject, status, watch.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use dialoguer::{Confirm, Input};
use pcsetup_core::request::format_timestamp;
use pcsetup_core::{RequestStatus, SetupRequest};

use crate::dispatch::{Command, Controller, Outcome};
use crate::service::ListFilter;
use crate::watch;

/// Request subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum RequestAction {
    /// List setup requests.
    List {
        /// Only requests in this status (e.g. pending, in_progress).
        #[arg(long)]
        status: Option<RequestStatus>,
        /// Only requests from this user.
        #[arg(long)]
        requester: Option<String>,
    },
    /// Approve a pending request (admin only).
    Approve {
        request_id: String,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Reject a pending request (admin only).
    Reject {
        request_id: String,
        /// Reason shown to the requester. Prompted for when omitted.
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Print the current status of a request once.
    Status { request_id: String },
    /// Follow a request's progress until it finishes.
    Watch {
        request_id: String,
        /// Print plain lines instead of the dashboard.
        #[arg(long)]
        plain: bool,
    },
}

/// Execute a request subcommand.
pub async fn run(action: RequestAction, controller: &mut Controller) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match action {
        RequestAction::List { status, requester } => {
            let outcome = controller
                .dispatch(Command::ListRequests(ListFilter { status, requester }))
                .await?;
            if let Outcome::Requests(requests) = outcome {
                let is_admin = is_admin(controller).await;
                print_requests(&mut out, &requests, is_admin)?;
            }
        }
        RequestAction::Approve { request_id, yes } => {
            require_admin(controller).await?;
            if !yes
                && !Confirm::new()
                    .with_prompt(format!("Approve request {request_id}?"))
                    .default(false)
                    .interact()?
            {
                writeln!(out, "Approval cancelled")?;
                return Ok(());
            }
            controller
                .dispatch(Command::Approve {
                    request_id: request_id.clone(),
                })
                .await?;
            writeln!(out, "Approved {request_id}")?;
        }
        RequestAction::Reject { request_id, reason } => {
            require_admin(controller).await?;
            let reason = match reason {
                Some(reason) => reason,
                None => {
                    let entered: String = Input::new()
                        .with_prompt("Rejection reason")
                        .allow_empty(true)
                        .interact_text()?;
                    if entered.trim().is_empty() {
                        writeln!(out, "Rejection cancelled")?;
                        return Ok(());
                    }
                    entered
                }
            };
            controller
                .dispatch(Command::Reject {
                    request_id: request_id.clone(),
                    reason,
                })
                .await?;
            writeln!(out, "Rejected {request_id}")?;
        }
        RequestAction::Status { request_id } => {
            if let Outcome::Status(view) =
                controller.dispatch(Command::FetchStatus { request_id }).await?
            {
                for line in view.to_lines() {
                    writeln!(out, "{line}")?;
                }
            }
        }
        RequestAction::Watch { request_id, plain } => {
            if plain {
                watch::run_plain(controller, request_id).await?;
            } else {
                watch::run_dashboard(controller, request_id).await?;
            }
        }
    }
    Ok(())
}

async fn is_admin(controller: &Controller) -> bool {
    controller
        .service()
        .guard()
        .role()
        .await
        .is_some_and(|role| role.is_admin())
}

/// Fail before prompting when the decision would be refused anyway.
async fn require_admin(controller: &Controller) -> anyhow::Result<()> {
    if is_admin(controller).await {
        Ok(())
    } else {
        anyhow::bail!("Only administrators can approve or reject requests")
    }
}

fn print_requests(
    out: &mut impl Write,
    requests: &[SetupRequest],
    is_admin: bool,
) -> anyhow::Result<()> {
    if requests.is_empty() {
        writeln!(out, "No requests")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<22} {:<24} {:<14} {:>5}  {}",
        "REQUEST", "STATUS", "REQUESTER", "PCS", "CREATED"
    )?;
    let mut pending = 0;
    for request in requests {
        writeln!(
            out,
            "{:<22} {:<24} {:<14} {:>5}  {}",
            request.request_id,
            request.status.label(),
            request.requester,
            request.computers.len(),
            format_timestamp(&request.created_at),
        )?;
        if let Some(reason) = &request.rejection_reason {
            writeln!(out, "{:<22} reason: {reason}", "")?;
        }
        if request.status == RequestStatus::Pending {
            pending += 1;
        }
    }
    if is_admin && pending > 0 {
        writeln!(
            out,
            "\n{pending} pending. Decide with `pcsetup requests approve <id>` or `pcsetup requests reject <id>`."
        )?;
    }
    Ok(())
}
