//! Auth subcommands: login, logout, status, whoami.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use dialoguer::Password;

use crate::dispatch::{Command, Controller, Outcome};
use crate::session::SessionState;

/// Auth subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum AuthAction {
    /// Log in to the setup backend.
    Login {
        /// Username.
        #[arg(short, long)]
        username: String,
        /// Password. Prompted for when omitted.
        #[arg(short, long, env = "PCSETUP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Log out and forget the stored credentials.
    Logout,
    /// Show the locally stored session.
    Status,
    /// Ask the backend who the current credentials belong to.
    Whoami,
}

/// Execute an auth subcommand.
pub async fn run(action: AuthAction, controller: &mut Controller) -> anyhow::Result<()> {
    match action {
        AuthAction::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => Password::new().with_prompt("Password").interact()?,
            };
            let outcome = controller
                .dispatch(Command::Login {
                    username: username.clone(),
                    password,
                })
                .await?;
            if let Outcome::LoggedIn(role) = outcome {
                writeln!(io::stdout(), "Logged in as {username} ({role})")?;
            }
            Ok(())
        }
        AuthAction::Logout => {
            controller.dispatch(Command::Logout).await?;
            writeln!(io::stdout(), "Logged out")?;
            Ok(())
        }
        AuthAction::Status => status(controller).await,
        AuthAction::Whoami => {
            if let Outcome::User(user) = controller.dispatch(Command::WhoAmI).await? {
                writeln!(io::stdout(), "{} ({})", user.username, user.role)?;
            }
            Ok(())
        }
    }
}

async fn status(controller: &Controller) -> anyhow::Result<()> {
    let guard = controller.service().guard();
    let mut out = io::stdout();
    match guard.state() {
        SessionState::LoggedOut => writeln!(out, "Not logged in")?,
        SessionState::LoggedIn(role) => {
            let username = guard.username().await.unwrap_or_default();
            writeln!(out, "Logged in as {username} ({role})")?;
            writeln!(out, "API: {}", guard.api().base_url())?;
            if !role.is_admin() {
                writeln!(out, "Approving and rejecting requests requires the admin role")?;
            }
        }
    }
    Ok(())
}
