//! Draft subcommands: build up the computer list and settings for the next
//! submission.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use pcsetup_core::{ConfigurationTree, Error, SettingGroup, SettingKey};

use crate::app::AppState;
use crate::dispatch::{Command, Controller, Outcome};

/// One toggle or a whole group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingTarget {
    Key(SettingKey),
    Group(SettingGroup),
}

impl FromStr for SettingTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SettingKey>()
            .map(Self::Key)
            .or_else(|_| s.parse::<SettingGroup>().map(Self::Group))
            .map_err(|_| {
                Error::validation(format!(
                    "unknown setting or group '{s}' (try `pcsetup draft view`)"
                ))
            })
    }
}

/// Parse `on`/`off` style switches.
pub fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected on or off, got '{s}'")),
    }
}

/// Draft subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum DraftAction {
    /// Upload a CSV of computers and add them to the draft.
    Import {
        /// CSV file to upload.
        path: PathBuf,
    },
    /// List the imported computers and their selection.
    Show,
    /// Include computers in the request.
    Select {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Exclude computers from the request.
    Deselect {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Select every computer (or none with --none).
    SelectAll {
        #[arg(long)]
        none: bool,
    },
    /// Check the selection and move on to configuration.
    Proceed,
    /// Turn a setting (or a whole group) on or off.
    Set {
        /// `group.key`, a bare key, or a group name.
        target: SettingTarget,
        /// on or off.
        #[arg(value_parser = parse_switch)]
        value: bool,
        /// Edit this computer's own settings instead of the common ones.
        #[arg(short, long)]
        computer: Option<String>,
    },
    /// Save a computer's own settings so they replace the common ones.
    Save {
        computer: String,
    },
    /// Show the common settings, or the settings a computer will receive.
    View {
        computer: Option<String>,
    },
    /// Discard the draft.
    Clear,
}

/// Execute a draft subcommand.
pub async fn run(action: DraftAction, controller: &mut Controller) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match action {
        DraftAction::Import { path } => {
            if let Outcome::Imported { total, created } =
                controller.dispatch(Command::ImportCsv { path }).await?
            {
                writeln!(out, "Imported {total} computers ({created} new)")?;
            }
            print_roster(&mut out, controller.state())?;
        }
        DraftAction::Show => print_roster(&mut out, controller.state())?,
        DraftAction::Select { names } => set_selection(controller, names, true).await?,
        DraftAction::Deselect { names } => set_selection(controller, names, false).await?,
        DraftAction::SelectAll { none } => {
            controller.dispatch(Command::SelectAll(!none)).await?;
            print_roster(&mut out, controller.state())?;
        }
        DraftAction::Proceed => {
            controller.dispatch(Command::Proceed).await?;
            writeln!(
                out,
                "{} computers selected. Adjust settings with `pcsetup draft set`, then `pcsetup submit`.",
                controller.state().roster.selected_count()
            )?;
        }
        DraftAction::Set {
            target,
            value,
            computer,
        } => {
            let command = match (target, computer) {
                (SettingTarget::Key(key), None) => Command::SetCommonToggle { key, value },
                (SettingTarget::Group(group), None) => Command::SetCommonGroup { group, value },
                (SettingTarget::Key(key), Some(name)) => {
                    Command::SetComputerToggle { name, key, value }
                }
                (SettingTarget::Group(group), Some(name)) => {
                    Command::SetComputerGroup { name, group, value }
                }
            };
            match controller.dispatch(command).await? {
                Outcome::UnknownComputer(name) => writeln!(out, "No computer named {name}")?,
                _ => writeln!(out, "Updated")?,
            }
        }
        DraftAction::Save { computer } => {
            match controller
                .dispatch(Command::SaveComputerSettings { name: computer.clone() })
                .await?
            {
                Outcome::UnknownComputer(name) => writeln!(out, "No computer named {name}")?,
                _ => writeln!(out, "{computer} now uses its own settings")?,
            }
        }
        DraftAction::View { computer } => view_settings(&mut out, controller.state(), computer)?,
        DraftAction::Clear => {
            controller.dispatch(Command::ClearDraft).await?;
            writeln!(out, "Draft cleared")?;
        }
    }
    Ok(())
}

async fn set_selection(
    controller: &mut Controller,
    names: Vec<String>,
    selected: bool,
) -> anyhow::Result<()> {
    let mut out = io::stdout();
    for name in names {
        if let Outcome::UnknownComputer(name) = controller
            .dispatch(Command::ToggleSelection { name, selected })
            .await?
        {
            writeln!(out, "No computer named {name}")?;
        }
    }
    print_roster(&mut out, controller.state())
}

fn print_roster(out: &mut impl Write, state: &AppState) -> anyhow::Result<()> {
    let roster = &state.roster;
    if roster.is_empty() {
        writeln!(out, "No computers imported. Use `pcsetup draft import <file.csv>`.")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<3} {:<20} {:<16} {:<24} {:<20} {}",
        "", "COMPUTER", "IP", "LOGIN", "ACCOUNT", "SETTINGS"
    )?;
    for pc in roster.computers() {
        let record = roster.record(&pc.computer_name);
        let selected = record.is_some_and(|r| r.selected);
        let custom = record.is_some_and(|r| r.has_custom_settings);
        writeln!(
            out,
            "{:<3} {:<20} {:<16} {:<24} {:<20} {}",
            if selected { "[x]" } else { "[ ]" },
            pc.computer_name,
            pc.ip_address,
            pc.login_type.label(),
            pc.login_username().unwrap_or("-"),
            if custom { "custom" } else { "common" },
        )?;
    }
    writeln!(
        out,
        "\n{} of {} selected. Step: {}",
        roster.selected_count(),
        roster.len(),
        state.view
    )?;
    Ok(())
}

fn view_settings(
    out: &mut impl Write,
    state: &AppState,
    computer: Option<String>,
) -> anyhow::Result<()> {
    let tree = match &computer {
        None => {
            writeln!(out, "Common settings")?;
            *state.overlay.common()
        }
        Some(name) => {
            let record = state
                .roster
                .record(name)
                .ok_or_else(|| anyhow::anyhow!("No computer named {name}"))?;
            let source = if record.has_custom_settings {
                "own settings"
            } else {
                "common settings"
            };
            writeln!(out, "{name} ({source})")?;
            state.overlay.resolve_effective_config(record)
        }
    };
    print_tree(out, &tree)
}

fn print_tree(out: &mut impl Write, tree: &ConfigurationTree) -> anyhow::Result<()> {
    for group in SettingGroup::ALL {
        writeln!(out, "\n{} [{}]", group.label(), group)?;
        for key in group.keys() {
            writeln!(
                out,
                "  {} {:<40} {}",
                if tree.get(key) { "[x]" } else { "[ ]" },
                key.label(),
                key.name()
            )?;
        }
    }
    Ok(())
}
