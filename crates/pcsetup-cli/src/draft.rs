//! Draft persistence.
//!
//! The roster and overlay are kept in `~/.pcsetup/draft.json` between CLI
//! invocations, so importing, selecting, configuring and submitting can be
//! separate commands.

use std::path::PathBuf;

use pcsetup_core::Result;
use tracing::warn;

use crate::app::AppState;
use crate::store::CredentialStore;

#[derive(Debug, Clone, Default)]
pub struct DraftStore {
    path: Option<PathBuf>,
}

impl DraftStore {
    /// Path to the draft file: `~/.pcsetup/draft.json`.
    pub fn default_path() -> Option<PathBuf> {
        CredentialStore::state_dir().map(|d| d.join("draft.json"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A store that never touches the disk.
    pub const fn in_memory() -> Self {
        Self { path: None }
    }

    /// Load the saved draft. A missing file is an empty draft; a corrupt one
    /// is reported and replaced by an empty draft.
    pub fn load(&self) -> AppState {
        let Some(path) = &self.path else {
            return AppState::default();
        };
        let Ok(content) = std::fs::read_to_string(path) else {
            return AppState::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable draft");
            AppState::default()
        })
    }

    pub fn save(&self, state: &AppState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // Computer records carry login passwords.
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match &self.path {
            Some(path) if path.exists() => Ok(std::fs::remove_file(path)?),
            _ => Ok(()),
        }
    }
}
