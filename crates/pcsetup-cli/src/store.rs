//! Persisted session credentials.
//!
//! Stores the token pair, role and username in `~/.pcsetup/session.json`.
//! Only the session guard reads or writes this file.

use std::fmt;
use std::path::{Path, PathBuf};

use pcsetup_core::Result;
use serde::{Deserialize, Serialize};

/// Role reported by the backend at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Other(raw) => raw,
        }
    }

    /// May approve or reject requests. The server enforces this independently.
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "user" => Self::User,
            _ => Self::Other(raw),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored authentication credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub role: Role,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("role", &self.role)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<Credential>,
}

/// Credential storage backed by an optional JSON file.
///
/// Without a path the store lives in memory only, which is what tests and
/// one-shot invocations without a home directory get.
#[derive(Debug, Default)]
pub struct CredentialStore {
    path: Option<PathBuf>,
    file: SessionFile,
}

impl CredentialStore {
    /// Path to the state directory: `~/.pcsetup/`.
    pub fn state_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".pcsetup"))
    }

    /// Path to the session file: `~/.pcsetup/session.json`.
    pub fn default_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("session.json"))
    }

    /// Open the store at `path`. A missing or unreadable file yields an empty
    /// session.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self {
            path: Some(path),
            file,
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub const fn credential(&self) -> Option<&Credential> {
        self.file.auth.as_ref()
    }

    /// Replace the stored credential and persist it.
    pub fn set(&mut self, credential: Credential) -> Result<()> {
        self.file.auth = Some(credential);
        self.save()
    }

    /// Remove the stored credential and persist the empty session.
    pub fn clear(&mut self) -> Result<()> {
        self.file.auth = None;
        self.save()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.file)?;
        std::fs::write(path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}
