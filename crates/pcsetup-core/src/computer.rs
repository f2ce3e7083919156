//! Target computer records produced by the CSV import.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the setup engine signs in to the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoginType {
    #[serde(rename = "AD")]
    ActiveDirectory,
    LocalExisting,
    LocalNew,
}

impl LoginType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ActiveDirectory => "Active Directory",
            Self::LocalExisting => "Existing local account",
            Self::LocalNew => "New local account",
        }
    }
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One imported computer.
///
/// Field names match the backend wire format. Records are immutable once
/// imported; only selection and the settings overlay change afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Computer {
    pub computer_name: String,
    pub ip_address: String,
    pub login_type: LoginType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_existing_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_existing_password: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_new_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_new_password: Option<String>,
    #[serde(default)]
    pub admin_privilege: bool,
}

impl Computer {
    /// The account the setup engine will use, according to `login_type`.
    pub fn login_username(&self) -> Option<&str> {
        match self.login_type {
            LoginType::ActiveDirectory => self.ad_username.as_deref(),
            LoginType::LocalExisting => self.local_existing_username.as_deref(),
            LoginType::LocalNew => self.local_new_username.as_deref(),
        }
    }
}

// Passwords never reach logs through `{:?}`.
impl fmt::Debug for Computer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computer")
            .field("computer_name", &self.computer_name)
            .field("ip_address", &self.ip_address)
            .field("login_type", &self.login_type)
            .field("login_username", &self.login_username())
            .field("admin_privilege", &self.admin_privilege)
            .finish_non_exhaustive()
    }
}
