//! Application state and types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::overlay::Overlay;
use crate::roster::Roster;

/// Which screen of the workflow is current.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "view", content = "request_id", rename_all = "snake_case")]
pub enum View {
    /// Step 1: import and select computers.
    #[default]
    Import,
    /// Step 2: common and per-computer settings.
    Configure,
    RequestList,
    /// Status of one request.
    Status(String),
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Import => f.write_str("import computers"),
            Self::Configure => f.write_str("configure settings"),
            Self::RequestList => f.write_str("request list"),
            Self::Status(id) => write!(f, "status of {id}"),
        }
    }
}

/// Everything the workflow holds between commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub roster: Roster,
    #[serde(default)]
    pub overlay: Overlay,
    #[serde(default)]
    pub view: View,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn view_serializes_with_its_request() {
        let json = serde_json::to_string(&View::Status("REQ1".into())).unwrap();
        assert_eq!(json, r#"{"view":"status","request_id":"REQ1"}"#);
        let back: View = serde_json::from_str(r#"{"view":"configure"}"#).unwrap();
        assert_eq!(back, View::Configure);
    }
}
