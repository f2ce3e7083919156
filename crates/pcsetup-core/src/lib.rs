//! `pcsetup` Core Library
//!
//! Shared functionality for `pcsetup` components:
//! - Computer and setup request data model
//! - Fixed four-group configuration tree
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod computer;
pub mod config;
pub mod error;
pub mod request;
pub mod settings;
pub mod tracing_init;

pub use computer::{Computer, LoginType};
pub use config::Config;
pub use error::{Error, Result};
pub use request::{LogEntry, RequestStatus, SetupRequest, StatusReport, TaskStatus};
pub use settings::{ConfigurationTree, SettingGroup, SettingKey};
