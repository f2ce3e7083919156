//! pcsetup CLI Library
//!
//! Client side of the PC setup workflow: authenticate, import computers,
//! configure them, submit a setup request and follow its execution.
//! Provides both a ratatui dashboard and plain output.

pub mod api;
pub mod app;
pub mod auth_cmd;
pub mod dispatch;
pub mod draft;
pub mod draft_cmd;
pub mod overlay;
pub mod poller;
pub mod request_cmd;
pub mod roster;
pub mod service;
pub mod session;
pub mod status_view;
pub mod store;
pub mod submission;
pub mod ui;
pub mod watch;
