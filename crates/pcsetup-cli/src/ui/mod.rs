//! TUI rendering components.

pub mod status_panel;

pub use status_panel::{WatchScreen, draw};
