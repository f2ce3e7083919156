//! Application state and the controller that mutates it.

mod state;

pub use state::{AppState, View};
