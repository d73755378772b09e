//! Host Shell
//!
//! [`ShellController`] is the single owner of session-scoped state: the
//! auth gate, the property directory, the alert feed and the mounted
//! dashboard. Starting a session refreshes the directory, opens the push
//! subscription and mounts the dashboard; ending one tears all of it down
//! and clears the alert history.

mod controller;
pub mod render;

pub use controller::ShellController;
