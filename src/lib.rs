//! # Energy Portal
//!
//! Terminal client for an energy-monitoring API gateway: a host shell that
//! owns the session, a consumption dashboard for one property, and a
//! real-time feed of high-usage alerts pushed over STOMP/WebSocket.
//!
//! ## Modules
//!
//! - [`session`]: Token gate, persisted per gateway origin
//! - [`gateway`]: REST client for the gateway and its DTOs
//! - [`directory`]: Cached property id → address mapping
//! - [`feed`]: Push subscription, active/history alert views, expiry
//! - [`dashboard`]: Report fetch, sort, render and mutating actions
//! - [`shell`]: Session lifecycle and frame rendering
//! - [`devgateway`]: In-memory gateway for local runs and tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use energy_portal::{Config, ShellController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut shell = ShellController::connect(Config::load_default())?;
//!
//!     shell.login("ada@example.com", "secret").await?;
//!     shell.start_session().await?;
//!
//!     println!("{}", shell.render().await);
//!
//!     shell.logout().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod devgateway;
pub mod directory;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod logging;
pub mod notice;
pub mod session;
pub mod shell;

pub use config::{
    Config, ConfigError, DashboardConfig, FeedConfig, GatewayConfig, LoggingConfig, SessionConfig,
};

pub use dashboard::{Dashboard, DashboardView, FetchOutcome, ReportView};

pub use directory::{PropertyDirectory, RefreshOutcome};

pub use error::{PortalError, PortalResult};

pub use feed::{
    AlertEvent, AlertFeed, AlertId, EnrichedAlert, FeedError, FeedSnapshot, FeedState,
    PushEndpoint,
};

pub use gateway::{GatewayApi, GatewayClient, GatewayError, Property, ReportEntry, ReportStatus};

pub use notice::{NoticeLevel, UserNotice};

pub use session::{SessionError, SessionGate, Token, TokenStore};

pub use shell::ShellController;
