//! Top-level error type for the portal.

use thiserror::Error;

use crate::config::ConfigError;
use crate::feed::FeedError;
use crate::gateway::GatewayError;
use crate::session::SessionError;

/// Errors surfaced by [`ShellController`](crate::shell::ShellController)
/// and the binaries
#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Not signed in. Run `energy-portal login` first.")]
    NotAuthenticated,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortalError {
    /// True for credential failures, which leave the shell signed out
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            PortalError::Session(SessionError::Auth(_))
                | PortalError::Gateway(GatewayError::Unauthorized)
                | PortalError::NotAuthenticated
        )
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
