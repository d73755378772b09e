//! User-facing notices
//!
//! Outcomes of user actions that must be shown to the user, as opposed to
//! background failures that are only logged.

use std::fmt;
use tokio::sync::mpsc;

/// How prominently a notice is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Confirmation of a completed action
    Info,
    /// A failure the user has to acknowledge
    Blocking,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl UserNotice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Blocking,
            message: message.into(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.level == NoticeLevel::Blocking
    }
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "✓ {}", self.message),
            NoticeLevel::Blocking => write!(f, "✕ {}", self.message),
        }
    }
}

/// Sending half handed to components that raise notices
pub type NoticeSender = mpsc::UnboundedSender<UserNotice>;
/// Receiving half drained by the shell
pub type NoticeReceiver = mpsc::UnboundedReceiver<UserNotice>;

pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}
