//! Real-Time Alert Feed
//!
//! Receives high-usage alerts pushed by the gateway and keeps two views of
//! the stream for the shell.
//!
//! ## Architecture
//!
//! - **Transport**: WebSocket + STOMP subscription to the notification topic
//! - **AlertFeed**: single consumer that enriches each alert with the
//!   property address and updates both views
//! - **Views**: `active` (bounded, each entry expires on its own timer) and
//!   `history` (append-only for the session, newest first)
//!
//! ## Lifecycle
//!
//! `Disconnected → Connecting → Subscribed → Disconnected`
//!
//! A failed connection leaves the feed in `Connecting`; there is no retry.

mod alert;
mod engine;
pub mod stomp;
mod transport;
mod views;

pub use alert::{AlertEvent, AlertId, AlertIdGenerator, EnrichedAlert};
pub use engine::{AlertFeed, FeedSnapshot, FeedState};
pub use transport::{PushEndpoint, PushSubscription};
pub use views::AlertViews;

use thiserror::Error;

/// Errors raised by the push channel
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("WebSocket error: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("STOMP error: {0}")]
    Stomp(#[from] stomp::StompError),

    #[error("Subscription rejected by broker: {0}")]
    Rejected(String),

    #[error("Push channel closed")]
    Closed,

    #[error("A push subscription is already active")]
    AlreadySubscribed,

    #[error("Feed state lock poisoned")]
    Poisoned,
}
