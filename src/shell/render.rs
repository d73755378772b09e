//! Terminal rendering of a shell frame.

use std::fmt::Write;
use std::sync::Arc;

use crate::dashboard::DashboardView;
use crate::feed::{EnrichedAlert, FeedSnapshot, FeedState};
use crate::notice::UserNotice;

const RULE_WIDTH: usize = 72;

/// Everything needed to draw one frame
pub struct Frame<'a> {
    pub signed_in: bool,
    pub feed: &'a FeedSnapshot,
    pub notices: &'a [UserNotice],
    pub dashboard: Option<&'a DashboardView>,
}

/// Header line with the bell indicator.
///
/// The bell is lit while the active view holds at least one alert.
pub fn header(signed_in: bool, state: FeedState, active: usize) -> String {
    let bell = if active > 0 {
        format!("🔔 {}", active)
    } else {
        "🔕".to_string()
    };
    let session = if signed_in { "signed in" } else { "signed out" };
    let feed = match state {
        FeedState::Disconnected => "offline",
        FeedState::Connecting => "connecting",
        FeedState::Subscribed => "live",
    };

    format!("Energy Portal  [{}]  feed: {}  {}", session, feed, bell)
}

/// One toast for an active alert
pub fn toast(alert: &EnrichedAlert) -> String {
    let mut out = format!(
        "┃ ⚠ {}\n┃   {} ({})\n┃   {} kWh used",
        alert.title(),
        alert.address,
        alert.event.property_id,
        alert.event.kwh_used
    );
    if let Some(message) = alert
        .event
        .recommendation_message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
    {
        out.push_str("\n┃   ");
        out.push_str(message.trim());
    }
    out
}

/// Alert history, newest first
pub fn history(alerts: &[Arc<EnrichedAlert>]) -> String {
    if alerts.is_empty() {
        return "  (no alerts this session)".to_string();
    }

    alerts
        .iter()
        .map(|a| {
            let when = a
                .event_time()
                .unwrap_or(a.received_at)
                .format("%H:%M:%S");
            format!(
                "  {}  {:<24} {:>8} kWh  carbon {:.1}",
                when, a.address, a.event.kwh_used, a.event.carbon_score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a complete frame
pub fn frame(parts: &Frame<'_>) -> String {
    let rule = "─".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}",
        header(parts.signed_in, parts.feed.state, parts.feed.active.len())
    );
    let _ = writeln!(out, "{}", rule);

    for notice in parts.notices {
        let _ = writeln!(out, "{}", notice);
    }
    if parts.notices.iter().any(UserNotice::is_blocking) {
        let _ = writeln!(out, "  (press Enter to dismiss)");
    }
    for alert in &parts.feed.active {
        let _ = writeln!(out, "{}", toast(alert));
    }
    if !parts.notices.is_empty() || !parts.feed.active.is_empty() {
        let _ = writeln!(out, "{}", rule);
    }

    match parts.dashboard {
        Some(view) => {
            let _ = write!(out, "{}", view);
        }
        None if parts.signed_in => {
            let _ = writeln!(out, "Remote dashboard not available");
        }
        None => {
            let _ = writeln!(out, "Sign in to see your dashboard.");
        }
    }

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Alert History");
    let _ = writeln!(out, "{}", history(&parts.feed.history));
    out
}
