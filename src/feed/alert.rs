//! Alert payloads and their local identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// High-usage notification pushed by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub property_id: String,
    pub kwh_used: f64,
    pub carbon_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_message: Option<String>,
    /// Event time in milliseconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
}

/// Process-local alert identity.
///
/// Only used to address entries in the active and history views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertId(u64);

impl AlertId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert-{}", self.0)
    }
}

/// Monotonic [`AlertId`] source
#[derive(Debug, Default)]
pub struct AlertIdGenerator {
    next: AtomicU64,
}

impl AlertIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> AlertId {
        AlertId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// An alert after address resolution
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedAlert {
    pub id: AlertId,
    pub event: AlertEvent,
    pub address: String,
    pub received_at: DateTime<Utc>,
}

impl EnrichedAlert {
    pub fn new(id: AlertId, event: AlertEvent, address: impl Into<String>) -> Self {
        Self {
            id,
            event,
            address: address.into(),
            received_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &'static str {
        "High Usage Alert"
    }

    /// Event time as reported by the gateway, if it is a valid timestamp
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.event.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_event_deserialize() {
        let json = r#"{"propertyId":"P1","kwhUsed":80,"carbonScore":20,"timestamp":1000}"#;
        let event: AlertEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.property_id, "P1");
        assert_eq!(event.kwh_used, 80.0);
        assert_eq!(event.carbon_score, 20.0);
        assert_eq!(event.timestamp, 1000);
        assert!(event.recommendation_message.is_none());
    }

    #[test]
    fn test_alert_event_serialize_camel_case() {
        let event = AlertEvent {
            property_id: "P1".to_string(),
            kwh_used: 61.5,
            carbon_score: 15.4,
            recommendation_message: Some("Run the dishwasher at night".to_string()),
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"propertyId\":\"P1\""));
        assert!(json.contains("\"recommendationMessage\""));
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let ids = AlertIdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
        assert_eq!(a.to_string(), "alert-1");
    }
}
