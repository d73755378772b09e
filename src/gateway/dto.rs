//! Gateway Data Transfer Objects
//!
//! Request and response bodies exchanged with the API gateway. Field names
//! follow the gateway's camelCase JSON convention.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================
// Users
// ============================================

/// Credentials for `POST /api/users/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response of a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Body for `POST /api/users/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

// ============================================
// Properties
// ============================================

/// A metered property owned by the signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub property_id: String,
    pub address: String,
}

impl Property {
    pub fn new(property_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            address: address.into(),
        }
    }
}

/// Body for `POST /api/users/register-property`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPropertyRequest {
    pub address: String,
}

// ============================================
// Billing / recommendations
// ============================================

/// Body for `POST /api/billing/ingest`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub property_id: String,
    pub kwh_used: f64,
}

/// Status attached to a report entry by the recommendation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    /// Consumption is above the expected range
    Red,
    /// Any other status label, kept verbatim
    Other(String),
}

impl ReportStatus {
    pub fn is_red(&self) -> bool {
        matches!(self, ReportStatus::Red)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReportStatus::Red => "RED",
            ReportStatus::Other(label) => label,
        }
    }
}

impl From<String> for ReportStatus {
    fn from(label: String) -> Self {
        if label.eq_ignore_ascii_case("RED") {
            ReportStatus::Red
        } else {
            ReportStatus::Other(label)
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReportStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReportStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(ReportStatus::from)
    }
}

/// One consumption report entry for a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    #[serde(with = "flexible_timestamp")]
    pub created_at: DateTime<Utc>,
    pub kwh_used: f64,
    pub carbon_score: f64,
    #[serde(default)]
    pub status: Option<ReportStatus>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recommendation_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

/// The gateway sends `null` for entries without advice
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a gateway timestamp.
///
/// Accepts RFC 3339, a zone-less ISO local date-time (taken as UTC) and a
/// bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    raw.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

mod flexible_timestamp {
    use super::parse_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", ms))),
            Raw::Text(text) => parse_timestamp(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", text))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_property_uses_camel_case() {
        let json = r#"[{"propertyId": "P1", "address": "Main St"}]"#;
        let props: Vec<Property> = serde_json::from_str(json).unwrap();
        assert_eq!(props, vec![Property::new("P1", "Main St")]);
    }

    #[test]
    fn test_report_entry_accepts_local_datetime() {
        let json = r#"{
            "createdAt": "2024-03-01T08:30:00",
            "kwhUsed": 42.5,
            "carbonScore": 10.6,
            "status": "RED",
            "recommendationMessage": "Shift laundry to off-peak hours"
        }"#;
        let entry: ReportEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.created_at, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());
        assert_eq!(entry.status, Some(ReportStatus::Red));
        assert_eq!(entry.kwh_used, 42.5);
    }

    #[test]
    fn test_report_entry_accepts_epoch_millis_and_missing_fields() {
        let json = r#"{"createdAt": 1700000000000, "kwhUsed": 3.0, "carbonScore": 0.75}"#;
        let entry: ReportEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.created_at.timestamp_millis(), 1_700_000_000_000);
        assert!(entry.status.is_none());
        assert!(entry.recommendation_message.is_empty());
    }

    #[test]
    fn test_report_entry_accepts_null_recommendation() {
        let json = r#"[{
            "createdAt": "2024-05-01T00:00:00Z",
            "kwhUsed": 12.0,
            "carbonScore": 3.0,
            "status": "GREEN",
            "recommendationMessage": null
        }]"#;
        let entries: Vec<ReportEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].recommendation_message.is_empty());
        assert_eq!(entries[0].kwh_used, 12.0);
    }

    #[test]
    fn test_report_entry_rejects_garbage_timestamp() {
        let json = r#"{"createdAt": "yesterday-ish", "kwhUsed": 3.0, "carbonScore": 0.75}"#;
        assert!(serde_json::from_str::<ReportEntry>(json).is_err());
    }

    #[test]
    fn test_status_other_is_kept_verbatim() {
        let status: ReportStatus = serde_json::from_str(r#""GREEN""#).unwrap();
        assert_eq!(status, ReportStatus::Other("GREEN".to_string()));
        assert!(!status.is_red());
        assert_eq!(serde_json::to_string(&ReportStatus::Red).unwrap(), r#""RED""#);
    }

    #[test]
    fn test_register_request_serialization() {
        let req = RegisterRequest {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"fullName\":\"Ada Lovelace\""));
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2024-03-01T08:30:00Z").is_some());
        assert!(parse_timestamp("2024-03-01T08:30:00.123").is_some());
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("").is_none());
    }
}
