//! In-memory backend for the development gateway.
//!
//! Users, bearer tokens, properties and report entries live in one
//! `RwLock`. Nothing is persisted.

use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use super::error::{GatewayApiError, GatewayApiResult};
use crate::feed::AlertEvent;
use crate::gateway::{Property, ReportEntry, ReportStatus};

/// Development gateway settings
#[derive(Debug, Clone)]
pub struct DevGatewayConfig {
    pub host: String,
    pub port: u16,
    /// STOMP destination alerts are published on
    pub topic: String,
    /// Readings above this are `RED` and raise an alert
    pub high_usage_kwh: f64,
    /// kg CO2 per kWh used to derive the carbon score
    pub carbon_factor: f64,
    /// Create a demo account with one property and a few readings
    pub seed_demo: bool,
}

impl Default for DevGatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            topic: "/topic/notifications".to_string(),
            high_usage_kwh: 50.0,
            carbon_factor: 0.25,
            seed_demo: false,
        }
    }
}

impl DevGatewayConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub const DEMO_EMAIL: &str = "demo@energy.local";
pub const DEMO_PASSWORD: &str = "demo";
pub const DEMO_PROPERTY_ID: &str = "METER-CBEAA6CF";

#[derive(Debug)]
struct User {
    full_name: String,
    password: String,
    properties: Vec<String>,
}

#[derive(Debug)]
struct PropertyRecord {
    owner: String,
    address: String,
    readings: Vec<ReportEntry>,
}

#[derive(Debug, Default)]
struct Store {
    users: HashMap<String, User>,
    tokens: HashMap<String, String>,
    properties: HashMap<String, PropertyRecord>,
}

/// Shared state for all gateway handlers
pub struct GatewayState {
    store: RwLock<Store>,
    alerts: broadcast::Sender<AlertEvent>,
    pub config: DevGatewayConfig,
}

impl GatewayState {
    pub fn new(config: DevGatewayConfig) -> Self {
        let (alerts, _) = broadcast::channel(256);
        Self {
            store: RwLock::new(Store::default()),
            alerts,
            config,
        }
    }

    /// Create an account
    pub async fn register(&self, full_name: &str, email: &str, password: &str) -> GatewayApiResult<()> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(GatewayApiError::Validation("password must not be empty".to_string()));
        }

        let mut store = self.store.write().await;
        if store.users.contains_key(&email) {
            return Err(GatewayApiError::Conflict(format!("account {} already exists", email)));
        }
        store.users.insert(
            email.clone(),
            User {
                full_name: full_name.trim().to_string(),
                password: password.to_string(),
                properties: Vec::new(),
            },
        );

        tracing::info!(email = %email, "Account created");
        Ok(())
    }

    /// Check credentials and issue a fresh opaque token
    pub async fn login(&self, email: &str, password: &str) -> GatewayApiResult<String> {
        let email = email.trim().to_lowercase();
        let mut store = self.store.write().await;

        match store.users.get(&email) {
            Some(user) if user.password == password => {
                tracing::debug!(email = %email, name = %user.full_name, "Login accepted");
            }
            _ => return Err(GatewayApiError::InvalidCredentials),
        }

        let token = uuid::Uuid::new_v4().to_string();
        store.tokens.insert(token.clone(), email);
        Ok(token)
    }

    /// Resolve a bearer token to the account email
    pub async fn authenticate(&self, token: &str) -> GatewayApiResult<String> {
        self.store
            .read()
            .await
            .tokens
            .get(token)
            .cloned()
            .ok_or(GatewayApiError::Unauthorized)
    }

    pub async fn properties(&self, email: &str) -> Vec<Property> {
        let store = self.store.read().await;
        let Some(user) = store.users.get(email) else {
            return Vec::new();
        };

        user.properties
            .iter()
            .filter_map(|id| {
                store
                    .properties
                    .get(id)
                    .map(|p| Property::new(id.clone(), p.address.clone()))
            })
            .collect()
    }

    /// Add a property with a generated meter id
    pub async fn register_property(&self, email: &str, address: &str) -> GatewayApiResult<Property> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GatewayApiError::Validation("address must not be empty".to_string()));
        }

        let mut store = self.store.write().await;
        let property_id = loop {
            let candidate = meter_id();
            if !store.properties.contains_key(&candidate) {
                break candidate;
            }
        };

        self.insert_property(&mut store, email, &property_id, address)?;
        tracing::info!(email = %email, property_id = %property_id, "Property registered");
        Ok(Property::new(property_id, address))
    }

    /// Readings of one of the caller's properties, oldest first
    pub async fn report(&self, email: &str, property_id: &str) -> GatewayApiResult<Vec<ReportEntry>> {
        let store = self.store.read().await;
        let record = owned(&store, email, property_id)?;
        Ok(record.readings.clone())
    }

    /// Record a reading. High readings publish an alert.
    pub async fn ingest(&self, email: &str, property_id: &str, kwh_used: f64) -> GatewayApiResult<ReportEntry> {
        if !kwh_used.is_finite() || kwh_used < 0.0 {
            return Err(GatewayApiError::Validation(format!("invalid kwhUsed: {}", kwh_used)));
        }

        let entry = self.derive_entry(kwh_used);

        {
            let mut store = self.store.write().await;
            if !store
                .users
                .get(email)
                .is_some_and(|u| u.properties.iter().any(|p| p == property_id))
            {
                return Err(GatewayApiError::NotFound(format!("property {}", property_id)));
            }
            let record = store
                .properties
                .get_mut(property_id)
                .ok_or_else(|| GatewayApiError::NotFound(format!("property {}", property_id)))?;
            record.readings.push(entry.clone());
        }

        tracing::info!(property_id = %property_id, kwh_used, status = %entry.status.as_ref().map(|s| s.as_str()).unwrap_or("-"), "Reading ingested");

        if entry.status.as_ref().is_some_and(ReportStatus::is_red) {
            self.publish(AlertEvent {
                property_id: property_id.to_string(),
                kwh_used,
                carbon_score: entry.carbon_score,
                recommendation_message: Some(entry.recommendation_message.clone()),
                timestamp: entry.created_at.timestamp_millis(),
            });
        }

        Ok(entry)
    }

    /// Broadcast an alert to all push subscribers
    pub fn publish(&self, event: AlertEvent) {
        match self.alerts.send(event) {
            Ok(receivers) => tracing::debug!(receivers, "Alert published"),
            Err(_) => tracing::debug!("Alert published with no subscribers"),
        }
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.alerts.subscribe()
    }

    /// Create the demo account with a property and a short history
    pub async fn seed_demo(&self) -> GatewayApiResult<()> {
        self.register("Demo User", DEMO_EMAIL, DEMO_PASSWORD).await?;

        let mut store = self.store.write().await;
        self.insert_property(&mut store, DEMO_EMAIL, DEMO_PROPERTY_ID, "12 Harbour Road")?;

        let now = Utc::now();
        let record = store
            .properties
            .get_mut(DEMO_PROPERTY_ID)
            .ok_or_else(|| GatewayApiError::Internal("demo property missing".to_string()))?;
        for (days_ago, kwh) in [(4, 18.5), (3, 22.0), (2, 61.0), (1, 35.5)] {
            let mut entry = self.derive_entry(kwh);
            entry.created_at = now - chrono::Duration::days(days_ago);
            record.readings.push(entry);
        }

        tracing::info!(email = DEMO_EMAIL, property_id = DEMO_PROPERTY_ID, "Demo account seeded");
        Ok(())
    }

    fn insert_property(
        &self,
        store: &mut Store,
        email: &str,
        property_id: &str,
        address: &str,
    ) -> GatewayApiResult<()> {
        let user = store
            .users
            .get_mut(email)
            .ok_or(GatewayApiError::Unauthorized)?;
        user.properties.push(property_id.to_string());

        store.properties.insert(
            property_id.to_string(),
            PropertyRecord {
                owner: email.to_string(),
                address: address.to_string(),
                readings: Vec::new(),
            },
        );
        Ok(())
    }

    fn derive_entry(&self, kwh_used: f64) -> ReportEntry {
        let high = kwh_used > self.config.high_usage_kwh;
        let (status, message) = if high {
            (
                ReportStatus::Red,
                "Usage is well above your baseline. Shift heavy appliances to off-peak hours.",
            )
        } else {
            (
                ReportStatus::Other("GREEN".to_string()),
                "Consumption is within the expected range.",
            )
        };

        ReportEntry {
            created_at: Utc::now(),
            kwh_used,
            carbon_score: round1(kwh_used * self.config.carbon_factor),
            status: Some(status),
            recommendation_message: message.to_string(),
            reading_date: Some(Utc::now().date_naive().to_string()),
            id: Some(serde_json::Value::String(uuid::Uuid::new_v4().to_string())),
        }
    }
}

fn owned<'a>(store: &'a Store, email: &str, property_id: &str) -> GatewayApiResult<&'a PropertyRecord> {
    store
        .properties
        .get(property_id)
        .filter(|p| p.owner == email)
        .ok_or_else(|| GatewayApiError::NotFound(format!("property {}", property_id)))
}

fn normalize_email(email: &str) -> GatewayApiResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(GatewayApiError::Validation(format!("invalid email: {:?}", email)));
    }
    Ok(email)
}

/// `METER-` followed by eight uppercase hex digits
fn meter_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("METER-{}", hex[..8].to_uppercase())
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
