//! Property Directory Cache
//!
//! Client-side copy of the signed-in user's properties. The alert feed reads
//! it synchronously to attach an address to each incoming alert; the
//! dashboard refreshes it after registering a property.
//!
//! A refresh replaces the mapping wholesale. A failed refresh keeps the
//! previous mapping, so the cache may lag behind the gateway: alerts for a
//! property created after the last refresh show the fallback label.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::gateway::{GatewayApi, GatewayError, Property};
use crate::session::{SessionGuard, Token};

/// Result of a successful directory refresh call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The mapping was replaced and now holds this many properties
    Replaced(usize),
    /// The response arrived after its session ended and was dropped
    Stale,
}

#[derive(Debug, Default)]
struct DirectoryState {
    properties: Vec<Property>,
    addresses: HashMap<String, String>,
}

/// Shared property directory
#[derive(Debug, Clone, Default)]
pub struct PropertyDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl PropertyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the property list and replace the cached mapping.
    ///
    /// Failures are logged and leave the cache untouched. No retry.
    pub async fn refresh(
        &self,
        api: &dyn GatewayApi,
        token: &Token,
        guard: &SessionGuard,
    ) -> Result<RefreshOutcome, GatewayError> {
        let properties = match api.properties(token).await {
            Ok(properties) => properties,
            Err(e) => {
                tracing::warn!(error = %e, "Property directory refresh failed, keeping cached entries");
                return Err(e);
            }
        };

        match self.store(properties, Some(guard)).await {
            Some(count) => {
                tracing::debug!(properties = count, "Property directory refreshed");
                Ok(RefreshOutcome::Replaced(count))
            }
            None => {
                tracing::debug!("Discarding property directory response from an ended session");
                Ok(RefreshOutcome::Stale)
            }
        }
    }

    /// Replace the cached mapping
    pub async fn replace(&self, properties: Vec<Property>) -> usize {
        self.store(properties, None).await.unwrap_or(0)
    }

    /// The guard is checked under the write lock, so a response racing a
    /// session teardown cannot land after [`PropertyDirectory::clear`].
    async fn store(&self, properties: Vec<Property>, guard: Option<&SessionGuard>) -> Option<usize> {
        let addresses = properties
            .iter()
            .map(|p| (p.property_id.clone(), p.address.clone()))
            .collect();

        let mut state = self.state.write().await;
        if guard.is_some_and(|g| !g.is_current()) {
            return None;
        }
        state.properties = properties;
        state.addresses = addresses;
        Some(state.properties.len())
    }

    /// Address of a property, if cached
    pub async fn lookup(&self, property_id: &str) -> Option<String> {
        self.state.read().await.addresses.get(property_id).cloned()
    }

    /// Address of a property, or `fallback` when unknown
    pub async fn address_or(&self, property_id: &str, fallback: &str) -> String {
        self.lookup(property_id)
            .await
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Cached properties in gateway order
    pub async fn properties(&self) -> Vec<Property> {
        self.state.read().await.properties.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.properties.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop everything; used when a session ends
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.properties.clear();
        state.addresses.clear();
    }
}
