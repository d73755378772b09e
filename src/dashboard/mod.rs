//! Consumption Dashboard
//!
//! The dashboard is mounted by the shell with a session token and renders
//! the report of one fixed property. It offers two mutating actions:
//!
//! - **register property**: followed by an immediate directory refresh
//! - **log consumption**: followed by a delayed report re-fetch, giving the
//!   backend time to process the reading asynchronously. The delay is a
//!   race tolerance, not a confirmed write.
//!
//! Fetch failures are logged and the last good report stays on screen.
//! Failures of the mutating actions are surfaced as blocking notices and
//! are not retried.

mod report;
mod view;

pub use report::{average_kwh, peak_kwh, sort_by_creation};
pub use view::{sparkline, DashboardView, ReportView, UsageBar, DEFAULT_RECOMMENDATION};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::DashboardConfig;
use crate::directory::PropertyDirectory;
use crate::gateway::{GatewayApi, GatewayError, ReportEntry};
use crate::notice::{NoticeSender, UserNotice};
use crate::session::{SessionGuard, Token};

/// Result of a report fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No property selected, nothing requested
    Skipped,
    /// Report replaced with this many entries
    Updated(usize),
    /// The session ended while the request was in flight
    Stale,
}

struct DashboardInner {
    api: Arc<dyn GatewayApi>,
    token: Token,
    property_id: String,
    config: DashboardConfig,
    report: RwLock<Option<Vec<ReportEntry>>>,
    refresh_count: AtomicU64,
    /// Set once any fetch has finished, successfully or not
    settled: AtomicBool,
    notices: NoticeSender,
    guard: SessionGuard,
}

/// A mounted dashboard for one session
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

impl Dashboard {
    /// Mount the dashboard with the session's token
    pub fn mount(
        api: Arc<dyn GatewayApi>,
        token: Token,
        config: DashboardConfig,
        notices: NoticeSender,
        guard: SessionGuard,
    ) -> Self {
        let property_id = config.property_id.trim().to_string();

        Self {
            inner: Arc::new(DashboardInner {
                api,
                token,
                property_id,
                config,
                report: RwLock::new(None),
                refresh_count: AtomicU64::new(0),
                settled: AtomicBool::new(false),
                notices,
                guard,
            }),
        }
    }

    pub fn property_id(&self) -> &str {
        &self.inner.property_id
    }

    /// Number of completed report fetches
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_count.load(Ordering::SeqCst)
    }

    /// Fetch the report and replace the cached copy, sorted by creation time.
    ///
    /// On failure the previous report is kept.
    pub async fn fetch(&self) -> Result<FetchOutcome, GatewayError> {
        let inner = &self.inner;
        if inner.property_id.is_empty() {
            return Ok(FetchOutcome::Skipped);
        }

        let mut entries = match inner.api.report(&inner.token, &inner.property_id).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    property_id = %inner.property_id,
                    error = %e,
                    "Report fetch failed, keeping previous data"
                );
                if inner.guard.is_current() {
                    inner.settled.store(true, Ordering::SeqCst);
                }
                return Err(e);
            }
        };

        sort_by_creation(&mut entries);
        let count = entries.len();

        let mut report = inner.report.write().await;
        if !inner.guard.is_current() {
            tracing::debug!(property_id = %inner.property_id, "Discarding report from an ended session");
            return Ok(FetchOutcome::Stale);
        }
        *report = Some(entries);
        drop(report);
        inner.settled.store(true, Ordering::SeqCst);
        inner.refresh_count.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(property_id = %inner.property_id, entries = count, "Report refreshed");
        Ok(FetchOutcome::Updated(count))
    }

    /// Sorted report from the last successful fetch
    pub async fn report(&self) -> Option<Vec<ReportEntry>> {
        self.inner.report.read().await.clone()
    }

    /// Current view model.
    ///
    /// `Loading` is shown only until the first fetch finishes. A first fetch
    /// that fails renders the empty-report defaults.
    pub async fn view(&self) -> DashboardView {
        if self.inner.property_id.is_empty() {
            return DashboardView::NoProperty;
        }

        let report = self.inner.report.read().await;
        let entries: &[ReportEntry] = match report.as_deref() {
            Some(entries) => entries,
            None if self.inner.settled.load(Ordering::SeqCst) => &[],
            None => return DashboardView::Loading,
        };
        DashboardView::Ready(ReportView::from_sorted(
            &self.inner.property_id,
            entries,
            self.inner.config.high_usage_kwh,
        ))
    }

    /// Register a property, then refresh the directory right away
    pub async fn register_property(
        &self,
        directory: &PropertyDirectory,
        address: &str,
    ) -> Result<(), GatewayError> {
        let inner = &self.inner;

        if let Err(e) = inner.api.register_property(&inner.token, address).await {
            tracing::warn!(error = %e, "Property registration failed");
            self.notify(UserNotice::blocking(format!("Failed to register property: {}", e)));
            return Err(e);
        }

        tracing::info!(address = %address, "Property registered");
        self.notify(UserNotice::info(format!("Property registered: {}", address)));

        // A failed refresh is logged by the directory and does not undo the
        // registration.
        let _ = directory
            .refresh(inner.api.as_ref(), &inner.token, &inner.guard)
            .await;
        Ok(())
    }

    /// Submit a reading for the dashboard's property.
    ///
    /// On success a re-fetch is scheduled after the configured delay and its
    /// handle returned. On failure nothing is scheduled.
    pub async fn log_consumption(&self, kwh_used: f64) -> Result<JoinHandle<()>, GatewayError> {
        let inner = &self.inner;

        if inner.property_id.is_empty() {
            let err = GatewayError::InvalidResponse("no property selected".to_string());
            self.notify(UserNotice::blocking(format!("Failed to log consumption: {}", err)));
            return Err(err);
        }

        if let Err(e) = inner
            .api
            .ingest(&inner.token, &inner.property_id, kwh_used)
            .await
        {
            tracing::warn!(property_id = %inner.property_id, error = %e, "Consumption ingest failed");
            self.notify(UserNotice::blocking(format!("Failed to log consumption: {}", e)));
            return Err(e);
        }

        tracing::info!(property_id = %inner.property_id, kwh_used, "Consumption reading submitted");
        self.notify(UserNotice::info(format!("Logged {} kWh", kwh_used)));

        Ok(self.schedule_refetch(inner.config.refetch_delay()))
    }

    /// Re-fetch the report once after `delay`
    pub fn schedule_refetch(&self, delay: Duration) -> JoinHandle<()> {
        let dashboard = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !dashboard.inner.guard.is_current() {
                return;
            }
            let _ = dashboard.fetch().await;
        })
    }

    /// Re-fetch on a fixed interval until the returned task is aborted
    pub fn spawn_polling(&self) -> JoinHandle<()> {
        let dashboard = self.clone();
        let period = self.inner.config.poll_interval().max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !dashboard.inner.guard.is_current() {
                    break;
                }
                let _ = dashboard.fetch().await;
            }
        })
    }

    fn notify(&self, notice: UserNotice) {
        if self.inner.notices.send(notice).is_err() {
            tracing::debug!("Notice dropped, no receiver");
        }
    }
}
