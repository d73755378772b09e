//! Alert feed lifecycle.
//!
//! [`AlertFeed`] owns the two views, one expiry task per active alert and
//! the push subscription. Alerts are processed one at a time by a single
//! consumer task; the whole per-alert update happens under one lock, so a
//! second alert never observes a half-updated pair of views.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};

use super::alert::{AlertEvent, AlertId, AlertIdGenerator, EnrichedAlert};
use super::transport::{PushEndpoint, PushSubscription};
use super::views::AlertViews;
use super::FeedError;
use crate::config::FeedConfig;
use crate::directory::PropertyDirectory;

/// Subscription state of the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// Point-in-time copy of both views
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub state: FeedState,
    pub active: Vec<Arc<EnrichedAlert>>,
    pub history: Vec<Arc<EnrichedAlert>>,
}

struct FeedViews {
    views: AlertViews,
    timers: HashMap<AlertId, AbortHandle>,
}

impl FeedViews {
    fn cancel(&mut self, ids: &[AlertId]) {
        for id in ids {
            if let Some(timer) = self.timers.remove(id) {
                timer.abort();
            }
        }
    }
}

struct Running {
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

struct FeedInner {
    views: Mutex<FeedViews>,
    ids: AlertIdGenerator,
    directory: PropertyDirectory,
    expiry: Duration,
    fallback_label: String,
    queue_capacity: usize,
    state: watch::Sender<FeedState>,
    running: StdMutex<Option<Running>>,
}

/// Real-time alert feed for one shell
#[derive(Clone)]
pub struct AlertFeed {
    inner: Arc<FeedInner>,
}

impl AlertFeed {
    pub fn new(config: &FeedConfig, directory: PropertyDirectory) -> Self {
        let (state, _) = watch::channel(FeedState::Disconnected);

        Self {
            inner: Arc::new(FeedInner {
                views: Mutex::new(FeedViews {
                    views: AlertViews::new(config.active_cap, config.history_cap),
                    timers: HashMap::new(),
                }),
                ids: AlertIdGenerator::new(),
                directory,
                expiry: config.expiry(),
                fallback_label: config.fallback_label.clone(),
                queue_capacity: config.queue_capacity.max(1),
                state,
                running: StdMutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> FeedState {
        *self.inner.state.borrow()
    }

    /// Watch subscription state transitions
    pub fn watch_state(&self) -> watch::Receiver<FeedState> {
        self.inner.state.subscribe()
    }

    /// Open the push subscription and start consuming alerts.
    ///
    /// Only one subscription may exist at a time. Connection failures are
    /// logged by the background task; the feed then stays `Connecting`.
    pub fn start(&self, endpoint: PushEndpoint) -> Result<(), FeedError> {
        let mut running = self
            .inner
            .running
            .lock()
            .map_err(|_| FeedError::Poisoned)?;
        if running.is_some() {
            return Err(FeedError::AlreadySubscribed);
        }

        let (event_tx, event_rx) = mpsc::channel(self.inner.queue_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        self.inner.state.send_replace(FeedState::Connecting);

        let reader = tokio::spawn(read_loop(
            Arc::clone(&self.inner),
            endpoint,
            event_tx,
            shutdown_rx,
        ));
        let consumer = tokio::spawn(consume_loop(self.clone(), event_rx));

        *running = Some(Running {
            shutdown: shutdown_tx,
            reader,
            consumer,
        });
        Ok(())
    }

    /// Tear down the subscription and discard the active view.
    ///
    /// Pending expiry timers are cancelled. History is kept; see
    /// [`AlertFeed::clear_history`].
    pub async fn stop(&self) {
        let running = match self.inner.running.lock() {
            Ok(mut running) => running.take(),
            Err(_) => None,
        };

        if let Some(running) = running {
            let _ = running.shutdown.send(());
            let mut reader = running.reader;
            if tokio::time::timeout(Duration::from_secs(2), &mut reader)
                .await
                .is_err()
            {
                tracing::debug!("Push reader did not stop in time, aborting");
                reader.abort();
            }
            running.consumer.abort();
        }

        let mut guard = self.inner.views.lock().await;
        let cleared = guard.views.clear_active();
        guard.cancel(&cleared);
        for (_, timer) in guard.timers.drain() {
            timer.abort();
        }
        drop(guard);

        self.inner.state.send_replace(FeedState::Disconnected);
    }

    /// Process one inbound alert: enrich, record in both views, schedule
    /// its expiry.
    pub async fn process(&self, event: AlertEvent) -> Arc<EnrichedAlert> {
        let mut guard = self.inner.views.lock().await;

        let address = self
            .inner
            .directory
            .address_or(&event.property_id, &self.inner.fallback_label)
            .await;
        let alert = Arc::new(EnrichedAlert::new(self.inner.ids.next_id(), event, address));

        let evicted = guard.views.ingest(Arc::clone(&alert));
        guard.cancel(&evicted);

        let timer = tokio::spawn(expire_after(
            Arc::clone(&self.inner),
            alert.id,
            self.inner.expiry,
        ));
        guard.timers.insert(alert.id, timer.abort_handle());

        tracing::info!(
            alert_id = %alert.id,
            property_id = %alert.event.property_id,
            kwh_used = alert.event.kwh_used,
            evicted = evicted.len(),
            "High usage alert received"
        );

        alert
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let guard = self.inner.views.lock().await;
        FeedSnapshot {
            state: self.state(),
            active: guard.views.active().cloned().collect(),
            history: guard.views.history().cloned().collect(),
        }
    }

    pub async fn active_len(&self) -> usize {
        self.inner.views.lock().await.views.active_len()
    }

    pub async fn history_len(&self) -> usize {
        self.inner.views.lock().await.views.history_len()
    }

    /// Number of expiry timers still pending
    pub async fn pending_timers(&self) -> usize {
        self.inner.views.lock().await.timers.len()
    }

    pub async fn clear_history(&self) {
        self.inner.views.lock().await.views.clear_history();
    }
}

async fn expire_after(inner: Arc<FeedInner>, id: AlertId, delay: Duration) {
    tokio::time::sleep(delay).await;

    let mut guard = inner.views.lock().await;
    guard.timers.remove(&id);
    if guard.views.expire(id) {
        tracing::debug!(alert_id = %id, "Alert expired");
    }
}

async fn read_loop(
    inner: Arc<FeedInner>,
    endpoint: PushEndpoint,
    events: mpsc::Sender<AlertEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut subscription = tokio::select! {
        result = PushSubscription::open(&endpoint) => match result {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(url = %endpoint.url, error = %e, "Push subscription failed, live alerts disabled");
                return;
            }
        },
        _ = &mut shutdown => return,
    };

    inner.state.send_replace(FeedState::Subscribed);

    loop {
        tokio::select! {
            next = subscription.next_event() => match next {
                Some(Ok(event)) => {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Push channel error");
                    break;
                }
                None => {
                    tracing::info!("Push channel closed by gateway");
                    break;
                }
            },
            _ = &mut shutdown => {
                subscription.close().await;
                return;
            }
        }
    }

    inner.state.send_replace(FeedState::Disconnected);
}

async fn consume_loop(feed: AlertFeed, mut events: mpsc::Receiver<AlertEvent>) {
    while let Some(event) = events.recv().await {
        feed.process(event).await;
    }
}
