//! Session-scoped state and its transitions.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::render::{self, Frame};
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::directory::PropertyDirectory;
use crate::error::{PortalError, PortalResult};
use crate::feed::{AlertFeed, FeedError, PushEndpoint};
use crate::gateway::{origin_of, push_url, GatewayApi, GatewayClient};
use crate::notice::{notice_channel, NoticeReceiver, NoticeSender, UserNotice};
use crate::session::{SessionGate, Token, TokenStore};

/// Most recent notices kept for rendering
const NOTICE_BACKLOG: usize = 5;

/// How long an info notice stays on screen. Blocking notices stay until
/// dismissed.
const INFO_NOTICE_TTL: Duration = Duration::from_secs(5);

/// Owns everything that lives for one signed-in session
pub struct ShellController {
    config: Config,
    api: Arc<dyn GatewayApi>,
    gate: SessionGate,
    directory: PropertyDirectory,
    feed: AlertFeed,
    dashboard: Option<Dashboard>,
    notice_tx: NoticeSender,
    notice_rx: NoticeReceiver,
    notices: Vec<(Instant, UserNotice)>,
    polling: Option<JoinHandle<()>>,
}

impl ShellController {
    /// Build a controller talking to the configured gateway over HTTP
    pub fn connect(config: Config) -> PortalResult<Self> {
        let client = GatewayClient::new(&config.gateway)?;
        let store = TokenStore::new(config.session.token_store_path());
        Self::new(config, Arc::new(client), store)
    }

    pub fn new(config: Config, api: Arc<dyn GatewayApi>, store: TokenStore) -> PortalResult<Self> {
        let origin = origin_of(&config.gateway.base_url)?;
        let gate = SessionGate::new(Arc::clone(&api), store, origin)?;
        let directory = PropertyDirectory::new();
        let feed = AlertFeed::new(&config.feed, directory.clone());
        let (notice_tx, notice_rx) = notice_channel();

        Ok(Self {
            config,
            api,
            gate,
            directory,
            feed,
            dashboard: None,
            notice_tx,
            notice_rx,
            notices: Vec::new(),
            polling: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.gate.is_authenticated()
    }

    pub fn token(&self) -> Option<&Token> {
        self.gate.current_token()
    }

    pub fn directory(&self) -> &PropertyDirectory {
        &self.directory
    }

    pub fn feed(&self) -> &AlertFeed {
        &self.feed
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.dashboard.as_ref()
    }

    /// Sign in. Any running session is ended first.
    pub async fn login(&mut self, email: &str, password: &str) -> PortalResult<()> {
        if self.dashboard.is_some() {
            self.end_session().await;
        }
        self.gate.login(email, password).await?;
        Ok(())
    }

    /// Create an account and sign in with it
    pub async fn register(&mut self, full_name: &str, email: &str, password: &str) -> PortalResult<()> {
        if self.dashboard.is_some() {
            self.end_session().await;
        }
        self.gate.register(full_name, email, password).await?;
        Ok(())
    }

    /// Load the directory and mount the dashboard, without the push channel
    pub async fn open_dashboard(&mut self) -> PortalResult<Dashboard> {
        let token = self
            .gate
            .current_token()
            .cloned()
            .ok_or(PortalError::NotAuthenticated)?;
        let guard = self.gate.epoch().guard();

        // Failures are logged by the directory; alerts then show the fallback label.
        let _ = self
            .directory
            .refresh(self.api.as_ref(), &token, &guard)
            .await;

        let dashboard = Dashboard::mount(
            Arc::clone(&self.api),
            token,
            self.config.dashboard.clone(),
            self.notice_tx.clone(),
            guard,
        );
        let _ = dashboard.fetch().await;

        self.dashboard = Some(dashboard.clone());
        Ok(dashboard)
    }

    /// Start a full session: directory refresh, push subscription, dashboard
    pub async fn start_session(&mut self) -> PortalResult<()> {
        self.open_dashboard().await?;

        let endpoint = PushEndpoint::new(
            push_url(&self.config.gateway.base_url, &self.config.gateway.push_path),
            self.config.gateway.topic.clone(),
        );
        match self.feed.start(endpoint) {
            Ok(()) | Err(FeedError::AlreadySubscribed) => {}
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            properties = self.directory.len().await,
            "Session started"
        );
        Ok(())
    }

    /// Re-fetch the report periodically until the session ends
    pub fn start_polling(&mut self) {
        if self.polling.is_some() {
            return;
        }
        if let Some(dashboard) = &self.dashboard {
            self.polling = Some(dashboard.spawn_polling());
        }
    }

    /// Tear down session-scoped state without touching the token.
    ///
    /// The epoch advances first so in-flight responses are rejected before
    /// the state they would write to is cleared.
    pub async fn end_session(&mut self) {
        self.gate.epoch().advance();
        if let Some(polling) = self.polling.take() {
            polling.abort();
        }
        self.feed.stop().await;
        self.feed.clear_history().await;
        self.directory.clear().await;
        self.dashboard = None;
        self.notices.clear();
    }

    /// End the session and forget the token
    pub async fn logout(&mut self) -> PortalResult<()> {
        self.end_session().await;
        self.gate.logout()?;
        Ok(())
    }

    /// Move pending notices into the render backlog and return the new ones
    pub fn drain_notices(&mut self) -> Vec<UserNotice> {
        let mut fresh = Vec::new();
        while let Ok(notice) = self.notice_rx.try_recv() {
            fresh.push(notice);
        }

        let now = Instant::now();
        self.notices
            .retain(|(at, notice)| notice.is_blocking() || now.duration_since(*at) < INFO_NOTICE_TTL);
        self.notices
            .extend(fresh.iter().map(|notice| (now, notice.clone())));
        if self.notices.len() > NOTICE_BACKLOG {
            let excess = self.notices.len() - NOTICE_BACKLOG;
            self.notices.drain(..excess);
        }
        fresh
    }

    /// Acknowledge every notice on screen, blocking ones included
    pub fn dismiss_notices(&mut self) {
        self.drain_notices();
        self.notices.clear();
    }

    /// Notices currently on screen, oldest first
    pub fn visible_notices(&mut self) -> Vec<UserNotice> {
        self.drain_notices();
        self.notices.iter().map(|(_, notice)| notice.clone()).collect()
    }

    /// Render the current frame
    pub async fn render(&mut self) -> String {
        let notices = self.visible_notices();
        let snapshot = self.feed.snapshot().await;
        let view = match &self.dashboard {
            Some(dashboard) => Some(dashboard.view().await),
            None => None,
        };

        render::frame(&Frame {
            signed_in: self.gate.is_authenticated(),
            feed: &snapshot,
            notices: &notices,
            dashboard: view.as_ref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{AlertEvent, FeedState};
    use crate::gateway::fake::FakeGateway;
    use crate::gateway::Property;
    use tempfile::{tempdir, TempDir};

    fn config() -> Config {
        let mut config = Config::default();
        // Nothing listens here; the feed stays `Connecting`.
        config.gateway.base_url = "http://127.0.0.1:9".to_string();
        config.dashboard.property_id = "P1".to_string();
        config
    }

    fn shell(fake: Arc<FakeGateway>) -> (ShellController, TokenStore, TempDir) {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json"));
        let shell = ShellController::new(config(), fake, store.clone()).unwrap();
        (shell, store, dir)
    }

    fn event(property_id: &str, kwh: f64) -> AlertEvent {
        AlertEvent {
            property_id: property_id.to_string(),
            kwh_used: kwh,
            carbon_score: kwh / 4.0,
            recommendation_message: None,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_session_requires_login() {
        let (mut shell, _store, _dir) = shell(Arc::new(FakeGateway::default()));
        let err = shell.start_session().await.unwrap_err();
        assert!(matches!(err, PortalError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_login_enriches_alerts_from_directory() {
        let fake = Arc::new(FakeGateway::with_token("jwt-1"));
        fake.set_properties(vec![Property::new("P1", "Main St")]);
        let (mut shell, store, _dir) = shell(Arc::clone(&fake));

        shell.login("ada@example.com", "pw").await.unwrap();
        assert_eq!(
            store.load_token("http://127.0.0.1:9").unwrap(),
            Some(Token::new("jwt-1"))
        );

        shell.start_session().await.unwrap();
        assert_eq!(shell.feed().state(), FeedState::Connecting);

        let alert = shell.feed().process(event("P1", 80.0)).await;
        assert_eq!(alert.address, "Main St");

        let frame = shell.render().await;
        assert!(frame.contains("🔔 1"));
        assert!(frame.contains("Main St (P1)"));

        shell.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_clears_history_and_token() {
        let fake = Arc::new(FakeGateway::with_token("jwt-1"));
        let (mut shell, store, _dir) = shell(Arc::clone(&fake));

        shell.login("ada@example.com", "pw").await.unwrap();
        shell.start_session().await.unwrap();
        for kwh in [60.0, 70.0] {
            shell.feed().process(event("P9", kwh)).await;
        }
        assert_eq!(shell.feed().history_len().await, 2);

        shell.logout().await.unwrap();

        assert!(!shell.is_authenticated());
        assert_eq!(shell.feed().history_len().await, 0);
        assert_eq!(shell.feed().active_len().await, 0);
        assert_eq!(shell.feed().state(), FeedState::Disconnected);
        assert!(shell.dashboard().is_none());
        assert!(shell.directory().is_empty().await);
        assert!(store.load_token("http://127.0.0.1:9").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_session_rejects_in_flight_responses() {
        let fake = Arc::new(FakeGateway::with_token("jwt-1"));
        fake.set_properties(vec![Property::new("P1", "Main St")]);
        let (mut shell, _store, _dir) = shell(Arc::clone(&fake));

        shell.login("ada@example.com", "pw").await.unwrap();
        shell.start_session().await.unwrap();
        let guard = shell.gate.epoch().guard();
        let token = shell.token().cloned().unwrap();

        shell.end_session().await;
        assert!(!guard.is_current());

        let outcome = shell
            .directory()
            .refresh(fake.as_ref(), &token, &guard)
            .await
            .unwrap();
        assert_eq!(outcome, crate::directory::RefreshOutcome::Stale);
        assert!(shell.directory().is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_login_stays_signed_out() {
        let fake = Arc::new(FakeGateway::with_token("jwt-1"));
        let (mut shell, _store, _dir) = shell(fake);

        let err = shell.login("ada@example.com", "wrong").await.unwrap_err();
        assert!(err.is_auth());
        assert!(!shell.is_authenticated());
    }

    #[tokio::test]
    async fn test_ingest_failure_reaches_render() {
        let fake = Arc::new(FakeGateway::with_token("jwt-1"));
        let (mut shell, _store, _dir) = shell(Arc::clone(&fake));
        shell.login("ada@example.com", "pw").await.unwrap();
        let dashboard = shell.open_dashboard().await.unwrap();

        fake.fail_mutations(true);
        assert!(dashboard.log_consumption(12.0).await.is_err());

        let frame = shell.render().await;
        assert!(frame.contains("✕ Failed to log consumption"));
        assert_eq!(fake.report_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_notice_stays_until_dismissed() {
        let fake = Arc::new(FakeGateway::with_token("jwt-1"));
        let (mut shell, _store, _dir) = shell(Arc::clone(&fake));
        shell.login("ada@example.com", "pw").await.unwrap();
        let dashboard = shell.open_dashboard().await.unwrap();

        fake.fail_mutations(true);
        assert!(dashboard.log_consumption(12.0).await.is_err());
        fake.fail_mutations(false);
        dashboard.log_consumption(8.0).await.unwrap().abort();
        assert_eq!(shell.visible_notices().len(), 2);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let visible = shell.visible_notices();
        assert_eq!(visible.len(), 1);
        assert!(visible[0].is_blocking());

        shell.dismiss_notices();
        assert!(shell.visible_notices().is_empty());
        assert!(!shell.render().await.contains("Failed to log consumption"));
    }

    #[tokio::test]
    async fn test_restored_token_opens_dashboard() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json"));
        store
            .save_token("http://127.0.0.1:9", &Token::new("saved"))
            .unwrap();

        let fake = Arc::new(FakeGateway::default());
        let mut shell = ShellController::new(config(), fake.clone(), store).unwrap();

        assert!(shell.is_authenticated());
        shell.open_dashboard().await.unwrap();
        assert_eq!(fake.report_calls(), 1);
    }
}
