//! The authentication gate.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use super::epoch::SessionEpoch;
use super::store::TokenStore;
use super::token::Token;
use crate::gateway::{GatewayApi, GatewayError};

/// Holds the current token and performs auth transitions
pub struct SessionGate {
    api: Arc<dyn GatewayApi>,
    store: TokenStore,
    origin: String,
    token: Option<Token>,
    epoch: SessionEpoch,
}

impl SessionGate {
    /// Create a gate for a gateway origin, restoring any persisted token
    pub fn new(
        api: Arc<dyn GatewayApi>,
        store: TokenStore,
        origin: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let origin = origin.into();
        let token = store.load_token(&origin)?;

        if token.is_some() {
            tracing::debug!(origin = %origin, "Restored persisted session token");
        }

        Ok(Self {
            api,
            store,
            origin,
            token,
            epoch: SessionEpoch::new(),
        })
    }

    /// Token of the authenticated session, if any
    pub fn current_token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Origin the token is scoped to
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Epoch counter shared with background work of this gate's sessions
    pub fn epoch(&self) -> &SessionEpoch {
        &self.epoch
    }

    /// Exchange credentials for a token.
    ///
    /// On failure the gate stays in its previous state.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<Token, SessionError> {
        let token = self
            .api
            .login(email, password)
            .await
            .map_err(SessionError::Auth)?;

        self.adopt(token.clone())?;
        tracing::info!(email = %email, "Signed in");
        Ok(token)
    }

    /// Create an account and sign in with the same credentials
    pub async fn register(
        &mut self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<Token, SessionError> {
        self.api
            .register(full_name, email, password)
            .await
            .map_err(SessionError::Registration)?;

        tracing::info!(email = %email, "Account registered");
        self.login(email, password).await
    }

    /// Drop the token locally. No server call is made.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        let had_token = self.token.take().is_some();
        self.epoch.advance();
        self.store.clear_token(&self.origin)?;

        if had_token {
            tracing::info!("Signed out");
        }
        Ok(())
    }

    fn adopt(&mut self, token: Token) -> Result<(), SessionError> {
        self.store.save_token(&self.origin, &token)?;
        self.token = Some(token);
        self.epoch.advance();
        Ok(())
    }
}

/// Errors raised by the auth gate
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Login failed: {0}")]
    Auth(#[source] GatewayError),

    #[error("Registration failed: {0}")]
    Registration(#[source] GatewayError),

    #[error("Token store {path:?}: {error}")]
    Store { path: PathBuf, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use tempfile::tempdir;

    const ORIGIN: &str = "http://localhost:8080";

    fn gate_with(fake: FakeGateway, store: TokenStore) -> SessionGate {
        SessionGate::new(Arc::new(fake), store, ORIGIN).unwrap()
    }

    #[tokio::test]
    async fn test_login_persists_token() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json"));
        let mut gate = gate_with(FakeGateway::with_token("jwt-1"), store.clone());

        assert!(!gate.is_authenticated());
        gate.login("ada@example.com", "pw").await.unwrap();

        assert_eq!(gate.current_token(), Some(&Token::new("jwt-1")));
        assert_eq!(store.load_token(ORIGIN).unwrap(), Some(Token::new("jwt-1")));
    }

    #[tokio::test]
    async fn test_failed_login_stays_unauthenticated() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json"));
        let mut gate = gate_with(FakeGateway::with_token("jwt-1"), store.clone());

        let err = gate.login("ada@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, SessionError::Auth(GatewayError::Unauthorized)));
        assert!(!gate.is_authenticated());
        assert!(store.load_token(ORIGIN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json"));
        let mut gate = gate_with(FakeGateway::with_token("jwt-2"), store);

        let token = gate.register("Ada", "ada@example.com", "pw").await.unwrap();
        assert_eq!(token, Token::new("jwt-2"));
        assert!(gate.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_advances_epoch() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json"));
        let mut gate = gate_with(FakeGateway::with_token("jwt-1"), store.clone());

        gate.login("ada@example.com", "pw").await.unwrap();
        let guard = gate.epoch().guard();

        gate.logout().unwrap();
        assert!(!gate.is_authenticated());
        assert!(!guard.is_current());
        assert!(store.load_token(ORIGIN).unwrap().is_none());
    }

    #[test]
    fn test_restores_persisted_token() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json"));
        store.save_token(ORIGIN, &Token::new("saved")).unwrap();

        let gate = gate_with(FakeGateway::default(), store);
        assert_eq!(gate.current_token(), Some(&Token::new("saved")));
    }
}
