//! API Gateway REST Client
//!
//! HTTP client for the energy platform's API gateway. All user-facing
//! operations of the shell and the dashboard go through [`GatewayApi`], so
//! tests and the shell controller can swap the transport.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use super::dto::{
    IngestRequest, LoginRequest, LoginResponse, Property, RegisterPropertyRequest,
    RegisterRequest, ReportEntry,
};
use crate::config::GatewayConfig;
use crate::session::Token;

/// Operations offered by the API gateway
#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// Exchange credentials for a bearer token
    async fn login(&self, email: &str, password: &str) -> Result<Token, GatewayError>;

    /// Create a user account. Does not return a token.
    async fn register(&self, full_name: &str, email: &str, password: &str)
        -> Result<(), GatewayError>;

    /// List the properties owned by the token's user
    async fn properties(&self, token: &Token) -> Result<Vec<Property>, GatewayError>;

    /// Register a new property at the given address
    async fn register_property(&self, token: &Token, address: &str) -> Result<(), GatewayError>;

    /// Fetch the consumption report for a property, in server order
    async fn report(&self, token: &Token, property_id: &str)
        -> Result<Vec<ReportEntry>, GatewayError>;

    /// Submit a consumption reading for a property
    async fn ingest(&self, token: &Token, property_id: &str, kwh_used: f64)
        -> Result<(), GatewayError>;
}

/// reqwest-backed [`GatewayApi`] implementation
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a new gateway client with the given configuration
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(GatewayError::Request)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request.send().await.map_err(classify)?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &Token, path: &str) -> Result<T, GatewayError> {
        let request = self.client.get(self.url(path)).bearer_auth(token.as_str());
        let response = self.send(request).await?;
        response.json().await.map_err(GatewayError::Request)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        token: Option<&Token>,
        path: &str,
        body: &B,
    ) -> Result<Response, GatewayError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }
        self.send(request).await
    }
}

#[async_trait]
impl GatewayApi for GatewayClient {
    async fn login(&self, email: &str, password: &str) -> Result<Token, GatewayError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self.post_json(None, "/api/users/login", &body).await?;
        let login: LoginResponse = response.json().await.map_err(GatewayError::Request)?;

        if login.token.is_empty() {
            return Err(GatewayError::InvalidResponse("login returned an empty token".to_string()));
        }

        tracing::debug!(email = %email, "Login exchange succeeded");
        Ok(Token::new(login.token))
    }

    async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), GatewayError> {
        let body = RegisterRequest {
            full_name: full_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        self.post_json(None, "/api/users/register", &body).await?;
        Ok(())
    }

    async fn properties(&self, token: &Token) -> Result<Vec<Property>, GatewayError> {
        self.get_json(token, "/api/users/properties").await
    }

    async fn register_property(&self, token: &Token, address: &str) -> Result<(), GatewayError> {
        let body = RegisterPropertyRequest {
            address: address.to_string(),
        };

        self.post_json(Some(token), "/api/users/register-property", &body)
            .await?;
        Ok(())
    }

    async fn report(
        &self,
        token: &Token,
        property_id: &str,
    ) -> Result<Vec<ReportEntry>, GatewayError> {
        let path = format!(
            "/api/recommendations/property/{}",
            urlencoding::encode(property_id)
        );
        self.get_json(token, &path).await
    }

    async fn ingest(
        &self,
        token: &Token,
        property_id: &str,
        kwh_used: f64,
    ) -> Result<(), GatewayError> {
        let body = IngestRequest {
            property_id: property_id.to_string(),
            kwh_used,
        };

        self.post_json(Some(token), "/api/billing/ingest", &body).await?;
        Ok(())
    }
}

/// Origin (`scheme://host:port`) of a gateway base URL.
///
/// Used to scope the persisted session token the way a browser scopes
/// local storage.
pub fn origin_of(base_url: &str) -> Result<String, GatewayError> {
    let url = Url::parse(base_url)
        .map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    Ok(url.origin().ascii_serialization())
}

/// WebSocket URL for the push channel, derived from the HTTP base URL
pub fn push_url(base_url: &str, push_path: &str) -> String {
    let ws_base = base_url
        .trim_end_matches('/')
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}{}", ws_base, push_path)
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_connect() {
        GatewayError::Unavailable
    } else {
        GatewayError::Request(err)
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(GatewayError::Unauthorized);
    }

    let text = response.text().await.unwrap_or_default();
    Err(GatewayError::Api {
        status: status.as_u16(),
        message: text,
    })
}

// ============================================
// Errors
// ============================================

/// Errors that can occur when talking to the API gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("API gateway unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Not authorized")]
    Unauthorized,

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of_strips_path() {
        let origin = origin_of("http://localhost:8080/api/").unwrap();
        assert_eq!(origin, "http://localhost:8080");

        let origin = origin_of("https://portal.example.com").unwrap();
        assert_eq!(origin, "https://portal.example.com");
    }

    #[test]
    fn test_origin_of_rejects_garbage() {
        assert!(matches!(origin_of("not a url"), Err(GatewayError::InvalidUrl(_))));
    }

    #[test]
    fn test_push_url() {
        assert_eq!(
            push_url("http://localhost:8080/", "/ws-notifications"),
            "ws://localhost:8080/ws-notifications"
        );
        assert_eq!(
            push_url("https://portal.example.com", "/ws-notifications"),
            "wss://portal.example.com/ws-notifications"
        );
    }

    #[test]
    fn test_client_trims_base_url() {
        let config = GatewayConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..GatewayConfig::default()
        };
        let client = GatewayClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/api/users/login"), "http://localhost:8080/api/users/login");
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error 500: boom");
        assert_eq!(GatewayError::Unauthorized.to_string(), "Not authorized");
    }
}
