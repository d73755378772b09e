//! Development Gateway
//!
//! In-memory stand-in for the API gateway, built with Axum, so the portal
//! can run without the real backend.
//!
//! # Endpoints
//!
//! - `POST /api/users/login` - Issue a bearer token
//! - `POST /api/users/register` - Create an account
//! - `GET /api/users/properties` - List the caller's properties
//! - `POST /api/users/register-property` - Add a property
//! - `GET /api/recommendations/property/:id` - Readings of a property
//! - `POST /api/billing/ingest` - Record a reading
//! - `GET /health` - Liveness
//! - `GET /ws-notifications` - STOMP over WebSocket push channel
//!
//! Readings above the high-usage threshold are stored with status `RED`
//! and published on the notification topic.

pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::{GatewayApiError, GatewayApiResult};
pub use state::{DevGatewayConfig, GatewayState, DEMO_EMAIL, DEMO_PASSWORD, DEMO_PROPERTY_ID};

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the gateway router
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let user_routes = Router::new()
        .route("/login", post(routes::login))
        .route("/register", post(routes::register))
        .route("/properties", get(routes::list_properties))
        .route("/register-property", post(routes::register_property));

    Router::new()
        .nest("/api/users", user_routes)
        .route("/api/recommendations/property/:id", get(routes::property_report))
        .route("/api/billing/ingest", post(routes::ingest))
        .route("/health", get(routes::health))
        .route("/ws-notifications", get(ws::push_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_on<F>(
    listener: TcpListener,
    state: Arc<GatewayState>,
    shutdown: F,
) -> Result<(), GatewayApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayApiError::Internal(format!("Server error: {}", e)))
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM
pub async fn serve(config: DevGatewayConfig) -> Result<(), GatewayApiError> {
    let state = Arc::new(GatewayState::new(config.clone()));
    if config.seed_demo {
        state.seed_demo().await?;
    }

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Development gateway listening on {}", addr);

    serve_on(listener, state, shutdown_signal()).await?;

    tracing::info!("Development gateway shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
