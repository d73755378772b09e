//! Energy Portal Development Gateway
//!
//! Run with: cargo run --bin energy-portal-gateway -- --seed-demo
//!
//! In-memory implementation of the gateway REST API and the STOMP push
//! channel. State is lost on exit.
//!
//! - `RUST_LOG`: Log filter (default: energy_portal=info,tower_http=debug)

use clap::Parser;

use energy_portal::config::LoggingConfig;
use energy_portal::devgateway::{serve, DevGatewayConfig, DEMO_EMAIL, DEMO_PASSWORD};
use energy_portal::logging::init_tracing;

#[derive(Parser)]
#[command(name = "energy-portal-gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "In-memory development gateway for Energy Portal")]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "ENERGY_GATEWAY_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "ENERGY_GATEWAY_PORT")]
    port: u16,

    /// Readings above this many kWh raise an alert
    #[arg(long, default_value = "50.0")]
    high_usage_kwh: f64,

    /// Create a demo account with one property and a few readings
    #[arg(long)]
    seed_demo: bool,

    /// Log format (pretty, json)
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(
        &LoggingConfig {
            level: "info".to_string(),
            format: args.log_format.clone(),
        },
        &["tower_http=debug"],
    );

    tracing::info!("Starting Energy Portal gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = DevGatewayConfig {
        host: args.host,
        port: args.port,
        high_usage_kwh: args.high_usage_kwh,
        seed_demo: args.seed_demo,
        ..DevGatewayConfig::default()
    };

    if config.seed_demo {
        tracing::info!("Demo account: {} / {}", DEMO_EMAIL, DEMO_PASSWORD);
    }

    serve(config).await?;
    Ok(())
}
