//! Energy Portal CLI
//!
//! Terminal shell for the energy-monitoring gateway:
//! - Sign in, register, sign out
//! - List and register properties
//! - Log consumption readings and view the report
//! - Watch live high-usage alerts next to the dashboard

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use energy_portal::config::generate_default_config;
use energy_portal::logging::init_tracing;
use energy_portal::{Config, DashboardView, PortalError, ReportEntry, ShellController};

#[derive(Parser)]
#[command(name = "energy-portal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Energy monitoring portal: dashboard and live usage alerts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API gateway URL (overrides the config file)
    #[arg(long, global = true, env = "ENERGY_PORTAL_GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Path to a config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session token
    Login {
        email: String,
        /// Password (prompted when omitted)
        #[arg(short, long, env = "ENERGY_PORTAL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Register {
        /// Full name
        #[arg(short, long)]
        name: String,
        email: String,
        /// Password (prompted when omitted)
        #[arg(short, long, env = "ENERGY_PORTAL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show session and gateway status
    Status,

    /// List your properties
    Properties,

    /// Register a new property
    AddProperty {
        /// Street address
        address: String,
    },

    /// Log a consumption reading
    Ingest {
        /// Consumption in kWh
        kwh: f64,
        /// Property id (default: dashboard property from config)
        #[arg(short, long)]
        property: Option<String>,
        /// Don't wait for the report to refresh
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the consumption report
    Report {
        /// Property id (default: dashboard property from config)
        #[arg(short, long)]
        property: Option<String>,
    },

    /// Live view: dashboard, alert toasts and alert history
    Watch {
        /// Property id (default: dashboard property from config)
        #[arg(short, long)]
        property: Option<String>,
        /// Screen refresh interval in seconds
        #[arg(long, default_value = "1")]
        refresh_secs: u64,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing config to {:?}", path))?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let mut config = Config::load_from(cli.config.as_deref())?;
    if let Some(url) = &cli.gateway_url {
        config.gateway.base_url = url.clone();
    }
    init_tracing(&config.logging, &[]);

    let json = cli.format == "json";

    match run(cli.command, config, json).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_auth() => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(command: Commands, mut config: Config, json: bool) -> Result<(), PortalError> {
    match command {
        Commands::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let mut shell = ShellController::connect(config)?;
            shell.login(&email, &password).await?;
            println!("Signed in as {}", email);
        }

        Commands::Register {
            name,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let mut shell = ShellController::connect(config)?;
            shell.register(&name, &email, &password).await?;
            println!("Account created. Signed in as {}", email);
        }

        Commands::Logout => {
            let mut shell = ShellController::connect(config)?;
            shell.logout().await?;
            println!("Signed out");
        }

        Commands::Status => {
            let token_store = config.session.token_store_path();
            let mut shell = ShellController::connect(config)?;

            println!("Energy Portal v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Gateway:     {}", shell.config().gateway.base_url);
            println!("Token store: {:?}", token_store);
            println!("Property:    {}", shell.config().dashboard.property_id);

            if !shell.is_authenticated() {
                println!("Session:     signed out");
                return Ok(());
            }
            println!("Session:     signed in");

            let dashboard = shell.open_dashboard().await?;
            println!("Properties:  {}", shell.directory().len().await);
            match dashboard.view().await {
                DashboardView::Ready(view) => println!("Readings:    {}", view.readings),
                DashboardView::Loading => println!("Readings:    unavailable"),
                DashboardView::NoProperty => println!("Readings:    no property selected"),
            }
        }

        Commands::Properties => {
            let mut shell = signed_in(config)?;
            shell.open_dashboard().await?;
            let properties = shell.directory().properties().await;

            if json {
                print_json(&properties)?;
            } else if properties.is_empty() {
                println!("No properties registered yet.");
                println!();
                println!("Register one with:");
                println!("  energy-portal add-property \"12 Harbour Road\"");
            } else {
                println!("{:<18} {}", "Property", "Address");
                println!("{}", "-".repeat(50));
                for property in properties {
                    println!("{:<18} {}", property.property_id, property.address);
                }
            }
        }

        Commands::AddProperty { address } => {
            let mut shell = signed_in(config)?;
            let dashboard = shell.open_dashboard().await?;
            let result = dashboard.register_property(shell.directory(), &address).await;
            print_notices(&mut shell);
            result?;

            if json {
                print_json(&shell.directory().properties().await)?;
            }
        }

        Commands::Ingest {
            kwh,
            property,
            no_wait,
        } => {
            if let Some(property) = property {
                config.dashboard.property_id = property;
            }
            let mut shell = signed_in(config)?;
            let dashboard = shell.open_dashboard().await?;

            let result = dashboard.log_consumption(kwh).await;
            print_notices(&mut shell);
            let refetch = result?;

            if no_wait {
                refetch.abort();
                return Ok(());
            }
            if refetch.await.is_ok() {
                print_view(&dashboard.view().await, dashboard.report().await, json)?;
            }
        }

        Commands::Report { property } => {
            if let Some(property) = property {
                config.dashboard.property_id = property;
            }
            let mut shell = signed_in(config)?;
            let dashboard = shell.open_dashboard().await?;
            print_view(&dashboard.view().await, dashboard.report().await, json)?;
        }

        Commands::Watch {
            property,
            refresh_secs,
        } => {
            if let Some(property) = property {
                config.dashboard.property_id = property;
            }
            let mut shell = signed_in(config)?;
            watch(&mut shell, Duration::from_secs(refresh_secs.max(1))).await?;
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

async fn watch(shell: &mut ShellController, refresh: Duration) -> Result<(), PortalError> {
    shell.start_session().await?;
    shell.start_polling();

    let mut feed_state = shell.feed().watch_state();
    let mut ticker = tokio::time::interval(refresh);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            line = input.next_line(), if input_open => match line {
                Ok(Some(_)) => shell.dismiss_notices(),
                _ => input_open = false,
            },
            changed = feed_state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }

        let frame = shell.render().await;
        print!("\x1b[2J\x1b[H{}", frame);
        println!();
        println!("Ctrl+C to quit");
        let _ = std::io::stdout().flush();
    }

    shell.end_session().await;
    println!();
    Ok(())
}

fn signed_in(config: Config) -> Result<ShellController, PortalError> {
    let shell = ShellController::connect(config)?;
    if !shell.is_authenticated() {
        return Err(PortalError::NotAuthenticated);
    }
    Ok(shell)
}

fn print_notices(shell: &mut ShellController) {
    for notice in shell.drain_notices() {
        if notice.is_blocking() {
            eprintln!("{}", notice);
        } else {
            println!("{}", notice);
        }
    }
}

fn print_view(
    view: &DashboardView,
    report: Option<Vec<ReportEntry>>,
    json: bool,
) -> Result<(), PortalError> {
    if json {
        print_json(&report.unwrap_or_default())
    } else {
        print!("{}", view);
        Ok(())
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), PortalError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| PortalError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    println!("{}", text);
    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String, PortalError> {
    if let Some(password) = password {
        return Ok(password);
    }

    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
