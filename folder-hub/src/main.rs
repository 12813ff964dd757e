//! Folder hub server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folder_hub::api;
use folder_hub_core::config::HubConfig;
use folder_hub_core::identity::Hs256Verifier;
use folder_hub_core::Hub;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folder-hub")]
#[command(about = "Department and personal folder repository with access control")]
struct Cli {
    /// Directory holding hub.json and audit.log
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        addr: String,

        /// Accept an unsigned X-User-Id header as identity (development only)
        #[arg(long)]
        trust_user_id_header: bool,
    },

    /// Create the first administrator if none exists
    BootstrapAdmin {
        #[arg(long)]
        full_name: String,

        #[arg(long)]
        email: String,
    },
}

struct Config {
    hub: HubConfig,
    jwt_secret: Option<String>,
    admin_password: Option<String>,
}

fn load_config(data_dir: PathBuf) -> Result<Config> {
    Ok(Config {
        hub: HubConfig::persistent(data_dir),
        jwt_secret: std::env::var("FOLDER_HUB_JWT_SECRET").ok(),
        admin_password: std::env::var("FOLDER_HUB_ADMIN_PASSWORD").ok(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.data_dir)?;

    match cli.command {
        Commands::Serve {
            addr,
            trust_user_id_header,
        } => {
            let api_config = api::ApiConfig {
                trust_user_id_header,
            };
            run_server(&addr, config, api_config).await?
        }
        Commands::BootstrapAdmin { full_name, email } => {
            bootstrap_admin(&full_name, &email, config).await?
        }
    }

    Ok(())
}

async fn run_server(addr: &str, config: Config, api_config: api::ApiConfig) -> Result<()> {
    let secret = config
        .jwt_secret
        .context("FOLDER_HUB_JWT_SECRET must be set to serve")?;
    let hub = Arc::new(Hub::open(config.hub).await?);
    let verifier = Arc::new(Hs256Verifier::new(secret));

    if api_config.trust_user_id_header {
        warn!("X-User-Id headers are trusted; do not expose this server");
    }
    let app = api::router(hub.clone(), verifier, api_config)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    hub.audit().flush().await;
    info!("shut down");
    Ok(())
}

async fn bootstrap_admin(full_name: &str, email: &str, config: Config) -> Result<()> {
    let password = config
        .admin_password
        .context("FOLDER_HUB_ADMIN_PASSWORD must be set")?;
    let hub = Hub::open(config.hub).await?;
    let id = hub.bootstrap_admin(full_name, email, &password).await?;
    hub.audit().flush().await;
    println!("administrator: {}", id);

    if let Some(secret) = config.jwt_secret {
        let token = Hs256Verifier::new(secret).issue(id, 24 * 3600)?;
        println!("token (24h): {}", token);
    }
    Ok(())
}
