//! hmt-api - Home maintenance tracker service
//!
//! Usage:
//!   hmt-api [--root-folder DIR] [--bind ADDR] [--port PORT]
//!   hmt-api --create-user NAME [--admin]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hmt_api::{build_router, AppState};
use hmt_common::config::{database_path, resolve_root_folder, TomlConfig};
use tokio::signal;
use tracing::{error, info};

const DEFAULT_PORT: u16 = 5780;
const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_LOG_FILTER: &str = "hmt_api=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(name = "hmt-api")]
#[command(about = "Home maintenance tracker API", long_about = None)]
#[command(version)]
struct Args {
    /// Data folder holding hmt.db
    #[arg(short, long, env = "HMT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, env = "HMT_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "HMT_PORT")]
    port: Option<u16>,

    /// Create a user, print its API token, and exit
    #[arg(long, value_name = "NAME")]
    create_user: Option<String>,

    /// Give the user created with --create-user admin rights
    #[arg(long, requires = "create_user")]
    admin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_or_default();

    let default_filter = toml_config
        .log_level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    info!(
        "Starting hmt-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match hmt_common::db::init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e).context("Failed to initialize database");
        }
    };

    if let Some(username) = args.create_user {
        let (user, token) = hmt_api::db::users::create_user(&pool, &username, args.admin)
            .await
            .context("Failed to create user")?;
        println!("Created user '{}' (admin: {})", user.username, user.is_admin);
        println!("API token: {}", token);
        return Ok(());
    }

    let bind = args
        .bind
        .or(toml_config.bind_address)
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let app = build_router(AppState::new(pool));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("hmt-api listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
