mod config;
mod manage;

use std::net::SocketAddr;

use axum::http::{HeaderValue, Method, header::{CONTENT_TYPE, RANGE}};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use margins_api::{AppStateInner, api_router};
use margins_db::Database;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "margins")]
#[command(about = "Invite-only beta reader site for a single book")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default)
    Serve,
    /// Add invite codes
    CreateInvites {
        /// Codes to add
        codes: Vec<String>,
        /// Also generate N random codes and print them
        #[arg(long, value_name = "N")]
        generate: Option<usize>,
    },
    /// Promote an existing reader to admin
    MakeAdmin {
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads the environment
    let _ = dotenvy::dotenv();
    let Cli { config, command } = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "margins=debug,tower_http=debug".into()),
        )
        .init();

    let db = Database::open(&config.db_path)?;

    match command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::CreateInvites { codes, generate } => manage::create_invites(&db, codes, generate).map(|_| ()),
        Command::MakeAdmin { email } => manage::make_admin(&db, &email),
    }
}

async fn serve(config: Config, db: Database) -> anyhow::Result<()> {
    if config.uses_placeholder_secret() {
        warn!("MARGINS_SECRET is unset or a placeholder; set a random secret before deploying");
    }

    let state = AppStateInner::new(db, config.api_config())?;

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, RANGE])
        .allow_credentials(true);

    let mut app = api_router(state);
    if let Some(dir) = &config.static_dir {
        info!("Serving frontend from {}", dir.display());
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }
    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Margins listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
