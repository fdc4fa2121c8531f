//! subloop-daemon: the Subloop API server.
//!
//! Single OS process running a Tokio async runtime. The browser client
//! talks to the daemon with JSON-RPC over HTTP and receives live updates
//! over a server-sent events stream.

mod auth;
mod commands;
mod config;
mod events;
mod http;
mod rpc;

use std::sync::Arc;

use anyhow::Context;
use subloop_db::queries::roles;
use subloop_tasks::{CatalogVerifier, TaskVerifier};
use subloop_types::events::{Event, EventType};
use subloop_types::Role;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::auth::TokenVerifier;
use crate::config::DaemonConfig;
use crate::events::EventBus;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Decides whether a claimed task action happened.
    pub verifier: Arc<dyn TaskVerifier>,
    /// Bearer token verification.
    pub tokens: TokenVerifier,
    /// Shutdown signal sender. Open event streams close when it fires.
    pub shutdown_tx: broadcast::Sender<()>,
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing; RUST_LOG wins over the config file.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.advanced.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Subloop daemon starting");

    if config.auth.jwt_secret.is_empty() {
        anyhow::bail!(
            "no JWT secret configured; set auth.jwt_secret or {}",
            config::JWT_SECRET_ENV
        );
    }

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    // 2. Open database
    let db_path = data_dir.join("subloop.db");
    let conn = subloop_db::open(&db_path)?;
    for user_id in &config.auth.admin_users {
        roles::set(&conn, user_id, Role::Admin, unix_now())?;
        info!(user_id = %user_id, "admin role granted from config");
    }
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. Create event bus and shutdown channel
    let event_bus = EventBus::new(1000);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 4. Build daemon state
    let tokens = TokenVerifier::new(&config.auth.jwt_secret, config.auth.token_leeway_secs);
    let listen_addr = config.listen_addr();
    let state = Arc::new(DaemonState {
        db,
        config,
        event_bus,
        verifier: Arc::new(CatalogVerifier),
        tokens,
        shutdown_tx: shutdown_tx.clone(),
    });

    // 5. Bind the HTTP listener
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    info!("Listening on http://{}", listen_addr);

    // 6. Emit DaemonStarted event
    state.event_bus.emit(Event::broadcast(
        EventType::DaemonStarted,
        unix_now(),
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    ));

    // 7. Serve until a shutdown signal arrives
    let app = http::router(state.clone());
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await;
    if let Err(e) = served {
        error!("HTTP server error: {}", e);
    }

    info!("Daemon stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM, then tell open streams to close.
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler failed: {}", e);
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
                warn!("SIGTERM handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
    // No open streams is fine.
    let _ = shutdown_tx.send(());
    info!("Daemon shutting down gracefully");
}
