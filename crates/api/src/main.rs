use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assetlink_api::background::lock_sweep;
use assetlink_api::config::ServerConfig;
use assetlink_api::router::build_app_router;
use assetlink_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assetlink_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        lock_ttl_mins = config.lock_ttl_mins,
        transition_mode = ?config.transition_mode,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = assetlink_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    assetlink_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    assetlink_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let strategy = assetlink_db::transition::select_strategy(&pool, config.transition_mode)
        .await
        .expect("Failed to select association transition strategy");

    // --- App state ---
    let state = AppState::new(pool, config.clone(), strategy);

    // --- Lock sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(lock_sweep::run(
        state.associations.locks().clone(),
        Duration::from_secs(config.lock_sweep_interval_secs),
        sweep_cancel.clone(),
    ));

    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(shutdown_timeout, sweep_handle).await.is_err() {
        tracing::warn!("Lock sweep did not stop within the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
