use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use photogate_db::{MemoryRecordStore, PgRecordStore, RecordStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photogate_api::config::ServerConfig;
use photogate_api::pipeline::Pipeline;
use photogate_api::router::build_app_router;
use photogate_api::scheduler::PipelineScheduler;
use photogate_api::error;
use photogate_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photogate=debug,photogate_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    error::set_development(config.development);
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Record store ---
    let records: Arc<dyn RecordStore> = match &config.database_url {
        Some(database_url) => {
            let pool = photogate_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            photogate_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            photogate_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgRecordStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory record store");
            Arc::new(MemoryRecordStore::new())
        }
    };

    // --- Blob store ---
    let blobs = photogate_storage::create_blob_store(&config.storage)
        .await
        .expect("Failed to initialize blob storage");
    tracing::info!("Blob store initialized");

    // --- Pipeline + scheduler ---
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&records),
        Arc::clone(&blobs),
        Arc::new(config.analyzers.clone()),
        config.development,
    ));
    let scheduler = PipelineScheduler::start(pipeline, config.worker_count);

    // --- App state + router ---
    let state = AppState {
        records,
        blobs,
        scheduler: Arc::clone(&scheduler),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

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
    tracing::info!("Server stopped accepting connections, draining pipeline runs");
    scheduler
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!("Graceful shutdown complete");
}

/// Resolve once the process is asked to stop.
///
/// Interactive stops arrive as SIGINT; process managers send SIGTERM on
/// Unix. Whichever fires first wins and is logged so the shutdown cause
/// shows up next to the drain messages.
async fn shutdown_signal() {
    #[cfg(unix)]
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation failed");

    #[cfg(unix)]
    let terminate = sigterm.recv();
    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.expect("Ctrl-C handler installation failed");
            tracing::info!(signal = "SIGINT", "shutdown requested");
        }
        _ = terminate => {
            tracing::info!(signal = "SIGTERM", "shutdown requested");
        }
    }
}
