use std::net::SocketAddr;
use std::sync::Arc;

use navlens_core::store::ConfigPublisher;
use navlens_db::repositories::EditorTokenRepo;
use navlens_db::PgVariantStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use navlens_api::config::ServerConfig;
use navlens_api::publisher::{HttpConfigPublisher, LogOnlyPublisher};
use navlens_api::router::build_app_router;
use navlens_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navlens_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = navlens_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    navlens_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    navlens_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    match EditorTokenRepo::purge_expired(&pool).await {
        Ok(purged) => tracing::info!(purged, "Purged expired editor tokens"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge expired editor tokens"),
    }

    // --- Config publishing ---
    let publisher: Arc<dyn ConfigPublisher> = match &config.config_publish_url {
        Some(url) => {
            tracing::info!(%url, "Config publishing enabled");
            Arc::new(HttpConfigPublisher::new(url.clone()))
        }
        None => {
            tracing::info!("CONFIG_PUBLISH_URL not set, config publishing is log-only");
            Arc::new(LogOnlyPublisher)
        }
    };

    // --- App state ---
    let state = AppState {
        store: Arc::new(PgVariantStore::new(pool)),
        publisher,
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

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (on Unix) to start graceful shutdown.
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
