//! RustCircle binary entry point

use rustcircle::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start HTTP server
/// 6. Start background tasks (notification retention)
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("RUSTCIRCLE__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "rustcircle=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "rustcircle=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting RustCircle...");

    // 2. Initialize metrics
    rustcircle::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        domain = %config.server.domain,
        protocol = %config.server.protocol,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Build Axum router
    let app = rustcircle::build_router(state.clone());

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    // 7. Start background tasks
    if config.notifications.retention_days > 0 {
        spawn_retention_task(state.clone());
    }

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn background notification retention task
fn spawn_retention_task(state: AppState) {
    tokio::spawn(async move {
        let configured_interval_secs = state.config.notifications.purge_interval_seconds;
        let interval_secs = configured_interval_secs.max(1);
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        if configured_interval_secs == 0 {
            tracing::warn!(
                "notifications.purge_interval_seconds=0 is invalid; clamped to 1 second"
            );
        }

        loop {
            interval.tick().await;

            tracing::debug!("Running scheduled notification purge...");
            match state.notifications.purge_expired().await {
                Ok(purged) => tracing::debug!(purged, "Notification purge completed"),
                Err(error) => tracing::error!(%error, "Notification purge failed"),
            }
        }
    });

    tracing::info!("Notification retention task spawned");
}
