//! RustCircle - social relationship and interaction consistency engine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Friend request / follow / block endpoints                │
//! │  - Reaction, comment, share, story endpoints                │
//! │  - Notification inbox                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Precondition checks and block enforcement                │
//! │  - Notification fan-out (NotificationSink)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx), edge tables, IMMEDIATE transactions       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `auth`: Session token verification
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Friend requests, follows, blocks
    pub relationships: Arc<service::RelationshipService>,

    /// Reaction ledger
    pub reactions: Arc<service::ReactionService>,

    /// Content registration, comments, shares, story likes
    pub interactions: Arc<service::InteractionService>,

    /// Notification inbox and sink
    pub notifications: Arc<service::NotificationService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Build the notification service
    /// 3. Wire the producers to it through `NotificationSink`
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        let notifications = Arc::new(service::NotificationService::new(
            db.clone(),
            config.notifications.clone(),
        ));
        let sink: Arc<dyn service::NotificationSink> = notifications.clone();
        let enforce_blocks = config.relationships.enforce_blocks_on_content;

        let relationships = Arc::new(service::RelationshipService::new(db.clone(), sink.clone()));
        let reactions = Arc::new(service::ReactionService::new(
            db.clone(),
            sink.clone(),
            enforce_blocks,
        ));
        let interactions = Arc::new(service::InteractionService::new(
            db.clone(),
            sink,
            enforce_blocks,
        ));

        tracing::info!(enforce_blocks, "Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            relationships,
            reactions,
            interactions,
            notifications,
        })
    }
}

const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower::ServiceBuilder;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer,
        map_response_body::MapResponseBodyLayer, trace::TraceLayer,
    };

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::metrics_router())
        .nest("/api", api::api_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer)
                .layer(CompressionLayer::new())
                .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES)),
        )
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
