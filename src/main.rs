//! Ride Dispatch Backend
//!
//! Matches waiting rides to vacant vehicles, advances rides through their
//! lifecycle and delivers status events to polling vehicles, with SQLite as
//! the single source of truth.

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod dispatch;
mod errors;
mod models;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::{IdentityResolver, MemoryIdentityCache};
use config::{Config, LogFormat};
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub identity: Arc<IdentityResolver>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("Starting Ride Dispatch Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Identity cache TTL: {:?}, status append: {:?}",
        config.identity_ttl,
        config.status_append
    );

    if config.internal_psk.is_none() {
        tracing::warn!(
            "No internal PSK configured (DISPATCH_INTERNAL_PSK). Internal routes are open!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let identity = Arc::new(IdentityResolver::new(
        Arc::new(MemoryIdentityCache::new()),
        config.identity_ttl,
    ));

    match config.matching_interval {
        Some(interval) => {
            tracing::info!("In-process dispatch every {:?}", interval);
            dispatch::spawn_dispatch_loop(repo.clone(), interval);
        }
        None => tracing::info!("In-process dispatch disabled; waiting for external trigger"),
    }

    // Create application state
    let state = AppState {
        repo,
        identity,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.internal_psk.clone();

    // Internal routes, invoked by the scheduler
    let internal_routes = Router::new()
        .route("/matching", get(api::trigger_matching))
        .route("/vacancies", get(api::list_vacancies))
        .route("/vacancies/reconcile", post(api::reconcile_vacancies))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    let api_routes = Router::new()
        // Owners
        .route("/owners", post(api::register_owner))
        // Vehicles
        .route("/vehicles", post(api::register_vehicle))
        .route("/vehicles/activity", post(api::post_activity))
        .route("/vehicles/coordinates", post(api::post_coordinate))
        .route("/vehicles/notification", get(api::get_notification))
        .route("/vehicles/rides/{ride_id}/status", post(api::post_ride_status))
        // Riders
        .route("/users", post(api::register_user))
        .route("/rides", post(api::create_ride))
        .route("/rides/{ride_id}", get(api::get_ride))
        .route("/rides/{ride_id}/complete", post(api::complete_ride))
        .route("/rides/{ride_id}/cancel", post(api::cancel_ride))
        .nest("/internal", internal_routes);

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
