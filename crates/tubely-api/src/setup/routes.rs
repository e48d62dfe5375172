//! Route configuration and setup

use crate::constants::{ASSETS_PATH, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::middleware::{error_details_middleware, ErrorDetailsConfig};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tubely_core::{Config, StorageBackend};

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let config = &state.config;
    let cors = setup_cors(config)?;

    let thumbnail_limit = body_limit(config.max_thumbnail_size_bytes);
    let video_limit = body_limit(config.max_video_size_bytes);

    // The stager enforces the exact cap on the file part; these layers only
    // stop runaway bodies.
    let upload_routes = Router::new()
        .route(
            "/api/thumbnail_upload/{video_id}",
            post(handlers::upload_thumbnail).layer(RequestBodyLimitLayer::new(thumbnail_limit)),
        )
        .route(
            "/api/video_upload/{video_id}",
            post(handlers::upload_video).layer(RequestBodyLimitLayer::new(video_limit)),
        )
        .layer(DefaultBodyLimit::disable());

    let api_routes = Router::new()
        .route("/api/videos", post(handlers::create_video))
        .route("/api/videos/{video_id}", get(handlers::get_video));

    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(api_routes)
        .merge(upload_routes);

    if config.storage_backend == StorageBackend::Local {
        tracing::info!(
            root = %config.local_storage_path,
            path = ASSETS_PATH,
            "Serving local assets"
        );
        app = app.nest_service(ASSETS_PATH, ServeDir::new(&config.local_storage_path));
    }

    let error_details = Arc::new(ErrorDetailsConfig::from_config(config));

    let app = app
        .layer(axum::middleware::from_fn_with_state(
            error_details,
            error_details_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn body_limit(cap: u64) -> usize {
    usize::try_from(cap.saturating_add(MULTIPART_OVERHEAD_BYTES)).unwrap_or(usize::MAX)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS_ORIGINS entry: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
