//! Router configuration for the APK Depot.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::depot::UPLOADS_URL_PREFIX;

use super::handlers::{delete_apk, list_apks, rename_apk, upload_apk, AppState};
use super::middleware::{create_cors_layer, security_headers};
use super::openapi::create_swagger_router;

/// Room left for multipart boundaries and part headers on top of the file.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Create the main router.
///
/// API routes are mounted at the root next to `/uploads` (stored APKs) and
/// `/health`. Anything else falls through to the static front-end.
pub fn create_router(app_state: Arc<AppState>, config: &Config) -> Router {
    let body_limit = usize::try_from(
        config
            .storage
            .max_upload_size_bytes()
            .saturating_add(MULTIPART_OVERHEAD),
    )
    .unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route(
            "/upload-apk",
            post(upload_apk).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/apks", get(list_apks))
        .route("/rename-apk", patch(rename_apk))
        .route("/delete-apk", delete(delete_apk))
        .with_state(app_state);

    let mut router = Router::new()
        .merge(api_routes)
        .merge(create_health_router())
        .nest_service(
            UPLOADS_URL_PREFIX,
            ServeDir::new(&config.storage.uploads_path),
        );

    if config.web.enable_swagger {
        router = router.merge(create_swagger_router());
    }

    router
        .fallback_service(ServeDir::new(&config.web.static_path))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&config.web.cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(CompressionLayer::new()),
        )
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
