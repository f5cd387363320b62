use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

pub fn build_router(state: Arc<AppState>, artifact_dir: &Path, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/readyz", get(health_check))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/create-box", post(handlers::boxes::create_box))
        .route(
            "/add-item",
            post(handlers::boxes::add_item).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/get-boxes", get(handlers::boxes::get_boxes))
        .route(
            "/box/:id",
            get(handlers::boxes::get_box).delete(handlers::boxes::delete_box),
        )
        .route("/box/:box_id/item/:item_id", put(handlers::boxes::update_item))
        .nest_service("/artifacts", ServeDir::new(artifact_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let store_ok = match &state.redis {
        Some(redis) => match redis.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Readiness probe failed: {}", e);
                false
            }
        },
        None => true,
    };
    let (status, label) = if store_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "service": "boxkeeper-gateway",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
