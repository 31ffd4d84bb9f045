use axum::{response::Json, routing::get, Router};

use crate::models::HealthResponse;

pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Liveness only; never consults configuration or upstream services.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
