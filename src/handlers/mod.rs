// src/handlers/mod.rs
pub mod blog;
pub mod health;

use std::any::Any;
use std::sync::Arc;

use axum::{
    response::{IntoResponse, Response},
    Extension, Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::error::AppError;
use crate::middleware::logging::request_logging_middleware;
use crate::AppState;

/// Build the application with all routes, middleware and shared state
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(blog::blog_routes())
        .merge(health::health_routes())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let cause = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(format!("handler panicked: {}", cause)).into_response()
}
