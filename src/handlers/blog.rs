// HTTP handler for turning a video URL into a blog post

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{BlogPost, VideoRequest};
use crate::AppState;

pub fn blog_routes() -> Router {
    Router::new().route("/generate", post(generate_blog))
}

async fn generate_blog(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> Result<Json<BlogPost>, AppError> {
    let Json(payload) = payload?;
    let post = state.orchestrator.handle(&payload).await?;
    Ok(Json(post))
}
