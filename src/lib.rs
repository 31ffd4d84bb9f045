// lib.rs - Video URL to blog post service
pub mod config;
pub mod error;
pub mod fetcher;
pub mod gemini_client;
pub mod generator;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod orchestrator;
pub mod retry;

use std::sync::Arc;

use config::Config;
use fetcher::{AudioFetcher, YtDlpClient};
use generator::GeminiGenerator;
use orchestrator::RequestOrchestrator;
use retry::RetryPolicy;

// Re-export commonly used types for convenience
pub use error::{AppError, FetchError, GenerationError};
pub use models::{BlogPost, VideoRequest};

/// Shared state handed to every request handler
pub struct AppState {
    pub orchestrator: RequestOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: RequestOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Wire the production collaborators from configuration.
    pub fn from_config(config: &Config) -> Self {
        let source = Arc::new(YtDlpClient::new(&config.fetch));
        let fetcher = AudioFetcher::new(source, config.fetch.clone());
        let generator = GeminiGenerator::new(&config.gemini, RetryPolicy::from(config.retry));
        Self::new(RequestOrchestrator::new(fetcher, Arc::new(generator)))
    }
}
