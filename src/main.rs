use std::sync::Arc;

use video_blogger::config::Config;
use video_blogger::{handlers, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = Config::from_env()?;
    log_configuration(&config);

    if let Err(e) = tokio::fs::create_dir_all(&config.fetch.scratch_dir).await {
        tracing::warn!(
            "Failed to create scratch directory {}: {}",
            config.fetch.scratch_dir.display(),
            e
        );
    } else {
        tracing::info!("Scratch directory ready: {}", config.fetch.scratch_dir.display());
    }

    let shared_state = Arc::new(AppState::from_config(&config));
    let app = handlers::app(shared_state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,video_blogger=trace,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,video_blogger=info,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for production (easier for log aggregation)
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("video_blogger starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}

fn log_configuration(config: &Config) {
    if config.gemini.api_key.is_none() {
        tracing::warn!("GOOGLE_API_KEY not found in environment variables");
        tracing::info!("Blog generation will fail until GOOGLE_API_KEY is set");
    }

    tracing::info!(
        "Configuration - Gemini model: {}, yt-dlp: {}, limits: {} MB estimated / {} MB downloaded, retries: {} x {:?}",
        config.gemini.model,
        config.fetch.ytdlp_path,
        config.fetch.max_estimated_bytes / (1024 * 1024),
        config.fetch.max_downloaded_bytes / (1024 * 1024),
        config.retry.max_attempts,
        config.retry.base_delay
    );
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
