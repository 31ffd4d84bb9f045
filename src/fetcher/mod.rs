// Audio download capability: URL validation, size ceilings, scratch hygiene

pub mod artifact;
pub mod ytdlp_client;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::config::FetchConfig;
use crate::error::FetchError;

pub use artifact::AudioArtifact;
use artifact::PendingDownload;
pub use ytdlp_client::YtDlpClient;

const MB: f64 = 1024.0 * 1024.0;

/// Audio stream chosen for a URL, as reported before any transfer
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Identifier of the media item on its platform (e.g. the YouTube video id)
    pub id: String,
    pub format_id: Option<String>,
    pub ext: String,
    pub estimated_size: Option<u64>,
    pub title: Option<String>,
}

/// Something that can locate and download the best audio stream for a URL.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn probe(&self, url: &str) -> Result<StreamInfo, FetchError>;

    /// Download `stream` so that the written file name starts with `output_stem`.
    async fn download(
        &self,
        url: &str,
        stream: &StreamInfo,
        output_stem: &Path,
    ) -> Result<PathBuf, FetchError>;
}

pub struct AudioFetcher {
    source: Arc<dyn MediaSource>,
    config: FetchConfig,
}

impl AudioFetcher {
    pub fn new(source: Arc<dyn MediaSource>, config: FetchConfig) -> Self {
        Self { source, config }
    }

    /// Download the audio track behind `url` into the scratch directory.
    ///
    /// The returned artifact owns the file. On every error path no file
    /// written for this call is left behind.
    pub async fn fetch(&self, url: &str) -> Result<AudioArtifact, FetchError> {
        let url = validate_url(url)?;
        tracing::info!("Attempting to download audio from: {}", url);

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;

        let stream = self.source.probe(url.as_str()).await?;
        let title = stream.title.as_deref().unwrap_or("untitled");
        match stream.estimated_size {
            Some(size) => tracing::info!(
                "Found audio stream for '{}': id={}, ext={}, estimated size: {:.2} MB",
                title,
                stream.id,
                stream.ext,
                size as f64 / MB
            ),
            None => tracing::warn!(
                "Found audio stream for '{}': id={}, ext={}, size unknown before download",
                title,
                stream.id,
                stream.ext
            ),
        }

        if let Some(size) = stream.estimated_size {
            if size > self.config.max_estimated_bytes {
                return Err(FetchError::EstimatedTooLarge {
                    size_bytes: size,
                    limit_bytes: self.config.max_estimated_bytes,
                });
            }
        }

        let target = file_safe_id(&stream.id);
        remove_stale_files(&self.config.scratch_dir, &target, self.config.stale_after).await;

        let pending = PendingDownload::new(
            &self.config.scratch_dir,
            format!("{}.{}", target, Uuid::new_v4().simple()),
        );
        let stem = pending.stem();
        tracing::info!("Downloading to {}.{}...", stem.display(), stream.ext);

        let path = match self.source.download(url.as_str(), &stream, &stem).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("Download failed: {}", e);
                pending.discard().await;
                return Err(e);
            }
        };

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                pending.discard().await;
                return Err(FetchError::MissingOutput);
            }
            Err(e) => {
                pending.discard().await;
                return Err(if e.kind() == std::io::ErrorKind::NotFound {
                    FetchError::MissingOutput
                } else {
                    FetchError::Io(e)
                });
            }
        };

        let artifact = AudioArtifact::new(path, size_bytes);
        pending.complete(&artifact).await;
        tracing::info!("Download complete. File size: {:.2} MB", artifact.size_mb());

        if artifact.size_bytes() > self.config.max_downloaded_bytes {
            let size_bytes = artifact.size_bytes();
            artifact.cleanup().await;
            return Err(FetchError::DownloadedTooLarge {
                size_bytes,
                limit_bytes: self.config.max_downloaded_bytes,
            });
        }

        Ok(artifact)
    }
}

pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| FetchError::InvalidUrl(format!("{} ({})", trimmed, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(format!(
            "{} (URL must use HTTP or HTTPS)",
            trimmed
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidUrl(format!("{} (missing host)", trimmed)));
    }

    Ok(parsed)
}

/// Reduce a platform identifier to characters safe for a file name.
fn file_safe_id(id: &str) -> String {
    let safe: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if safe.is_empty() {
        "audio".to_string()
    } else {
        safe
    }
}

/// Best-effort removal of leftovers from earlier requests for the same media
/// item. Only files named `{target}.{...}` (this service's own naming) and
/// older than `stale_after` are touched, so unrelated files in a shared
/// directory and in-flight downloads for the same video survive.
pub async fn remove_stale_files(dir: &Path, target: &str, stale_after: Duration) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Error during pre-download cleanup: {}", e);
            return 0;
        }
    };

    let own_prefix = format!("{}.", target);
    let now = SystemTime::now();
    let mut removed = 0;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Error during pre-download cleanup: {}", e);
                break;
            }
        };

        if !entry.file_name().to_string_lossy().starts_with(&own_prefix) {
            continue;
        }

        let is_stale = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map_or(false, |age| age >= stale_after),
            _ => false,
        };
        if !is_stale {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Removed stale file: {}", path.display());
                removed += 1;
            }
            Err(e) => tracing::warn!("Could not remove old file {}: {}", path.display(), e),
        }
    }

    removed
}
