// Scoped ownership of a downloaded audio file
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A downloaded audio file that lives exactly as long as the request that
/// fetched it. `cleanup` removes the file; if it never runs, `Drop` does.
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
    size_bytes: u64,
    armed: bool,
}

impl AudioArtifact {
    pub fn new(path: PathBuf, size_bytes: u64) -> Self {
        Self {
            path,
            size_bytes,
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Delete the file now. Returns `true` when the file is gone afterwards.
    pub async fn cleanup(mut self) -> bool {
        self.armed = false;
        let result = tokio::fs::remove_file(&self.path).await;
        log_removal(&self.path, result)
    }
}

impl Drop for AudioArtifact {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            let result = std::fs::remove_file(&self.path);
            log_removal(&self.path, result);
        }
    }
}

/// Every file a single download may write shares one `{id}.{uuid}` prefix.
///
/// Until [`complete`](Self::complete) or [`discard`](Self::discard) runs,
/// dropping the guard (cancelled request, panic) removes all of them,
/// including partial `.part` files left by a killed download tool.
#[derive(Debug)]
pub(crate) struct PendingDownload {
    dir: PathBuf,
    prefix: String,
    armed: bool,
}

impl PendingDownload {
    pub(crate) fn new(dir: &Path, prefix: String) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix,
            armed: true,
        }
    }

    /// Output path without extension, handed to the download tool.
    pub(crate) fn stem(&self) -> PathBuf {
        self.dir.join(&self.prefix)
    }

    /// The download failed; remove everything it wrote.
    pub(crate) async fn discard(mut self) {
        self.armed = false;
        remove_prefixed_files(&self.dir, &self.prefix, None).await;
    }

    /// `artifact` now owns the finished file; remove any sibling leftovers.
    pub(crate) async fn complete(mut self, artifact: &AudioArtifact) {
        self.armed = false;
        remove_prefixed_files(&self.dir, &self.prefix, Some(artifact.path())).await;
    }
}

impl Drop for PendingDownload {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Download {} abandoned, removing its files", self.prefix);
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with(&self.prefix) {
                let path = entry.path();
                let result = std::fs::remove_file(&path);
                log_removal(&path, result);
            }
        }
    }
}

/// Remove every file in `dir` whose name starts with `prefix`, except `keep`.
async fn remove_prefixed_files(dir: &Path, prefix: &str, keep: Option<&Path>) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        let path = entry.path();
        if keep.map_or(false, |keep| keep == path.as_path()) {
            continue;
        }
        log_removal(&path, tokio::fs::remove_file(&path).await);
    }
}

fn log_removal(path: &Path, result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            tracing::info!("Deleted temp file: {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("Temp file already gone: {}", path.display());
            true
        }
        Err(e) => {
            tracing::error!("Error deleting file {}: {}", path.display(), e);
            false
        }
    }
}
