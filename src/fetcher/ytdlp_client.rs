// yt-dlp client wrapper using command-line tool
// Calls yt-dlp executable directly to avoid dependency conflicts

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{MediaSource, StreamInfo};
use crate::config::FetchConfig;
use crate::error::FetchError;

/// Prefer m4a so the upload MIME type is predictable; fall back to any audio-only stream.
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio";

pub struct YtDlpClient {
    binary: String,
    cookies_file: Option<PathBuf>,
    max_filesize: u64,
}

impl YtDlpClient {
    pub fn new(config: &FetchConfig) -> Self {
        let cookies_file = if config.cookies_file.is_file() {
            tracing::info!("Found {}, passing cookies to yt-dlp.", config.cookies_file.display());
            Some(config.cookies_file.clone())
        } else {
            tracing::warn!(
                "{} not found. Bot detection may occur.",
                config.cookies_file.display()
            );
            None
        };

        Self {
            binary: config.ytdlp_path.clone(),
            cookies_file,
            max_filesize: config.max_estimated_bytes,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--no-playlist")
            .arg("--no-progress")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cookies) = &self.cookies_file {
            command.arg("--cookies").arg(cookies);
        }
        command
    }

    /// Check if yt-dlp is installed
    async fn check_ytdlp_installed(&self) -> Result<(), FetchError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(FetchError::ToolUnavailable(format!(
                "{} is not installed. Install it with: pip install yt-dlp OR apt install yt-dlp",
                self.binary
            ))),
        }
    }
}

#[async_trait]
impl MediaSource for YtDlpClient {
    async fn probe(&self, url: &str) -> Result<StreamInfo, FetchError> {
        tracing::info!("ℹ️ Fetching audio stream metadata: {}", url);

        self.check_ytdlp_installed().await?;

        let output = self
            .command()
            .arg("--dump-json")
            .arg("--format")
            .arg(AUDIO_FORMAT)
            .arg(url)
            .output()
            .await
            .map_err(|e| FetchError::ToolUnavailable(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!("yt-dlp error: {}", stderr);
            return Err(classify_failure("yt-dlp info extraction failed", &stderr));
        }

        parse_stream_info(&String::from_utf8_lossy(&output.stdout))
    }

    async fn download(
        &self,
        url: &str,
        stream: &StreamInfo,
        output_stem: &Path,
    ) -> Result<PathBuf, FetchError> {
        tracing::info!("📥 Downloading audio stream {} from: {}", stream.id, url);

        let template = format!("{}.%(ext)s", output_stem.display());
        let output = self
            .command()
            .arg("--format")
            .arg(stream.format_id.as_deref().unwrap_or(AUDIO_FORMAT))
            .arg("--max-filesize")
            .arg(self.max_filesize.to_string())
            .arg("--output")
            .arg(&template)
            .arg("--print")
            .arg("after_move:filepath")
            .arg(url)
            .output()
            .await
            .map_err(|e| FetchError::ToolUnavailable(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!("yt-dlp error: {}", stderr);
            return Err(classify_failure("yt-dlp download failed", &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::debug!("yt-dlp output: {}", stdout);

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{}.{}", output_stem.display(), stream.ext))))
    }
}

/// Map yt-dlp's `--dump-json` output for a single selected format.
pub fn parse_stream_info(stdout: &str) -> Result<StreamInfo, FetchError> {
    let json: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|e| FetchError::DownloadFailed(format!("Failed to parse yt-dlp JSON output: {}", e)))?;

    let id = json["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FetchError::DownloadFailed("yt-dlp did not report a media id".to_string()))?
        .to_string();

    if json["acodec"].as_str() == Some("none") {
        return Err(FetchError::NoAudioStream);
    }

    let estimated_size = json["filesize"]
        .as_u64()
        .or_else(|| json["filesize_approx"].as_f64().map(|size| size as u64));

    Ok(StreamInfo {
        id,
        format_id: json["format_id"].as_str().map(|s| s.to_string()),
        ext: json["ext"].as_str().unwrap_or("m4a").to_string(),
        estimated_size,
        title: json["title"].as_str().map(|s| s.to_string()),
    })
}

fn classify_failure(context: &str, stderr: &str) -> FetchError {
    if stderr.contains("Requested format is not available") {
        FetchError::NoAudioStream
    } else {
        let reason = stderr
            .lines()
            .rev()
            .find(|line| line.contains("ERROR"))
            .unwrap_or(stderr)
            .trim();
        FetchError::DownloadFailed(format!("{}: {}", context, reason))
    }
}
