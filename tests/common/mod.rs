#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use video_blogger::config::FetchConfig;
use video_blogger::fetcher::{AudioFetcher, MediaSource, StreamInfo};
use video_blogger::generator::ContentGenerator;
use video_blogger::orchestrator::RequestOrchestrator;
use video_blogger::retry::Sleeper;
use video_blogger::{BlogPost, FetchError, GenerationError};

pub const MB: u64 = 1024 * 1024;
pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Media source that writes files locally instead of calling yt-dlp.
pub struct FakeSource {
    pub id: String,
    pub estimated_size: Option<u64>,
    pub written_size: u64,
    pub fail_download: bool,
    pub stall_download: bool,
    pub no_audio: bool,
    pub probe_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            id: "dQw4w9WgXcQ".to_string(),
            estimated_size: Some(3 * MB),
            written_size: 4096,
            fail_download: false,
            stall_download: false,
            no_audio: false,
            probe_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Write a partial file, then hang as a slow transfer would.
    pub fn stalling_download(mut self) -> Self {
        self.stall_download = true;
        self
    }

    pub fn with_estimate(mut self, estimate: Option<u64>) -> Self {
        self.estimated_size = estimate;
        self
    }

    pub fn with_written_size(mut self, size: u64) -> Self {
        self.written_size = size;
        self
    }

    pub fn failing_download(mut self) -> Self {
        self.fail_download = true;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.no_audio = true;
        self
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FakeSource {
    async fn probe(&self, _url: &str) -> Result<StreamInfo, FetchError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.no_audio {
            return Err(FetchError::NoAudioStream);
        }
        Ok(StreamInfo {
            id: self.id.clone(),
            format_id: Some("140".to_string()),
            ext: "m4a".to_string(),
            estimated_size: self.estimated_size,
            title: Some("Test video".to_string()),
        })
    }

    async fn download(
        &self,
        _url: &str,
        stream: &StreamInfo,
        output_stem: &Path,
    ) -> Result<PathBuf, FetchError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let path = PathBuf::from(format!("{}.{}", output_stem.display(), stream.ext));

        if self.fail_download || self.stall_download {
            let partial = PathBuf::from(format!("{}.part", path.display()));
            tokio::fs::write(&partial, b"partial").await?;
            if self.stall_download {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            return Err(FetchError::DownloadFailed("connection reset by peer".to_string()));
        }

        let file = std::fs::File::create(&path)?;
        file.set_len(self.written_size)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Succeed,
    FailMalformed,
    Panic,
}

/// Generator that records which file it was handed and whether it existed.
pub struct FakeGenerator {
    behaviour: Behaviour,
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeGenerator {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate(&self, audio_path: &Path) -> Result<BlogPost, GenerationError> {
        self.seen
            .lock()
            .unwrap()
            .push((audio_path.to_path_buf(), audio_path.exists()));

        match self.behaviour {
            Behaviour::Succeed => Ok(sample_post()),
            Behaviour::FailMalformed => Err(GenerationError::MalformedOutput(
                "expected value at line 1 column 1".to_string(),
            )),
            Behaviour::Panic => panic!("generator exploded"),
        }
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.delays().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub fn sample_post() -> BlogPost {
    BlogPost {
        title: "Never Gonna Give You Up: A Retrospective".to_string(),
        content_html: "<h2>Introduction</h2><p>A look back.</p>".to_string(),
        summary_for_card: "A short look back at a classic.".to_string(),
    }
}

pub fn fetch_config(dir: &Path) -> FetchConfig {
    FetchConfig {
        scratch_dir: dir.to_path_buf(),
        ..FetchConfig::default()
    }
}

pub fn orchestrator(
    dir: &Path,
    source: Arc<FakeSource>,
    generator: Arc<dyn ContentGenerator>,
) -> RequestOrchestrator {
    let fetcher = AudioFetcher::new(source, fetch_config(dir));
    RequestOrchestrator::new(fetcher, generator)
}

pub fn scratch_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
