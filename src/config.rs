// config.rs - Runtime configuration assembled once at startup
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub fetch: FetchConfig,
    pub gemini: GeminiConfig,
    pub retry: RetryConfig,
}

/// Download capability settings and size ceilings
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub scratch_dir: PathBuf,
    pub ytdlp_path: String,
    pub cookies_file: PathBuf,
    pub max_estimated_bytes: u64,
    pub max_downloaded_bytes: u64,
    pub stale_after: Duration,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            ytdlp_path: "yt-dlp".to_string(),
            cookies_file: PathBuf::from("cookies.txt"),
            max_estimated_bytes: 150 * MB,
            max_downloaded_bytes: 100 * MB,
            stale_after: Duration::from_secs(1800),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let fetch_defaults = FetchConfig::default();
        let gemini_defaults = GeminiConfig::default();
        let retry_defaults = RetryConfig::default();

        let fetch = FetchConfig {
            scratch_dir: var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(fetch_defaults.scratch_dir),
            ytdlp_path: var("YTDLP_PATH").unwrap_or(fetch_defaults.ytdlp_path),
            cookies_file: var("YTDLP_COOKIES_FILE")
                .map(PathBuf::from)
                .unwrap_or(fetch_defaults.cookies_file),
            max_estimated_bytes: parse_megabytes(&var, "MAX_ESTIMATED_SIZE_MB")?
                .unwrap_or(fetch_defaults.max_estimated_bytes),
            max_downloaded_bytes: parse_megabytes(&var, "MAX_DOWNLOADED_SIZE_MB")?
                .unwrap_or(fetch_defaults.max_downloaded_bytes),
            stale_after: parse_var(&var, "STALE_FILE_AGE_SECS", "number of seconds")?
                .map(Duration::from_secs)
                .unwrap_or(fetch_defaults.stale_after),
        };

        let gemini = GeminiConfig {
            api_key: var("GOOGLE_API_KEY").or_else(|| var("GEMINI_API_KEY")),
            model: var("GEMINI_MODEL").unwrap_or(gemini_defaults.model),
            api_base: var("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(gemini_defaults.api_base),
        };

        let max_attempts = parse_var(&var, "GENERATION_MAX_ATTEMPTS", "positive integer")?
            .unwrap_or(retry_defaults.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "GENERATION_MAX_ATTEMPTS",
                expected: "positive integer",
                value: "0".to_string(),
            });
        }

        let retry = RetryConfig {
            max_attempts,
            base_delay: parse_var(&var, "GENERATION_BASE_DELAY_MS", "number of milliseconds")?
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.base_delay),
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&var, "PORT", "port number")?.unwrap_or(8080),
            fetch,
            gemini,
            retry,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            name: "HOST",
            expected: "socket address",
            value: raw,
        })
    }
}

fn parse_var<T, F>(var: &F, name: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Invalid { name, expected, value }),
        },
        None => Ok(None),
    }
}

/// A size ceiling given in megabytes, converted to bytes.
fn parse_megabytes<F>(var: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const EXPECTED: &str = "number of megabytes";
    match parse_var::<u64, F>(var, name, EXPECTED)? {
        Some(mb) => mb.checked_mul(MB).map(Some).ok_or_else(|| ConfigError::Invalid {
            name,
            expected: EXPECTED,
            value: mb.to_string(),
        }),
        None => Ok(None),
    }
}
