use crate::cloud_storage::S3Config;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Missing required setting: {0}")]
    Missing(String),
}

/// What to do when a batch would push the session past one of its caps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Admit what fits, report the rest as rejected
    RejectOverflow,
    /// Reject every item of the batch if any item would overflow a cap
    RejectBatch,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject_overflow" => Ok(OverflowPolicy::RejectOverflow),
            "reject_batch" => Ok(OverflowPolicy::RejectBatch),
            other => Err(ConfigError::InvalidValue {
                key: "PICKPERFECT_OVERFLOW_POLICY".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Per-session admission caps, shared across every photo source
#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_photos: usize,
    pub max_file_bytes: u64,
    pub max_session_bytes: u64,
    pub overflow_policy: OverflowPolicy,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_photos: 100,
            max_file_bytes: 50 * 1024 * 1024,
            max_session_bytes: 500 * 1024 * 1024,
            overflow_policy: OverflowPolicy::RejectOverflow,
        }
    }
}

/// Status polling parameters for the analysis job
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    /// `not_found` waits `interval * not_found_backoff_factor`
    pub not_found_backoff_factor: u32,
    /// Pause between submission and the first status query
    pub submit_settle: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
            not_found_backoff_factor: 2,
            submit_settle: Duration::from_secs(1),
        }
    }
}

impl PollingConfig {
    pub fn not_found_backoff(&self) -> Duration {
        self.interval * self.not_found_backoff_factor.max(1)
    }
}

/// Application configuration
/// In debug builds: loads from .env file first, then the process environment
#[derive(Clone, Debug)]
pub struct Config {
    pub limits: SessionLimits,
    pub polling: PollingConfig,
    /// Concurrent object uploads while committing a session
    pub upload_concurrency: usize,
    /// Concurrent object downloads while building an export archive
    pub download_concurrency: usize,
    /// Base URL of the analysis service, e.g. `http://localhost:5000/api`
    pub api_url: String,
    pub s3: Option<S3Config>,
    /// Prefix for public object URLs; defaults to the S3 endpoint
    pub public_url_base: Option<String>,
    pub drive_access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: SessionLimits::default(),
            polling: PollingConfig::default(),
            upload_concurrency: 4,
            download_concurrency: 8,
            api_url: "http://localhost:5000/api".to_string(),
            s3: None,
            public_url_base: None,
            drive_access_token: None,
        }
    }
}

impl Config {
    /// Load configuration based on build mode
    pub fn load() -> Result<Self, ConfigError> {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                tracing::info!("Dev mode activated - loaded .env file");
            } else {
                tracing::debug!("No .env file found, using process environment");
            }
        }

        Self::from_env()
    }

    /// Load configuration from `PICKPERFECT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let limits = SessionLimits {
            max_photos: env_parse("MAX_PHOTOS")?.unwrap_or(defaults.limits.max_photos),
            max_file_bytes: env_parse("MAX_FILE_BYTES")?.unwrap_or(defaults.limits.max_file_bytes),
            max_session_bytes: env_parse("MAX_SESSION_BYTES")?
                .unwrap_or(defaults.limits.max_session_bytes),
            overflow_policy: env_parse("OVERFLOW_POLICY")?
                .unwrap_or(defaults.limits.overflow_policy),
        };

        let polling = PollingConfig {
            interval: env_parse::<u64>("POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.polling.interval),
            max_attempts: env_parse("MAX_POLL_ATTEMPTS")?
                .unwrap_or(defaults.polling.max_attempts),
            not_found_backoff_factor: env_parse("NOT_FOUND_BACKOFF_FACTOR")?
                .unwrap_or(defaults.polling.not_found_backoff_factor),
            submit_settle: env_parse::<u64>("SUBMIT_SETTLE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.polling.submit_settle),
        };

        let s3 = match env_var("S3_ACCESS_KEY_ID") {
            Some(access_key_id) => Some(S3Config {
                bucket_name: env_var("S3_BUCKET")
                    .unwrap_or_else(|| "pickperfect-photos".to_string()),
                region: env_var("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id,
                secret_access_key: env_var("S3_SECRET_ACCESS_KEY")
                    .ok_or_else(|| ConfigError::Missing("PICKPERFECT_S3_SECRET_ACCESS_KEY".into()))?,
                endpoint_url: env_var("S3_ENDPOINT_URL"),
            }),
            None => None,
        };

        if s3.is_none() {
            tracing::warn!("No S3 credentials configured, durable storage is unavailable");
        }

        Ok(Self {
            limits,
            polling,
            upload_concurrency: env_parse("UPLOAD_CONCURRENCY")?
                .unwrap_or(defaults.upload_concurrency),
            download_concurrency: env_parse("DOWNLOAD_CONCURRENCY")?
                .unwrap_or(defaults.download_concurrency),
            api_url: env_var("API_URL").unwrap_or(defaults.api_url),
            s3,
            public_url_base: env_var("PUBLIC_URL_BASE"),
            drive_access_token: env_var("DRIVE_ACCESS_TOKEN"),
        })
    }

    /// Default directory for exported archives
    pub fn default_export_dir(&self) -> PathBuf {
        dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("PICKPERFECT_{}", key))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("PICKPERFECT_{}", key),
                value,
            }),
        None => Ok(None),
    }
}
