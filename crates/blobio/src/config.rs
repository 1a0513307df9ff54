//! Configuration module

use crate::client::{ClientOptions, DEFAULT_MAX_RETRIES};
use crate::concurrency::{ConcurrencyPolicy, DEFAULT_MAX_WORKERS, DEFAULT_MIN_BYTES_PER_WORKER};
use crate::reader::DEFAULT_BUFFER_SIZE;
use crate::{BlobError, Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer tuning
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Client construction settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// Ranged read and buffering settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Minimum bytes each download worker should handle
    #[serde(deserialize_with = "deserialize_size")]
    pub min_bytes_per_worker: u64,
    /// Maximum number of download workers per ranged read
    pub max_workers: u16,
    /// Reader buffer size in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub buffer_size: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            min_bytes_per_worker: DEFAULT_MIN_BYTES_PER_WORKER,
            max_workers: DEFAULT_MAX_WORKERS,
            buffer_size: DEFAULT_BUFFER_SIZE as u64,
        }
    }
}

/// Client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Retries per request
    pub max_retries: usize,
    /// Upper bound on retrying one request, in seconds
    pub retry_timeout_secs: u64,
    /// Size of each uploaded part
    #[serde(deserialize_with = "deserialize_size")]
    pub upload_chunk_size: u64,
    /// Parts uploaded concurrently
    pub upload_concurrency: usize,
    /// Deadline for a whole command, in seconds
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let options = ClientOptions::default();
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_timeout_secs: options.retry_timeout.as_secs(),
            upload_chunk_size: options.upload_chunk_size as u64,
            upload_concurrency: options.upload_concurrency,
            timeout_secs: None,
        }
    }
}

/// Size given either as a byte count or a string like "16MiB"
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Bytes(u64),
    Text(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Bytes(bytes) => Ok(bytes),
        SizeValue::Text(text) => parse_size(&text)
            .map_err(|e| D::Error::custom(format!("Failed to parse size: {}", e))),
    }
}

/// Parse size string like "100MiB" to bytes
pub fn parse_size(size_str: &str) -> Result<u64> {
    let size_str = size_str.trim();

    if let Ok(bytes) = size_str.parse::<u64>() {
        return Ok(bytes);
    }

    let split_pos = size_str
        .chars()
        .position(|c| !c.is_ascii_digit() && c != '.')
        .unwrap_or(size_str.len());

    if split_pos == 0 {
        return Err(BlobError::Config(format!("Invalid size format: {}", size_str)));
    }

    let (number_part, unit_part) = size_str.split_at(split_pos);
    let number: f64 = number_part
        .parse()
        .map_err(|_| BlobError::Config(format!("Invalid number in size: {}", number_part)))?;

    let multiplier: u64 = match unit_part.trim().to_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "t" | "tb" => 1_000_000_000_000,
        "ki" | "kib" => 1_024,
        "mi" | "mib" => 1_048_576,
        "gi" | "gib" => 1_073_741_824,
        "ti" | "tib" => 1_099_511_627_776,
        _ => return Err(BlobError::Config(format!("Unknown size unit: {}", unit_part))),
    };

    Ok((number * multiplier as f64) as u64)
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| BlobError::Config("Unable to determine config directory".to_string()))?;
        Ok(config_dir.join("blobio").join("config.toml"))
    }

    /// Get default configuration content with comments
    pub fn default_config_content() -> String {
        r#"# blobio configuration file

[transfer]
# Minimum bytes each download worker handles; smaller reads use fewer workers
min_bytes_per_worker = "16MiB"
# Maximum number of parallel download workers per ranged read
max_workers = 64
# Read buffer size used by `cat` and `get`
buffer_size = "8MiB"

[client]
# Retries per request before giving up
max_retries = 50
# Upper bound on the time spent retrying one request, in seconds
retry_timeout_secs = 180
# Uploads larger than this are split into parts of this size
upload_chunk_size = "8MiB"
# Parts uploaded concurrently
upload_concurrency = 4
# Deadline for a whole command, in seconds
# timeout_secs = 600
"#
        .to_string()
    }

    /// Load configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| BlobError::Config(format!("Failed to parse config: {}", e)))?;
        config.concurrency_policy()?;
        Ok(config)
    }

    /// Write the documented default configuration to `path` unless a file
    /// already exists there, creating parent directories.
    ///
    /// Returns whether the file was written.
    pub fn init(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, Self::default_config_content())?;
        Ok(true)
    }

    /// Ranged-read fan-out policy
    pub fn concurrency_policy(&self) -> Result<ConcurrencyPolicy> {
        ConcurrencyPolicy::new(self.transfer.min_bytes_per_worker, self.transfer.max_workers)
    }

    /// Reader buffer size
    pub fn buffer_size(&self) -> usize {
        usize::try_from(self.transfer.buffer_size).unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    /// Options for clients constructed by a cache
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            max_retries: self.client.max_retries,
            retry_timeout: Duration::from_secs(self.client.retry_timeout_secs),
            upload_chunk_size: usize::try_from(self.client.upload_chunk_size)
                .unwrap_or(usize::MAX)
                .max(1),
            upload_concurrency: self.client.upload_concurrency.max(1),
            ..ClientOptions::default()
        }
    }

    /// Context applying the transfer policy and timeout of this configuration
    pub fn context(&self) -> Result<Context> {
        let mut ctx = Context::background().with_concurrency(self.concurrency_policy()?);
        if let Some(secs) = self.client.timeout_secs {
            ctx = ctx.with_timeout(Duration::from_secs(secs));
        }
        Ok(ctx)
    }
}
