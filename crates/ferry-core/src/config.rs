//! Configuration for the replication engine.

use std::time::Duration;

use ferry_types::DEFAULT_CONTENT_TYPE;
use serde::{Deserialize, Serialize};

/// Size of each read from the source stream.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes held in memory before the spooled buffer spills to disk.
pub const DEFAULT_SPOOL_THRESHOLD: usize = 5 * 1024 * 1024;

/// Total attempts per replication, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 2_000;

/// Ceiling on the exponential backoff delay.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Retry behaviour around a whole replication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the initial one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further failure.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay.
    pub max_backoff_ms: u64,
    /// Randomize each delay within [delay/2, delay].
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff_ms = delay.as_millis() as u64;
        self
    }

    pub fn max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff_ms = delay.as_millis() as u64;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff {
                initial_ms: self.initial_backoff_ms,
                max_ms: self.max_backoff_ms,
            });
        }
        Ok(())
    }
}

/// Settings for a [`Replicator`](crate::Replicator).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicatorConfig {
    /// Bytes read from the source per chunk.
    pub chunk_size: usize,

    /// In-memory limit of the spooled buffer before it spills to a temp file.
    pub spool_threshold: usize,

    /// Content type used when the source declares none.
    pub default_content_type: String,

    /// After upload, re-read destination metadata and require its digest to
    /// match the computed one. Never applied when the source digest is
    /// composite.
    pub verify_destination: bool,

    pub retry: RetryConfig,
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            verify_destination: true,
            retry: RetryConfig::default(),
        }
    }
}

impl ReplicatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn spool_threshold(mut self, threshold: usize) -> Self {
        self.spool_threshold = threshold;
        self
    }

    pub fn default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    pub fn verify_destination(mut self, verify: bool) -> Self {
        self.verify_destination = verify;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.default_content_type.trim().is_empty() {
            return Err(ConfigError::EmptyContentType);
        }
        self.retry.validate()
    }
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk size must be at least 1 byte")]
    InvalidChunkSize,

    #[error("max attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("initial backoff {initial_ms}ms exceeds max backoff {max_ms}ms")]
    InvalidBackoff { initial_ms: u64, max_ms: u64 },

    #[error("default content type must not be empty")]
    EmptyContentType,
}
