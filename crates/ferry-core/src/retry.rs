//! Retry policy with exponential backoff.
//!
//! The policy knows nothing about stores; callers pass a classifier that
//! sorts each error into [`ErrorClass::Transient`] or [`ErrorClass::Semantic`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::cancel::CancelSignal;
use crate::config::RetryConfig;
use crate::error::ReplicationError;

/// Whether an error is worth another attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Infrastructure trouble that may clear on its own.
    Transient,
    /// A definitive answer; retrying cannot change it.
    Semantic,
}

/// Classification table for replication errors.
pub fn classify(err: &ReplicationError) -> ErrorClass {
    match err {
        ReplicationError::TransientInfra { .. } => ErrorClass::Transient,
        ReplicationError::UploadFailed { source, .. } if source.is_transient() => {
            ErrorClass::Transient
        }
        ReplicationError::UploadFailed { .. }
        | ReplicationError::SourceNotFound { .. }
        | ReplicationError::StoreFailure { .. }
        | ReplicationError::IntegrityMismatch { .. }
        | ReplicationError::Configuration(_)
        | ReplicationError::RetriesExhausted { .. }
        | ReplicationError::Cancelled
        | ReplicationError::Spool(_) => ErrorClass::Semantic,
    }
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed transiently.
    Exhausted { attempts: u32, last: E },
    /// An attempt failed with a semantic error.
    Permanent { attempts: u32, error: E },
    /// Cancellation fired during an attempt or a backoff wait.
    Cancelled { attempts: u32 },
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Delay after the given failed attempt (1-based), before jitter.
    ///
    /// `initial * 2^(attempt-1)`, capped at the configured maximum.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let ms = self
            .config
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.max_backoff_ms);
        Duration::from_millis(ms)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff_for(attempt);
        if !self.config.jitter || base.is_zero() {
            return base;
        }
        let ms = base.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(ms / 2..=ms))
    }

    /// Run `op` until it succeeds, fails semantically, exhausts the attempt
    /// budget, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number. An in-flight attempt is
    /// dropped when cancellation fires.
    pub async fn run<T, E, F, Fut, C>(
        &self,
        mut op: F,
        classify: C,
        cancel: &CancelSignal,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(attempt, max_attempts, "starting attempt");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                result = op(attempt) => result,
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if classify(&error) == ErrorClass::Semantic {
                return Err(RetryError::Permanent { attempts: attempt, error });
            }
            if attempt >= max_attempts {
                return Err(RetryError::Exhausted { attempts: attempt, last: error });
            }

            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                max_attempts,
                backoff_ms = delay.as_millis() as u64,
                error = %error,
                "transient failure, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config)
    }
}
