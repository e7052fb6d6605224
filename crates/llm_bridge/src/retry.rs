//! Retry policy shared by the orchestrators

use crate::cancel::CancelToken;
use core_pipeline::{AnalysisError, AnalysisResult};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay doubles after every failure, capped at `max_delay`
    Exponential { max_delay: Duration },
}

/// How many times and how often a failed request is re-sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one (default: 2)
    pub max_retries: u32,
    /// Delay before the first retry (default: 2s)
    pub delay: Duration,
    pub backoff: Backoff,
    /// Stop retrying once this much wall-clock time would be exceeded
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(2),
            backoff: Backoff::Fixed,
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep before the retry that follows failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max_delay } => {
                let factor = 1u32 << attempt.saturating_sub(1).min(16);
                self.delay.saturating_mul(factor).min(max_delay)
            }
        }
    }

    /// Run `operation` until it succeeds, the retry budget is spent, or
    /// `cancel` fires. The closure receives the 1-based attempt number.
    pub async fn execute<F, Fut>(&self, cancel: &CancelToken, mut operation: F) -> AnalysisResult
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<String, AnalysisError>>,
    {
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
                outcome = operation(attempts) => outcome,
            };

            let error = match outcome {
                Ok(report) => return AnalysisResult::success(report),
                Err(error) => error,
            };

            warn!(attempt = attempts, kind = error.kind(), error = %error, "Analysis attempt failed");

            if !error.is_retryable() || attempts > self.max_retries {
                return AnalysisResult::failure(error, attempts);
            }

            let delay = self.delay_for(attempts);
            if let Some(budget) = self.max_elapsed {
                if started.elapsed() + delay >= budget {
                    return AnalysisResult::failure(error, attempts);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return AnalysisResult::failure(AnalysisError::Cancelled, attempts);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
