//! Bounded exponential backoff around one account fetch, plus the per-handle
//! consecutive-failure counter used to alert operators.
use std::{collections::HashMap, future::Future, time::Duration};

use tracing::{error, info, warn};

use crate::app::fetcher::FetchError;
use crate::domain::model::RetryConfig;
use crate::ports::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: cfg.base_delay,
        }
    }

    /// `base_delay * 2^attempt`, 0-indexed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

/// Calls `op` until it succeeds or the attempt budget is spent, sleeping
/// `delay_for(i)` after failed attempt `i`. Store connectivity errors are
/// returned immediately and never retried.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    handle: &str,
    mut op: F,
) -> Result<RetryOutcome<T>, StoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut last_error = String::new();
    for attempt in 0..policy.max_attempts {
        match op(attempt).await {
            Ok(value) => {
                return Ok(RetryOutcome::Succeeded {
                    value,
                    attempts: attempt + 1,
                })
            }
            Err(FetchError::Store(e)) if e.is_connection() => return Err(e),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    handle,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Fetch attempt failed"
                );
                last_error = e.to_string();
                tokio::time::sleep(delay).await;
            }
        }
    }
    Ok(RetryOutcome::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}

/// Consecutive run-level failures per handle. Lives as long as the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct FailureTracker {
    counts: HashMap<String, u32>,
    alert_threshold: u32,
}

impl FailureTracker {
    pub fn new(alert_threshold: u32) -> Self {
        Self {
            counts: HashMap::new(),
            alert_threshold,
        }
    }

    pub fn count(&self, handle: &str) -> u32 {
        self.counts.get(handle).copied().unwrap_or(0)
    }

    pub fn record_success(&mut self, handle: &str) {
        if let Some(prev) = self.counts.insert(handle.to_string(), 0).filter(|n| *n > 0) {
            info!(handle, previous_failures = prev, "Account recovered");
        }
    }

    /// Returns true when the new count is over the alert threshold.
    pub fn record_failure(&mut self, handle: &str) -> bool {
        let count = self.counts.entry(handle.to_string()).or_insert(0);
        *count += 1;
        let escalate = *count > self.alert_threshold;
        if escalate {
            error!(
                alert = true,
                handle,
                consecutive_failures = *count,
                threshold = self.alert_threshold,
                "ALERT: account keeps failing"
            );
        }
        escalate
    }
}
