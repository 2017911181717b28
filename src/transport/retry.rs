use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::TransportError;
use crate::feedback::{report_event, JobEvent, JobEventSink};
use crate::{Error, Result};

/// Internal decision for how to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Fixed-delay retry policy.
///
/// The delay between attempts is constant: `backoff` after every failure,
/// with no growth and no jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first. Never below 1.
    pub max_attempts: u32,
    pub backoff: Duration,
    /// Treat 4xx responses as transient too.
    pub retry_client_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(3),
            retry_client_errors: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            ..Default::default()
        }
    }

    pub fn retry_client_errors(mut self, enable: bool) -> Self {
        self.retry_client_errors = enable;
        self
    }

    /// Decide what to do after `attempt` (1-based) failed with `err`.
    pub(crate) fn decide(&self, err: &TransportError, attempt: u32) -> Decision {
        if attempt >= self.max_attempts.max(1) {
            return Decision::Fail;
        }
        if !err.is_transient(self.retry_client_errors) {
            return Decision::Fail;
        }
        Decision::Retry {
            delay: self.backoff,
        }
    }
}

/// Drive `op` under `policy` until it succeeds or the policy gives up.
///
/// `op` receives the 1-based attempt number. On giving up, the last attempt's
/// error is returned inside [`Error::TransportExhausted`].
pub(crate) async fn run_with_retry<F, Fut>(
    policy: &RetryPolicy,
    events: &dyn JobEventSink,
    method: &str,
    url: &str,
    mut op: F,
) -> Result<Value>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<Value, TransportError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let err = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(method, url, attempt, "HTTP call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        match policy.decide(&err, attempt) {
            Decision::Retry { delay } => {
                debug!(
                    method,
                    url,
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "retry scheduled"
                );
                report_event(
                    events,
                    JobEvent::RetryScheduled {
                        method: method.to_string(),
                        url: url.to_string(),
                        attempt,
                        max_attempts: policy.max_attempts,
                        delay_ms: delay.as_millis() as u64,
                        error: err.to_string(),
                    },
                )
                .await;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Decision::Fail => {
                report_event(
                    events,
                    JobEvent::TransportGaveUp {
                        method: method.to_string(),
                        url: url.to_string(),
                        attempts: attempt,
                        error: err.to_string(),
                    },
                )
                .await;
                return Err(Error::TransportExhausted {
                    method: method.to_string(),
                    url: url.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }
}
