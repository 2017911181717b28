use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Polling cadence and overall budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Pause between two status observations.
    pub interval: Duration,
    /// Budget measured from the first observation. Exceeding it while the task
    /// is still in flight ends polling with [`crate::Error::PollTimeout`].
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            timeout: Duration::from_secs(600),
        }
    }
}

impl PollOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Bookkeeping of a finished poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub observations: u32,
    /// Distinct consecutive status signals seen (including the first).
    pub transitions: u32,
    pub elapsed: Duration,
}

/// External cancellation for a poll loop: explicit [`CancelHandle::cancel`],
/// an optional deadline, or both.
///
/// Clones share the same underlying token.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Deadline `after` from now.
    pub fn with_timeout(after: Duration) -> Self {
        Self::with_deadline(Instant::now() + after)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once cancelled or once the deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_cancellation() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
        clone.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels() {
        let handle = CancelHandle::with_timeout(Duration::from_secs(5));
        assert!(!handle.is_cancelled());
        handle.cancelled().await;
        assert!(handle.is_cancelled());
        assert!(handle.deadline().is_some());
    }

    #[test]
    fn default_poll_options() {
        let opts = PollOptions::default();
        assert_eq!(opts.interval, Duration::from_secs(20));
        assert_eq!(opts.timeout, Duration::from_secs(600));
    }
}
