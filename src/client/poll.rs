//! Poll-until-terminal state machine.
//!
//! Each observation is classified on its own; consecutive snapshots are only
//! compared to decide whether a state transition is worth reporting.

use tokio::time::Instant;
use tracing::{debug, info};

use super::core::JobClient;
use super::types::{CancelHandle, PollOptions, PollReport};
use crate::feedback::JobEvent;
use crate::types::{StatusSignal, TaskPhase, TaskStatus};
use crate::{Error, Result};

/// What a single status snapshot means for the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Not terminal yet; keep polling.
    Pending,
    /// Success with an asset to fetch.
    Succeeded,
    /// Explicit failure reported by the remote job.
    Failed,
    /// Success signalled without the data needed to act on it.
    Inconsistent(String),
}

/// Classify one snapshot.
///
/// A success signal wins over a simultaneous error code only when a result URL
/// is present; without one the snapshot is inconsistent.
pub fn classify(status: &TaskStatus) -> Observation {
    match status.phase {
        TaskPhase::Succeeded if status.is_terminal_success() => Observation::Succeeded,
        TaskPhase::Succeeded => {
            let mut details = format!("{} without any result URL", status.signal);
            if let Some(code) = &status.error_code {
                details.push_str(&format!(" (error code {})", code));
            }
            Observation::Inconsistent(details)
        }
        TaskPhase::Failed => Observation::Failed,
        TaskPhase::Queued | TaskPhase::Processing => Observation::Pending,
    }
}

/// Per-call counters. Lives only for one `poll_until_complete` invocation.
#[derive(Debug)]
struct PollState {
    started: Instant,
    last_signal: Option<StatusSignal>,
    observations: u32,
    transitions: u32,
}

impl PollState {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            last_signal: None,
            observations: 0,
            transitions: 0,
        }
    }

    /// Record an observation; returns the previous signal when it changed.
    fn observe(&mut self, signal: &StatusSignal) -> Option<Option<StatusSignal>> {
        self.observations = self.observations.saturating_add(1);
        if self.last_signal.as_ref() == Some(signal) {
            return None;
        }
        self.transitions = self.transitions.saturating_add(1);
        Some(self.last_signal.replace(signal.clone()))
    }

    fn report(&self) -> PollReport {
        PollReport {
            observations: self.observations,
            transitions: self.transitions,
            elapsed: self.started.elapsed(),
        }
    }
}

impl JobClient {
    /// Poll `task_id` with the client's default options and no cancellation.
    pub async fn poll_until_complete(&self, task_id: &str) -> Result<TaskStatus> {
        let options = self.poll_options();
        self.poll_until_complete_with(task_id, &options, &CancelHandle::new())
            .await
    }

    pub async fn poll_until_complete_with(
        &self,
        task_id: &str,
        options: &PollOptions,
        cancel: &CancelHandle,
    ) -> Result<TaskStatus> {
        self.poll_until_complete_with_report(task_id, options, cancel)
            .await
            .map(|(status, _)| status)
    }

    /// Observe `task_id` until it reaches a terminal state, the budget runs
    /// out, or `cancel` fires.
    ///
    /// Status calls are strictly sequential. Cancellation interrupts both the
    /// pause between polls and an in-flight status call.
    pub async fn poll_until_complete_with_report(
        &self,
        task_id: &str,
        options: &PollOptions,
        cancel: &CancelHandle,
    ) -> Result<(TaskStatus, PollReport)> {
        info!(
            task_id,
            interval_secs = options.interval.as_secs_f64(),
            timeout_secs = options.timeout.as_secs_f64(),
            "polling task"
        );
        let mut state = PollState::start();

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancel_poll(task_id, &state).await);
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancel_poll(task_id, &state).await),
                res = self.get_status(task_id) => res?,
            };

            if let Some(from) = state.observe(&status.signal) {
                self.emit(JobEvent::StateTransition {
                    task_id: task_id.to_string(),
                    from,
                    to: status.signal.clone(),
                    phase: status.phase,
                    observation: state.observations,
                    elapsed_ms: state.started.elapsed().as_millis() as u64,
                })
                .await;
            }

            match classify(&status) {
                Observation::Succeeded => {
                    let report = state.report();
                    self.emit(JobEvent::Completed {
                        task_id: task_id.to_string(),
                        asset_url: status.asset_url().unwrap_or_default().to_string(),
                        observations: report.observations,
                        elapsed_ms: report.elapsed.as_millis() as u64,
                    })
                    .await;
                    return Ok((status, report));
                }
                Observation::Failed => {
                    self.emit(JobEvent::Failed {
                        task_id: task_id.to_string(),
                        error_code: status.error_code.clone(),
                        error_message: status.error_message.clone(),
                    })
                    .await;
                    return Err(Error::JobFailed {
                        task_id: task_id.to_string(),
                        error_code: status.error_code,
                        error_message: status.error_message,
                    });
                }
                Observation::Inconsistent(details) => {
                    self.emit(JobEvent::Inconsistent {
                        task_id: task_id.to_string(),
                        details: details.clone(),
                    })
                    .await;
                    return Err(Error::InconsistentTerminalState {
                        task_id: task_id.to_string(),
                        details,
                    });
                }
                Observation::Pending => {}
            }

            let elapsed = state.started.elapsed();
            if elapsed > options.timeout {
                self.emit(JobEvent::TimedOut {
                    task_id: task_id.to_string(),
                    observations: state.observations,
                    elapsed_ms: elapsed.as_millis() as u64,
                })
                .await;
                return Err(Error::PollTimeout {
                    task_id: task_id.to_string(),
                    elapsed,
                    observations: state.observations,
                });
            }

            debug!(
                task_id,
                signal = %status.signal,
                sleep_secs = options.interval.as_secs_f64(),
                "task still processing"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancel_poll(task_id, &state).await),
                _ = tokio::time::sleep(options.interval) => {}
            }
        }
    }

    async fn cancel_poll(&self, task_id: &str, state: &PollState) -> Error {
        let report = state.report();
        self.emit(JobEvent::Cancelled {
            task_id: task_id.to_string(),
            observations: report.observations,
            elapsed_ms: report.elapsed.as_millis() as u64,
        })
        .await;
        Error::PollCancelled {
            task_id: task_id.to_string(),
            elapsed: report.elapsed,
            observations: report.observations,
        }
    }
}
