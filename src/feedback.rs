//! Job lifecycle events and the sink trait the job client reports them to.
//!
//! The client never configures logging itself. It emits typed [`JobEvent`]s to
//! an injected [`JobEventSink`]; the application decides where they go (see
//! [`crate::telemetry`] for the stock sinks).

use crate::protocol::ApiFlavor;
use crate::types::{StatusSignal, TaskPhase};
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// A structured event from the submit/poll/retry machinery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Submitted {
        task_id: String,
        model: String,
        flavor: ApiFlavor,
    },
    /// The coarse status changed between two consecutive observations.
    StateTransition {
        task_id: String,
        from: Option<StatusSignal>,
        to: StatusSignal,
        phase: TaskPhase,
        observation: u32,
        elapsed_ms: u64,
    },
    /// A transport attempt failed and another one will follow after `delay_ms`.
    RetryScheduled {
        method: String,
        url: String,
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
        error: String,
    },
    TransportGaveUp {
        method: String,
        url: String,
        attempts: u32,
        error: String,
    },
    Completed {
        task_id: String,
        asset_url: String,
        observations: u32,
        elapsed_ms: u64,
    },
    Failed {
        task_id: String,
        error_code: Option<String>,
        error_message: Option<String>,
    },
    Inconsistent {
        task_id: String,
        details: String,
    },
    TimedOut {
        task_id: String,
        observations: u32,
        elapsed_ms: u64,
    },
    Cancelled {
        task_id: String,
        observations: u32,
        elapsed_ms: u64,
    },
}

impl JobEvent {
    /// Task the event concerns; transport events are not task-scoped.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            JobEvent::Submitted { task_id, .. }
            | JobEvent::StateTransition { task_id, .. }
            | JobEvent::Completed { task_id, .. }
            | JobEvent::Failed { task_id, .. }
            | JobEvent::Inconsistent { task_id, .. }
            | JobEvent::TimedOut { task_id, .. }
            | JobEvent::Cancelled { task_id, .. } => Some(task_id),
            JobEvent::RetryScheduled { .. } | JobEvent::TransportGaveUp { .. } => None,
        }
    }

    /// Short snake_case name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Submitted { .. } => "submitted",
            JobEvent::StateTransition { .. } => "state_transition",
            JobEvent::RetryScheduled { .. } => "retry_scheduled",
            JobEvent::TransportGaveUp { .. } => "transport_gave_up",
            JobEvent::Completed { .. } => "completed",
            JobEvent::Failed { .. } => "failed",
            JobEvent::Inconsistent { .. } => "inconsistent",
            JobEvent::TimedOut { .. } => "timed_out",
            JobEvent::Cancelled { .. } => "cancelled",
        }
    }
}

/// Destination for job events.
#[async_trait]
pub trait JobEventSink: Send + Sync {
    async fn report(&self, event: JobEvent) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Sink that drops everything. The default when none is injected.
pub struct NoopEventSink;

#[async_trait]
impl JobEventSink for NoopEventSink {
    async fn report(&self, _event: JobEvent) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn JobEventSink> {
    Arc::new(NoopEventSink)
}

/// Report `event`, logging a rejection instead of failing the caller.
pub(crate) async fn report_event(sink: &dyn JobEventSink, event: JobEvent) {
    let name = event.name();
    if let Err(e) = sink.report(event).await {
        debug!(event = name, error = %e, "event sink rejected event");
    }
}
