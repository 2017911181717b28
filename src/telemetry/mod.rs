//! Stock [`JobEventSink`] implementations.
//!
//! | Sink | Use |
//! |------|-----|
//! | [`NoopEventSink`] | Default, discards events |
//! | [`InMemoryEventSink`] | Tests and inspection |
//! | [`TracingEventSink`] | Forwards events to `tracing` |
//! | [`CompositeEventSink`] | Fan-out to several sinks |

pub use crate::feedback::{noop_sink, JobEvent, JobEventSink, NoopEventSink};

use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// In-memory sink, bounded to the most recent `max_events`.
pub struct InMemoryEventSink {
    events: Arc<RwLock<Vec<JobEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events: max.max(1),
        }
    }

    pub fn events(&self) -> Vec<JobEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn events_for_task(&self, task_id: &str) -> Vec<JobEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.task_id() == Some(task_id))
            .cloned()
            .collect()
    }

    /// Events whose [`JobEvent::name`] equals `name`.
    pub fn named(&self, name: &str) -> Vec<JobEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.name() == name)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl JobEventSink for InMemoryEventSink {
    async fn report(&self, event: JobEvent) -> Result<()> {
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        events.push(event);
        if events.len() > self.max_events {
            events.remove(0);
        }
        Ok(())
    }
}

/// Forwards events to `tracing`. Terminal failures log at `warn`.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobEventSink for TracingEventSink {
    async fn report(&self, event: JobEvent) -> Result<()> {
        match &event {
            JobEvent::Submitted {
                task_id,
                model,
                flavor,
            } => info!(
                task_id = %task_id,
                model = %model,
                flavor = %flavor,
                "task submitted, video processing"
            ),
            JobEvent::StateTransition {
                task_id,
                from,
                to,
                phase,
                observation,
                elapsed_ms,
            } => info!(
                task_id = %task_id,
                from = %from.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                to = %to,
                phase = ?phase,
                observation,
                elapsed_ms,
                "task state changed"
            ),
            JobEvent::RetryScheduled {
                method,
                url,
                attempt,
                max_attempts,
                delay_ms,
                error,
            } => warn!(
                method = %method,
                url = %url,
                attempt,
                max_attempts,
                delay_ms,
                error = %error,
                "HTTP call failed; retrying"
            ),
            JobEvent::TransportGaveUp {
                method,
                url,
                attempts,
                error,
            } => warn!(
                method = %method,
                url = %url,
                attempts,
                error = %error,
                "HTTP call failed; giving up"
            ),
            JobEvent::Completed {
                task_id,
                asset_url,
                observations,
                elapsed_ms,
            } => info!(
                task_id = %task_id,
                asset_url = %asset_url,
                observations,
                elapsed_ms,
                "task completed"
            ),
            JobEvent::Failed {
                task_id,
                error_code,
                error_message,
            } => warn!(
                task_id = %task_id,
                error_code = error_code.as_deref().unwrap_or("-"),
                error_message = error_message.as_deref().unwrap_or("-"),
                "task failed"
            ),
            JobEvent::Inconsistent { task_id, details } => warn!(
                task_id = %task_id,
                details = %details,
                "task reported an inconsistent terminal state"
            ),
            JobEvent::TimedOut {
                task_id,
                observations,
                elapsed_ms,
            } => warn!(task_id = %task_id, observations, elapsed_ms, "polling timed out"),
            JobEvent::Cancelled {
                task_id,
                observations,
                elapsed_ms,
            } => warn!(task_id = %task_id, observations, elapsed_ms, "polling cancelled"),
        }
        Ok(())
    }
}

/// Composite sink for multiple destinations. Individual sink failures are ignored.
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn JobEventSink>>,
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(mut self, sink: Arc<dyn JobEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobEventSink for CompositeEventSink {
    async fn report(&self, event: JobEvent) -> Result<()> {
        for s in &self.sinks {
            let _ = s.report(event.clone()).await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for s in &self.sinks {
            let _ = s.close().await;
        }
        Ok(())
    }
}
