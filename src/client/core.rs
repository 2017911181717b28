use std::sync::Arc;

use tracing::{debug, info, warn};

use super::builder::JobClientBuilder;
use super::types::{CancelHandle, PollOptions};
use crate::drivers::FlavorDriver;
use crate::feedback::{report_event, JobEvent, JobEventSink};
use crate::protocol::ApiFlavor;
use crate::transport::Transport;
use crate::types::{GenerationRequest, TaskStatus, TaskSubmission};
use crate::{Error, Result};

/// Client for one generation job API.
///
/// Owns its transport session; poll counters live only inside each poll call.
/// Share it across tasks only if you accept interleaved events in the sink.
pub struct JobClient {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) driver: Box<dyn FlavorDriver>,
    pub(crate) events: Arc<dyn JobEventSink>,
    pub(crate) poll: PollOptions,
}

impl JobClient {
    pub fn builder() -> JobClientBuilder {
        JobClientBuilder::new()
    }

    pub fn flavor(&self) -> ApiFlavor {
        self.driver.flavor()
    }

    pub fn poll_options(&self) -> PollOptions {
        self.poll
    }

    /// Submit a generation request and return the accepted task.
    ///
    /// A refusal from the API (envelope code other than 200, or an answer
    /// without a task id) is [`Error::SubmissionRejected`] and is never retried.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<TaskSubmission> {
        let payload = self.driver.build_payload(request)?;
        info!(
            model = request.model(),
            aspect_ratio = request.aspect_ratio(),
            generation_type = %request.generation_type(),
            flavor = %self.flavor(),
            "submitting generation request"
        );

        let raw = self
            .transport
            .call(&self.driver.submit_endpoint(), Some(&payload))
            .await?;

        if !self.driver.is_api_success(&raw) {
            let rejection = self.driver.rejection(&raw);
            return Err(Error::SubmissionRejected {
                code: rejection.code,
                message: rejection.message,
            });
        }

        let submission = match self.driver.parse_submission(&raw) {
            Ok(submission) => submission,
            Err(Error::MalformedResponse { message, .. }) => {
                let rejection = self.driver.rejection(&raw);
                return Err(Error::SubmissionRejected {
                    code: rejection.code,
                    message: rejection.message.or(Some(message)),
                });
            }
            Err(e) => return Err(e),
        };

        self.emit(JobEvent::Submitted {
            task_id: submission.task_id.clone(),
            model: request.model().to_string(),
            flavor: self.flavor(),
        })
        .await;
        Ok(submission)
    }

    /// Fetch one status snapshot.
    pub async fn get_status(&self, task_id: &str) -> Result<TaskStatus> {
        debug!(task_id, "fetching task status");
        let raw = self
            .transport
            .call(&self.driver.status_endpoint(task_id), None)
            .await?;

        if !self.driver.is_api_success(&raw) {
            let rejection = self.driver.rejection(&raw);
            return Err(Error::StatusRejected {
                task_id: task_id.to_string(),
                code: rejection.code,
                message: rejection.message,
            });
        }

        let status = self.driver.parse_status(&raw)?;
        if status.task_id != task_id {
            warn!(
                requested = task_id,
                reported = status.task_id.as_str(),
                "status response names a different task"
            );
        }
        Ok(status)
    }

    /// Submit, then poll the new task to completion.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancelHandle,
    ) -> Result<TaskStatus> {
        let submission = self.submit(request).await?;
        self.poll_until_complete_with(&submission.task_id, &self.poll, cancel)
            .await
    }

    pub(crate) async fn emit(&self, event: JobEvent) {
        report_event(self.events.as_ref(), event).await;
    }
}
