//! Inbound task snapshots, normalized across API flavors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Response returned when a task is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub task_id: String,
}

impl TaskSubmission {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

/// Normalized lifecycle phase of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Succeeded | TaskPhase::Failed)
    }
}

/// The coarse status signal exactly as the remote API reported it.
///
/// Kept alongside the normalized [`TaskPhase`] so transitions can be logged
/// in the API's own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StatusSignal {
    /// `data.successFlag` of the enveloped flavor.
    Flag(i64),
    /// `status` of the flat flavor.
    Label(String),
}

impl fmt::Display for StatusSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusSignal::Flag(v) => write!(f, "successFlag={}", v),
            StatusSignal::Label(s) => write!(f, "status={}", s),
        }
    }
}

/// Snapshot of a task at the moment it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub signal: StatusSignal,
    pub phase: TaskPhase,
    #[serde(default)]
    pub result_urls: Vec<String>,
    #[serde(default)]
    pub origin_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TaskStatus {
    /// Success signalled and an asset is available to fetch.
    pub fn is_terminal_success(&self) -> bool {
        self.phase == TaskPhase::Succeeded && !self.result_urls.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.phase == TaskPhase::Failed
    }

    /// First result URL, if any.
    pub fn asset_url(&self) -> Option<&str> {
        self.result_urls.first().map(String::as_str)
    }
}
