use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for configuration, validation and parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "KIEAI_API_KEY", "data.taskId")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "enveloped_driver")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the job runtime.
///
/// Only transport-level failures are ever retried, and only inside the
/// transport. Every other variant is final for the operation that raised it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("{method} {url} failed after {attempts} attempt(s): {source}")]
    TransportExhausted {
        method: String,
        url: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Submission rejected (code={}): {}", display_opt(.code), display_opt(.message))]
    SubmissionRejected {
        code: Option<i64>,
        message: Option<String>,
    },

    #[error(
        "Status query for task {task_id} rejected (code={}): {}",
        display_opt(.code),
        display_opt(.message)
    )]
    StatusRejected {
        task_id: String,
        code: Option<i64>,
        message: Option<String>,
    },

    #[error("Malformed response: {message}{}", format_context(.context))]
    MalformedResponse {
        message: String,
        context: ErrorContext,
    },

    #[error(
        "Task {task_id} failed (code={}): {}",
        display_opt(.error_code),
        display_opt(.error_message)
    )]
    JobFailed {
        task_id: String,
        error_code: Option<String>,
        error_message: Option<String>,
    },

    #[error("Task {task_id} reported an inconsistent terminal state: {details}")]
    InconsistentTerminalState { task_id: String, details: String },

    #[error(
        "Polling timed out for task {task_id} after {:.1}s ({observations} observation(s))",
        .elapsed.as_secs_f64()
    )]
    PollTimeout {
        task_id: String,
        elapsed: Duration,
        observations: u32,
    },

    #[error(
        "Polling cancelled for task {task_id} after {:.1}s ({observations} observation(s))",
        .elapsed.as_secs_f64()
    )]
    PollCancelled {
        task_id: String,
        elapsed: Duration,
        observations: u32,
    },

    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new malformed-response error with structured context
    pub fn malformed_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::MalformedResponse {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::MalformedResponse { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Stable snake_case label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration { .. } => "configuration",
            Error::Validation { .. } => "validation",
            Error::TransportExhausted { .. } => "transport_exhausted",
            Error::SubmissionRejected { .. } => "submission_rejected",
            Error::StatusRejected { .. } => "status_rejected",
            Error::MalformedResponse { .. } => "malformed_response",
            Error::JobFailed { .. } => "job_failed",
            Error::InconsistentTerminalState { .. } => "inconsistent_terminal_state",
            Error::PollTimeout { .. } => "poll_timeout",
            Error::PollCancelled { .. } => "poll_cancelled",
            Error::Download { .. } => "download",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }

    /// Process exit code for this error. Never zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Io(_) => 1,
            Error::Configuration { .. } | Error::Validation { .. } => 2,
            Error::TransportExhausted { .. } | Error::Download { .. } => 3,
            Error::SubmissionRejected { .. } | Error::StatusRejected { .. } => 4,
            Error::MalformedResponse { .. } | Error::Serialization(_) => 5,
            Error::JobFailed { .. } => 6,
            Error::InconsistentTerminalState { .. } => 7,
            Error::PollTimeout { .. } => 8,
            Error::PollCancelled { .. } => 130,
        }
    }

    /// Task id the error refers to, when it concerns a specific remote task.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Error::StatusRejected { task_id, .. }
            | Error::JobFailed { task_id, .. }
            | Error::InconsistentTerminalState { task_id, .. }
            | Error::PollTimeout { task_id, .. }
            | Error::PollCancelled { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}
