//! API flavor drivers: payload building and response normalization.
//!
//! Each [`ApiFlavor`] has a concrete driver. The job client only talks to the
//! [`FlavorDriver`] trait object, so the polling state machine never sees a raw
//! response shape: everything arrives as a normalized [`TaskStatus`].

pub mod enveloped;
pub mod flat;

use serde_json::Value;

use crate::protocol::{ApiFlavor, EndpointConfig};
use crate::types::{GenerationRequest, TaskStatus, TaskSubmission};
use crate::{Error, ErrorContext, Result};

pub use enveloped::EnvelopedDriver;
pub use flat::FlatDriver;

/// Details the server attached to a refusal, when it attached any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejection {
    pub code: Option<i64>,
    pub message: Option<String>,
}

/// Wire-format strategy for one API flavor.
///
/// Implementations are stateless and pure: no I/O, no clocks.
pub trait FlavorDriver: Send + Sync + std::fmt::Debug {
    fn flavor(&self) -> ApiFlavor;

    /// Endpoint accepting new generation requests.
    fn submit_endpoint(&self) -> EndpointConfig;

    /// Endpoint returning the current status of `task_id`.
    fn status_endpoint(&self, task_id: &str) -> EndpointConfig;

    /// Map a request to the JSON body this flavor expects. Absent optional
    /// fields are omitted, never sent as `null`.
    fn build_payload(&self, request: &GenerationRequest) -> Result<Value>;

    /// Whether the response envelope reports success. Flavors without an
    /// envelope accept every decoded body.
    fn is_api_success(&self, raw: &Value) -> bool;

    /// Extract the refusal code/message from a response the server rejected.
    fn rejection(&self, raw: &Value) -> Rejection;

    fn parse_submission(&self, raw: &Value) -> Result<TaskSubmission>;

    fn parse_status(&self, raw: &Value) -> Result<TaskStatus>;
}

/// Factory for the driver matching a configured flavor.
pub fn create_driver(flavor: ApiFlavor) -> Box<dyn FlavorDriver> {
    match flavor {
        ApiFlavor::Enveloped => Box::new(EnvelopedDriver::new()),
        ApiFlavor::Flat => Box::new(FlatDriver::new()),
    }
}

/// Render a JSON scalar (string or number) as a trimmed, non-empty string.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-empty trimmed string, or `None`.
pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Collect a list of URLs. Missing or `null` means empty, a lone string is a
/// one-element list, blank entries are dropped.
pub(crate) fn url_list(value: Option<&Value>, field: &str, source: &str) -> Result<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v @ Value::String(_)) => Ok(non_empty_str(Some(v)).into_iter().collect()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|v| non_empty_str(Some(v)))
            .collect()),
        Some(other) => Err(Error::malformed_with_context(
            "expected a list of URLs",
            ErrorContext::new()
                .with_field_path(field)
                .with_details(format!("got {}", other))
                .with_source(source),
        )),
    }
}

pub(crate) fn missing_field(message: &str, field: &str, source: &str) -> Error {
    Error::malformed_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source(source),
    )
}
