//! Flat flavor driver.
//!
//! Bare JSON objects with snake_case keys. The submission answers with a
//! top-level `task_id`; the status object carries `status` in
//! {queued, processing, completed, failed}, `asset_url` and `error`.

use serde::Serialize;
use serde_json::Value;

use super::{missing_field, non_empty_str, scalar_to_string, url_list, FlavorDriver, Rejection};
use crate::protocol::{ApiFlavor, EndpointConfig};
use crate::types::{
    GenerationRequest, GenerationType, StatusSignal, TaskPhase, TaskStatus, TaskSubmission,
};
use crate::Result;

const SOURCE: &str = "flat_driver";

#[derive(Serialize)]
struct GeneratePayload<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_image_url: Option<&'a str>,
    /// Only sent when more than one image is supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    image_urls: Option<&'a [String]>,
    model: &'a str,
    aspect_ratio: &'a str,
    generation_type: GenerationType,
    enable_translation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watermark: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Default)]
pub struct FlatDriver;

impl FlatDriver {
    pub fn new() -> Self {
        Self
    }

    fn phase_for_label(label: &str) -> TaskPhase {
        match label {
            "completed" | "succeeded" | "success" => TaskPhase::Succeeded,
            "failed" | "error" | "cancelled" => TaskPhase::Failed,
            "queued" | "pending" | "submitted" => TaskPhase::Queued,
            // "processing" and anything unrecognised stays in flight
            _ => TaskPhase::Processing,
        }
    }

    /// `error` is either a plain message or `{ "code": .., "message": .. }`.
    fn error_parts(raw: &Value) -> (Option<String>, Option<String>) {
        let top_code = raw.get("error_code").and_then(scalar_to_string);
        match raw.get("error") {
            Some(Value::Object(obj)) => (
                obj.get("code").and_then(scalar_to_string).or(top_code),
                non_empty_str(obj.get("message")),
            ),
            other => (top_code, non_empty_str(other)),
        }
    }
}

impl FlavorDriver for FlatDriver {
    fn flavor(&self) -> ApiFlavor {
        ApiFlavor::Flat
    }

    fn submit_endpoint(&self) -> EndpointConfig {
        EndpointConfig::post("/generate")
    }

    fn status_endpoint(&self, task_id: &str) -> EndpointConfig {
        EndpointConfig::get("/tasks").with_segment(task_id)
    }

    fn build_payload(&self, request: &GenerationRequest) -> Result<Value> {
        let images = request.image_urls();
        let payload = GeneratePayload {
            prompt: request.prompt(),
            reference_image_url: images.first().map(String::as_str),
            image_urls: (images.len() > 1).then_some(images),
            model: request.model(),
            aspect_ratio: request.aspect_ratio(),
            generation_type: request.generation_type(),
            enable_translation: request.enable_translation(),
            callback_url: request.callback_url(),
            watermark: request.watermark(),
            seed: request.seed(),
        };
        Ok(serde_json::to_value(payload)?)
    }

    fn is_api_success(&self, _raw: &Value) -> bool {
        true
    }

    fn rejection(&self, raw: &Value) -> Rejection {
        let (code, message) = Self::error_parts(raw);
        Rejection {
            code: code.and_then(|c| c.parse().ok()),
            message,
        }
    }

    fn parse_submission(&self, raw: &Value) -> Result<TaskSubmission> {
        let task_id = raw
            .get("task_id")
            .and_then(scalar_to_string)
            .ok_or_else(|| {
                missing_field("submission response missing task_id", "task_id", SOURCE)
            })?;
        Ok(TaskSubmission::new(task_id))
    }

    fn parse_status(&self, raw: &Value) -> Result<TaskStatus> {
        let task_id = raw
            .get("task_id")
            .and_then(scalar_to_string)
            .ok_or_else(|| missing_field("status response missing task_id", "task_id", SOURCE))?;
        let label = non_empty_str(raw.get("status"))
            .map(|s| s.to_ascii_lowercase())
            .ok_or_else(|| missing_field("status response missing status", "status", SOURCE))?;
        let (error_code, error_message) = Self::error_parts(raw);

        Ok(TaskStatus {
            task_id,
            phase: Self::phase_for_label(&label),
            signal: StatusSignal::Label(label),
            result_urls: url_list(raw.get("asset_url"), "asset_url", SOURCE)?,
            origin_urls: url_list(raw.get("origin_urls"), "origin_urls", SOURCE)?,
            error_code,
            error_message,
        })
    }
}
