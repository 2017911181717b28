//! Enveloped flavor driver (KieAI VEO `record-info` API).
//!
//! - Every response is wrapped as `{ "code": 200, "msg": "...", "data": {...} }`;
//!   any other `code` is a conclusive refusal.
//! - Payload keys are camelCase: `imageUrls`, `aspectRatio`, `generationType`,
//!   `enableTranslation`, optional `callBackUrl`, `watermark`, `seeds`.
//! - Status: `data.successFlag` 0 = processing, 1 = success, 2/3 = failure.
//!   Results live under `data.response.resultUrls` / `originUrls`.

use serde::Serialize;
use serde_json::Value;

use super::{missing_field, non_empty_str, scalar_to_string, url_list, FlavorDriver, Rejection};
use crate::protocol::{ApiFlavor, EndpointConfig};
use crate::types::{
    GenerationRequest, GenerationType, StatusSignal, TaskPhase, TaskStatus, TaskSubmission,
};
use crate::{Error, ErrorContext, Result};

const SOURCE: &str = "enveloped_driver";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePayload<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    image_urls: &'a [String],
    model: &'a str,
    aspect_ratio: &'a str,
    generation_type: GenerationType,
    enable_translation: bool,
    #[serde(rename = "callBackUrl", skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watermark: Option<&'a str>,
    #[serde(rename = "seeds", skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Default)]
pub struct EnvelopedDriver;

impl EnvelopedDriver {
    pub fn new() -> Self {
        Self
    }

    fn data<'a>(raw: &'a Value, what: &str) -> Result<&'a Value> {
        match raw.get("data") {
            Some(data) if data.is_object() => Ok(data),
            _ => Err(missing_field(
                &format!("{} response has no data object", what),
                "data",
                SOURCE,
            )),
        }
    }

    fn phase_for_flag(flag: i64) -> TaskPhase {
        match flag {
            1 => TaskPhase::Succeeded,
            2 | 3 => TaskPhase::Failed,
            // 0 and undocumented flags keep the task in flight; the poll budget bounds them
            _ => TaskPhase::Processing,
        }
    }
}

impl FlavorDriver for EnvelopedDriver {
    fn flavor(&self) -> ApiFlavor {
        ApiFlavor::Enveloped
    }

    fn submit_endpoint(&self) -> EndpointConfig {
        EndpointConfig::post("/generate")
    }

    fn status_endpoint(&self, task_id: &str) -> EndpointConfig {
        EndpointConfig::get("/record-info").with_query("taskId", task_id)
    }

    fn build_payload(&self, request: &GenerationRequest) -> Result<Value> {
        let payload = GeneratePayload {
            prompt: request.prompt(),
            image_urls: request.image_urls(),
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

    fn is_api_success(&self, raw: &Value) -> bool {
        raw.get("code").and_then(Value::as_i64) == Some(200)
    }

    fn rejection(&self, raw: &Value) -> Rejection {
        Rejection {
            code: raw.get("code").and_then(Value::as_i64),
            message: non_empty_str(raw.get("msg")),
        }
    }

    fn parse_submission(&self, raw: &Value) -> Result<TaskSubmission> {
        let data = Self::data(raw, "submission")?;
        let task_id = data
            .get("taskId")
            .and_then(scalar_to_string)
            .ok_or_else(|| {
                missing_field("submission response missing taskId", "data.taskId", SOURCE)
            })?;
        Ok(TaskSubmission::new(task_id))
    }

    fn parse_status(&self, raw: &Value) -> Result<TaskStatus> {
        let data = Self::data(raw, "status")?;
        let task_id = data
            .get("taskId")
            .and_then(scalar_to_string)
            .ok_or_else(|| missing_field("status response missing taskId", "data.taskId", SOURCE))?;

        let flag = match data.get("successFlag") {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
                .ok_or_else(|| {
                    Error::malformed_with_context(
                        "successFlag is not an integer",
                        ErrorContext::new()
                            .with_field_path("data.successFlag")
                            .with_details(format!("got {}", v))
                            .with_source(SOURCE),
                    )
                })?,
        };

        let response = data.get("response");
        let result_urls = url_list(
            response.and_then(|r| r.get("resultUrls")),
            "data.response.resultUrls",
            SOURCE,
        )?;
        let origin_urls = url_list(
            response.and_then(|r| r.get("originUrls")),
            "data.response.originUrls",
            SOURCE,
        )?;

        Ok(TaskStatus {
            task_id,
            signal: StatusSignal::Flag(flag),
            phase: Self::phase_for_flag(flag),
            result_urls,
            origin_urls,
            error_code: data.get("errorCode").and_then(scalar_to_string),
            error_message: non_empty_str(data.get("errorMessage")),
        })
    }
}
