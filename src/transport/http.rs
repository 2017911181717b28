use crate::feedback::{noop_sink, JobEventSink};
use crate::protocol::{EndpointConfig, Method};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::retry::{run_with_retry, RetryPolicy};
use super::{Transport, TransportError};

/// Longest response excerpt kept in error messages.
const BODY_EXCERPT_LIMIT: usize = 512;

/// Everything needed to open a transport session.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub base_url: String,
    pub api_key: String,
    /// Timeout for each individual HTTP call, independent of any poll budget.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl TransportOptions {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// reqwest-backed transport. One connection pool per instance, reused across
/// sequential calls.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    policy: RetryPolicy,
    events: Arc<dyn JobEventSink>,
}

impl HttpTransport {
    pub fn new(options: &TransportOptions) -> Result<Self> {
        Self::with_events(options, noop_sink())
    }

    pub fn with_events(options: &TransportOptions, events: Arc<dyn JobEventSink>) -> Result<Self> {
        let api_key = options.api_key.trim();
        if api_key.is_empty() {
            return Err(Error::configuration_with_context(
                "API key must not be empty",
                ErrorContext::new()
                    .with_field_path("KIEAI_API_KEY")
                    .with_source("http_transport"),
            ));
        }

        let base_url = Url::parse(options.base_url.trim()).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("KIEAI_BASE_URL")
                    .with_details(options.base_url.clone())
                    .with_source("http_transport"),
            )
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::configuration_with_context(
                "base URL cannot carry a path",
                ErrorContext::new()
                    .with_field_path("KIEAI_BASE_URL")
                    .with_details(options.base_url.clone())
                    .with_source("http_transport"),
            ));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            Error::configuration_with_context(
                "API key contains characters not allowed in an HTTP header",
                ErrorContext::new()
                    .with_field_path("KIEAI_API_KEY")
                    .with_source("http_transport"),
            )
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.call_timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("failed to create HTTP client: {}", e),
                    ErrorContext::new().with_source("http_transport"),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            policy: options.retry.clone(),
            events,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolve an endpoint against the base URL, percent-encoding segments.
    pub fn endpoint_url(&self, endpoint: &EndpointConfig) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(endpoint.segments.iter());
        }
        if !endpoint.query.is_empty() {
            url.query_pairs_mut().extend_pairs(endpoint.query.iter());
        }
        url
    }

    async fn send_once(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
        attempt: u32,
    ) -> std::result::Result<Value, TransportError> {
        let request_id = Uuid::new_v4().to_string();
        let mut req = match method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };
        if let Some(body) = body {
            req = req.json(body);
        }

        debug!(
            method = method.as_str(),
            url = %url,
            attempt,
            request_id = %request_id,
            "sending HTTP request"
        );
        let resp = req.header("x-request-id", &request_id).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: excerpt(&text),
            });
        }

        serde_json::from_str::<Value>(&text)
            .map_err(|e| TransportError::Decode(format!("{} (body: {})", e, excerpt(&text))))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, endpoint: &EndpointConfig, body: Option<&Value>) -> Result<Value> {
        let url = self.endpoint_url(endpoint);
        let url_ref = &url;
        let method = endpoint.method;
        run_with_retry(
            &self.policy,
            self.events.as_ref(),
            method.as_str(),
            url.as_str(),
            move |attempt| self.send_once(method, url_ref, body, attempt),
        )
        .await
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= BODY_EXCERPT_LIMIT {
        return trimmed.to_string();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}
