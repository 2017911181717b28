use crate::client::core::JobClient;
use crate::client::types::PollOptions;
use crate::config::AppConfig;
use crate::drivers::create_driver;
use crate::feedback::{noop_sink, JobEventSink};
use crate::protocol::ApiFlavor;
use crate::transport::{HttpTransport, RetryPolicy, Transport, TransportOptions};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`JobClient`].
pub struct JobClientBuilder {
    flavor: ApiFlavor,
    api_key: Option<String>,
    base_url_override: Option<String>,
    call_timeout: Duration,
    retry: RetryPolicy,
    poll: PollOptions,
    events: Arc<dyn JobEventSink>,
    transport: Option<Arc<dyn Transport>>,
}

impl JobClientBuilder {
    pub fn new() -> Self {
        Self {
            flavor: ApiFlavor::default(),
            api_key: None,
            base_url_override: None,
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            poll: PollOptions::default(),
            events: noop_sink(),
            transport: None,
        }
    }

    /// Seed every knob from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new()
            .flavor(config.flavor)
            .api_key(config.api_key.clone())
            .base_url_override(config.base_url())
            .call_timeout(config.http_timeout)
            .retry_policy(
                RetryPolicy::new(config.max_retries, config.retry_backoff)
                    .retry_client_errors(config.retry_client_errors),
            )
            .poll_options(PollOptions::new(config.poll_interval, config.timeout))
    }

    pub fn flavor(mut self, flavor: ApiFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the flavor's default base URL (also how tests point at a mock server).
    pub fn base_url_override(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn poll_options(mut self, options: PollOptions) -> Self {
        self.poll = options;
        self
    }

    /// Inject an event sink. Default is a no-op sink.
    pub fn event_sink(mut self, sink: Arc<dyn JobEventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Use a custom transport instead of the HTTP one. API key and base URL
    /// are then ignored.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<JobClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let api_key = self.api_key.ok_or_else(|| {
                    Error::configuration_with_context(
                        "API key required",
                        ErrorContext::new()
                            .with_field_path("KIEAI_API_KEY")
                            .with_source("client_builder"),
                    )
                })?;
                let base_url = self
                    .base_url_override
                    .unwrap_or_else(|| self.flavor.default_base_url().to_string());
                let options = TransportOptions {
                    base_url,
                    api_key,
                    call_timeout: self.call_timeout,
                    retry: self.retry,
                };
                Arc::new(HttpTransport::with_events(&options, self.events.clone())?)
            }
        };

        Ok(JobClient {
            transport,
            driver: create_driver(self.flavor),
            events: self.events,
            poll: self.poll,
        })
    }
}

impl Default for JobClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_key_is_a_configuration_error() {
        let err = JobClientBuilder::new().build().err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn build_uses_flavor_and_poll_options() {
        let client = JobClientBuilder::new()
            .flavor(ApiFlavor::Flat)
            .api_key("k")
            .poll_options(PollOptions::new(Duration::from_secs(1), Duration::from_secs(10)))
            .build()
            .unwrap();
        assert_eq!(client.flavor(), ApiFlavor::Flat);
        assert_eq!(client.poll_options().timeout, Duration::from_secs(10));
    }
}
