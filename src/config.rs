//! Application configuration.
//!
//! `KIEAI_*` environment variables win over an optional YAML file, which wins
//! over built-in defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::client::PollOptions;
use crate::prompt::{PromptTemplate, DEFAULT_REFERENCE_IMAGE_URL};
use crate::protocol::ApiFlavor;
use crate::transport::RetryPolicy;
use crate::types::{GenerationRequest, GenerationType};
use crate::{Error, ErrorContext, Result};

pub const ENV_API_KEY: &str = "KIEAI_API_KEY";
pub const ENV_API_FLAVOR: &str = "KIEAI_API_FLAVOR";
pub const ENV_BASE_URL: &str = "KIEAI_BASE_URL";
pub const ENV_POLL_INTERVAL: &str = "KIEAI_POLL_INTERVAL_SECS";
pub const ENV_TIMEOUT: &str = "KIEAI_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "KIEAI_MAX_RETRIES";
pub const ENV_RETRY_BACKOFF: &str = "KIEAI_RETRY_BACKOFF_SECS";
pub const ENV_HTTP_TIMEOUT: &str = "KIEAI_HTTP_TIMEOUT_SECS";
pub const ENV_RETRY_CLIENT_ERRORS: &str = "KIEAI_RETRY_CLIENT_ERRORS";
pub const ENV_MODEL: &str = "KIEAI_MODEL";
pub const ENV_ASPECT_RATIO: &str = "KIEAI_ASPECT_RATIO";
pub const ENV_GENERATION_TYPE: &str = "KIEAI_GENERATION_TYPE";
pub const ENV_IMAGE_URLS: &str = "KIEAI_IMAGE_URLS";
pub const ENV_ENABLE_TRANSLATION: &str = "KIEAI_ENABLE_TRANSLATION";
pub const ENV_WATERMARK: &str = "KIEAI_WATERMARK";
pub const ENV_CALLBACK_URL: &str = "KIEAI_CALLBACK_URL";
pub const ENV_SEED: &str = "KIEAI_SEED";
pub const ENV_RESULTS_DIR: &str = "KIEAI_RESULTS_DIR";
pub const ENV_TOPIC: &str = "KIEAI_TOPIC";

const DEFAULT_TOPIC: &str = "stone-bench-walkthrough";

/// YAML shape accepted by [`AppConfig::from_yaml_file`]. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub api_key: Option<String>,
    pub flavor: Option<String>,
    pub base_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub retry_client_errors: Option<bool>,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
    pub generation_type: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub enable_translation: Option<bool>,
    pub watermark: Option<String>,
    pub callback_url: Option<String>,
    pub seed: Option<u64>,
    pub results_dir: Option<PathBuf>,
    pub topic: Option<String>,
    pub prompt: Option<PromptTemplate>,
}

/// Immutable settings for one run.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub flavor: ApiFlavor,
    /// Explicit base URL; `None` means the flavor default.
    pub base_url: Option<String>,
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Total attempts per HTTP call. Never below 1.
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub http_timeout: Duration,
    pub retry_client_errors: bool,
    pub model: String,
    pub aspect_ratio: String,
    pub generation_type: GenerationType,
    pub image_urls: Vec<String>,
    pub enable_translation: bool,
    pub watermark: Option<String>,
    pub callback_url: Option<String>,
    pub seed: Option<u64>,
    pub results_dir: PathBuf,
    pub topic: String,
    pub prompt: PromptTemplate,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("flavor", &self.flavor)
            .field("base_url", &self.base_url())
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("http_timeout", &self.http_timeout)
            .field("retry_client_errors", &self.retry_client_errors)
            .field("model", &self.model)
            .field("aspect_ratio", &self.aspect_ratio)
            .field("generation_type", &self.generation_type)
            .field("image_urls", &self.image_urls)
            .field("results_dir", &self.results_dir)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load from the process environment only.
    pub fn from_env() -> Result<Self> {
        Self::from_sources(ConfigFile::default(), |key| std::env::var(key).ok())
    }

    /// Load a YAML file, then apply environment overrides.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = ConfigFile::load(path.as_ref())?;
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Resolve settings from `file` with `lookup` supplying environment values.
    pub fn from_sources<F>(file: ConfigFile, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = env(ENV_API_KEY)
            .or_else(|| non_blank(file.api_key))
            .ok_or_else(|| {
                Error::configuration_with_context(
                    format!("{} must be set with a valid API key", ENV_API_KEY),
                    ErrorContext::new()
                        .with_field_path(ENV_API_KEY)
                        .with_source("config_loader"),
                )
            })?;

        let flavor = match env(ENV_API_FLAVOR).or(file.flavor) {
            Some(raw) => raw.parse::<ApiFlavor>()?,
            None => ApiFlavor::default(),
        };

        let generation_type = match env(ENV_GENERATION_TYPE).or(file.generation_type) {
            Some(raw) => GenerationType::from_str(&raw).map_err(|e| {
                Error::configuration_with_context(
                    e.to_string(),
                    ErrorContext::new()
                        .with_field_path(ENV_GENERATION_TYPE)
                        .with_details(raw.clone())
                        .with_source("config_loader"),
                )
            })?,
            None => GenerationType::Reference2Video,
        };

        let image_urls = match env(ENV_IMAGE_URLS) {
            Some(raw) => split_list(&raw),
            None => file
                .image_urls
                .map(|urls| urls.into_iter().filter_map(|u| non_blank(Some(u))).collect())
                .unwrap_or_else(|| vec![DEFAULT_REFERENCE_IMAGE_URL.to_string()]),
        };

        let reference = image_urls
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_REFERENCE_IMAGE_URL.to_string());
        let prompt = file.prompt.unwrap_or_default().with_reference_url(reference);

        let config = Self {
            api_key,
            flavor,
            base_url: env(ENV_BASE_URL).or_else(|| non_blank(file.base_url)),
            poll_interval: positive_secs(&env, ENV_POLL_INTERVAL, file.poll_interval_secs, 20)?,
            timeout: secs(&env, ENV_TIMEOUT, file.timeout_secs, 600)?,
            max_retries: number(&env, ENV_MAX_RETRIES, file.max_retries, 3)?.max(1),
            retry_backoff: secs(&env, ENV_RETRY_BACKOFF, file.retry_backoff_secs, 3)?,
            http_timeout: positive_secs(&env, ENV_HTTP_TIMEOUT, file.http_timeout_secs, 30)?,
            retry_client_errors: flag(
                &env,
                ENV_RETRY_CLIENT_ERRORS,
                file.retry_client_errors,
                true,
            )?,
            model: env(ENV_MODEL)
                .or_else(|| non_blank(file.model))
                .unwrap_or_else(|| "veo3".to_string()),
            aspect_ratio: env(ENV_ASPECT_RATIO)
                .or_else(|| non_blank(file.aspect_ratio))
                .unwrap_or_else(|| "9:16".to_string()),
            generation_type,
            image_urls,
            enable_translation: flag(
                &env,
                ENV_ENABLE_TRANSLATION,
                file.enable_translation,
                true,
            )?,
            watermark: env(ENV_WATERMARK).or_else(|| non_blank(file.watermark)),
            callback_url: env(ENV_CALLBACK_URL).or_else(|| non_blank(file.callback_url)),
            seed: match env(ENV_SEED) {
                Some(raw) => Some(parse_number::<u64>(ENV_SEED, &raw)?),
                None => file.seed,
            },
            results_dir: env(ENV_RESULTS_DIR)
                .map(PathBuf::from)
                .or(file.results_dir)
                .unwrap_or_else(|| PathBuf::from("results")),
            topic: env(ENV_TOPIC)
                .or_else(|| non_blank(file.topic))
                .unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            prompt,
        };

        info!(
            topic = config.topic.as_str(),
            flavor = %config.flavor,
            model = config.model.as_str(),
            aspect_ratio = config.aspect_ratio.as_str(),
            results_dir = %config.results_dir.display(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Base URL in effect: the explicit one, else the flavor default.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.flavor.default_base_url().to_string())
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions::new(self.poll_interval, self.timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_backoff)
            .retry_client_errors(self.retry_client_errors)
    }

    /// Build the generation request for `prompt` from the configured knobs.
    pub fn generation_request(&self, prompt: impl Into<String>) -> Result<GenerationRequest> {
        GenerationRequest::builder(prompt)
            .image_urls(self.image_urls.iter().cloned())
            .model(self.model.clone())
            .aspect_ratio(self.aspect_ratio.clone())
            .generation_type(self.generation_type)
            .enable_translation(self.enable_translation)
            .watermark(self.watermark.clone())
            .callback_url(self.callback_url.clone())
            .seed(self.seed)
            .build()
    }

    /// Default destination for the finished clip.
    pub fn output_path(&self) -> PathBuf {
        self.results_dir.join(format!("{}-intro.mp4", self.topic))
    }
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_details(path.display().to_string()),
            },
            other => other,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid config file: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| {
        Error::configuration_with_context(
            format!("{} must be a non-negative integer", key),
            ErrorContext::new()
                .with_field_path(key)
                .with_details(format!("got {:?}", raw))
                .with_source("config_loader"),
        )
    })
}

fn number<E, T>(env: &E, key: &str, file: Option<T>, default: T) -> Result<T>
where
    E: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match env(key) {
        Some(raw) => parse_number(key, &raw),
        None => Ok(file.unwrap_or(default)),
    }
}

fn secs<E>(env: &E, key: &str, file: Option<u64>, default: u64) -> Result<Duration>
where
    E: Fn(&str) -> Option<String>,
{
    number(env, key, file, default).map(Duration::from_secs)
}

/// Like [`secs`], but zero is a configuration error.
fn positive_secs<E>(env: &E, key: &str, file: Option<u64>, default: u64) -> Result<Duration>
where
    E: Fn(&str) -> Option<String>,
{
    let value = secs(env, key, file, default)?;
    if value.is_zero() {
        return Err(Error::configuration_with_context(
            format!("{} must be greater than zero", key),
            ErrorContext::new()
                .with_field_path(key)
                .with_details("got 0")
                .with_source("config_loader"),
        ));
    }
    Ok(value)
}

fn flag<E>(env: &E, key: &str, file: Option<bool>, default: bool) -> Result<bool>
where
    E: Fn(&str) -> Option<String>,
{
    let Some(raw) = env(key) else {
        return Ok(file.unwrap_or(default));
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration_with_context(
            format!("{} must be a boolean", key),
            ErrorContext::new()
                .with_field_path(key)
                .with_details(format!("got {:?}", raw))
                .with_source("config_loader"),
        )),
    }
}
