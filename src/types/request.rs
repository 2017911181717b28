//! Outbound generation request.

use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static ASPECT_RATIO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[1-9][0-9]*:[1-9][0-9]*$").expect("aspect ratio pattern is valid")
});

/// How the remote model should use the supplied images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationType {
    #[serde(rename = "TEXT_2_VIDEO")]
    Text2Video,
    #[serde(rename = "REFERENCE_2_VIDEO")]
    Reference2Video,
    #[serde(rename = "FIRST_AND_LAST_FRAMES_2_VIDEO")]
    FirstAndLastFrames2Video,
}

impl GenerationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationType::Text2Video => "TEXT_2_VIDEO",
            GenerationType::Reference2Video => "REFERENCE_2_VIDEO",
            GenerationType::FirstAndLastFrames2Video => "FIRST_AND_LAST_FRAMES_2_VIDEO",
        }
    }

    /// Whether at least one image URL must accompany the prompt.
    pub fn requires_reference(&self) -> bool {
        !matches!(self, GenerationType::Text2Video)
    }
}

impl fmt::Display for GenerationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEXT_2_VIDEO" => Ok(GenerationType::Text2Video),
            "REFERENCE_2_VIDEO" => Ok(GenerationType::Reference2Video),
            "FIRST_AND_LAST_FRAMES_2_VIDEO" => Ok(GenerationType::FirstAndLastFrames2Video),
            other => Err(Error::validation_with_context(
                format!("unknown generation type '{}'", other),
                ErrorContext::new().with_field_path("generation_type"),
            )),
        }
    }
}

/// An immutable generation request. Build it with [`GenerationRequest::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    image_urls: Vec<String>,
    model: String,
    aspect_ratio: String,
    generation_type: GenerationType,
    enable_translation: bool,
    watermark: Option<String>,
    callback_url: Option<String>,
    seed: Option<u64>,
}

impl GenerationRequest {
    pub fn builder(prompt: impl Into<String>) -> GenerationRequestBuilder {
        GenerationRequestBuilder::new(prompt)
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn image_urls(&self) -> &[String] {
        &self.image_urls
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn aspect_ratio(&self) -> &str {
        &self.aspect_ratio
    }

    pub fn generation_type(&self) -> GenerationType {
        self.generation_type
    }

    pub fn enable_translation(&self) -> bool {
        self.enable_translation
    }

    pub fn watermark(&self) -> Option<&str> {
        self.watermark.as_deref()
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

/// Builder for [`GenerationRequest`]; `build` enforces the request invariants.
#[derive(Debug, Clone)]
pub struct GenerationRequestBuilder {
    prompt: String,
    image_urls: Vec<String>,
    model: String,
    aspect_ratio: String,
    generation_type: GenerationType,
    enable_translation: bool,
    watermark: Option<String>,
    callback_url: Option<String>,
    seed: Option<u64>,
}

impl GenerationRequestBuilder {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_urls: Vec::new(),
            model: "veo3".to_string(),
            aspect_ratio: "9:16".to_string(),
            generation_type: GenerationType::Reference2Video,
            enable_translation: true,
            watermark: None,
            callback_url: None,
            seed: None,
        }
    }

    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_urls.push(url.into());
        self
    }

    pub fn image_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = ratio.into();
        self
    }

    pub fn generation_type(mut self, generation_type: GenerationType) -> Self {
        self.generation_type = generation_type;
        self
    }

    pub fn enable_translation(mut self, enable: bool) -> Self {
        self.enable_translation = enable;
        self
    }

    pub fn watermark(mut self, watermark: Option<String>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn callback_url(mut self, url: Option<String>) -> Self {
        self.callback_url = url;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<GenerationRequest> {
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(Error::validation_with_context(
                "prompt must not be empty",
                ErrorContext::new()
                    .with_field_path("request.prompt")
                    .with_source("request_builder"),
            ));
        }

        let image_urls: Vec<String> = self
            .image_urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if self.generation_type.requires_reference() && image_urls.is_empty() {
            return Err(Error::validation_with_context(
                format!(
                    "generation type {} requires at least one image URL",
                    self.generation_type
                ),
                ErrorContext::new()
                    .with_field_path("request.image_urls")
                    .with_source("request_builder"),
            ));
        }

        let model = self.model.trim().to_string();
        if model.is_empty() {
            return Err(Error::validation_with_context(
                "model must not be empty",
                ErrorContext::new()
                    .with_field_path("request.model")
                    .with_source("request_builder"),
            ));
        }

        let aspect_ratio = self.aspect_ratio.trim().to_string();
        if !ASPECT_RATIO.is_match(&aspect_ratio) {
            return Err(Error::validation_with_context(
                format!("aspect ratio '{}' is not of the form W:H", aspect_ratio),
                ErrorContext::new()
                    .with_field_path("request.aspect_ratio")
                    .with_source("request_builder"),
            ));
        }

        Ok(GenerationRequest {
            prompt,
            image_urls,
            model,
            aspect_ratio,
            generation_type: self.generation_type,
            enable_translation: self.enable_translation,
            watermark: non_blank(self.watermark),
            callback_url: non_blank(self.callback_url),
            seed: self.seed,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
