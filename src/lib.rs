//! # kie-veo
//!
//! Async job runtime for the KieAI VEO image-to-video API.
//!
//! A generation request is submitted once, the resulting task is polled until
//! it reaches a terminal state under a bounded time budget, and the finished
//! asset is streamed to local storage.
//!
//! ## Overview
//!
//! - **Transport**: one HTTP call primitive with fixed-delay retry around
//!   transient failures ([`transport`]).
//! - **Flavor drivers**: the API exists in two wire conventions (enveloped
//!   camelCase and flat snake_case). A [`drivers::FlavorDriver`] maps each one
//!   onto the same normalized [`TaskStatus`].
//! - **Job client**: [`JobClient`] exposes submit, single status fetch and the
//!   poll-until-terminal state machine.
//! - **Events**: the client reports typed [`JobEvent`]s to an injected
//!   [`JobEventSink`] instead of configuring logging itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kie_veo::{GenerationRequest, JobClient};
//!
//! #[tokio::main]
//! async fn main() -> kie_veo::Result<()> {
//!     let client = JobClient::builder().api_key("your-api-key").build()?;
//!
//!     let request = GenerationRequest::builder("A cat walks.")
//!         .image_url("https://x/img.jpg")
//!         .build()?;
//!
//!     let submission = client.submit(&request).await?;
//!     let status = client.poll_until_complete(&submission.task_id).await?;
//!     if let Some(url) = status.asset_url() {
//!         kie_veo::download::download_asset(url, "results/cat.mp4").await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Job client, builder and the polling state machine |
//! | [`config`] | Environment / YAML configuration |
//! | [`drivers`] | Per-flavor payload building and response parsing |
//! | [`transport`] | HTTP transport and retry policy |
//! | [`types`] | Request and task snapshot value types |
//! | [`telemetry`] | Stock event sinks |
//! | [`download`] | Streaming asset persistence |
//! | [`prompt`] | Prompt composition |

pub mod client;
pub mod config;
pub mod download;
pub mod drivers;
pub mod error;
pub mod feedback;
pub mod prompt;
pub mod protocol;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use client::{CancelHandle, JobClient, JobClientBuilder, PollOptions, PollReport};
pub use config::AppConfig;
pub use error::{Error, ErrorContext};
pub use feedback::{JobEvent, JobEventSink};
pub use protocol::ApiFlavor;
pub use types::{
    GenerationRequest, GenerationRequestBuilder, GenerationType, StatusSignal, TaskPhase,
    TaskStatus, TaskSubmission,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
