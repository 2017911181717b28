//! Core value types: the outbound request and the normalized task snapshots.

pub mod request;
pub mod task;

pub use request::{GenerationRequest, GenerationRequestBuilder, GenerationType};
pub use task::{StatusSignal, TaskPhase, TaskStatus, TaskSubmission};
