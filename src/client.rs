//! Job client: submit, fetch status once, poll until terminal.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod poll;
pub mod types;

pub use builder::JobClientBuilder;
pub use core::JobClient;
pub use poll::{classify, Observation};
pub use types::{CancelHandle, PollOptions, PollReport};
