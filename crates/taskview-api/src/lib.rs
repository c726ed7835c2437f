//! taskview-api: client for the task-execution service
//!
//! Typed access to the REST endpoints and the per-task server-sent event
//! stream, with every event payload validated against its schema.

pub mod client;
pub mod error;
pub mod stream;
pub mod types;

pub use client::TaskClient;
pub use error::{Error, Result};
pub use stream::{StatusSnapshot, TaskEvent, TaskEventStream};
pub use types::*;
