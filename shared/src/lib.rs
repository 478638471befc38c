//! Shared types for the fault-injection campaign tooling
//!
//! Holds what both the orchestrator and its tests need to agree on:
//! process identity, the fault model, the worker line protocol and
//! the logging conventions.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{WorkerEvent, WorkerMessage};
