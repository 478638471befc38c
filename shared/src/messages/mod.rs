//! Message types exchanged between emulator workers and the orchestrator
//!
//! - `worker`: the sentinel line protocol spoken by the fault plugin on a
//!   worker's diagnostic stream, decoded into tagged events

pub mod worker;

pub use worker::{WorkerEvent, WorkerMessage};
