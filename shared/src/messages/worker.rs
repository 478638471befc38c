//! Worker → Orchestrator line protocol
//!
//! The fault plugin writes newline-terminated lines on the emulator's
//! diagnostic stream. Five exact lines are reserved control tokens; every
//! other line is free-form log text. Decoding happens once, at the stream
//! boundary, so aggregation only ever sees tagged variants.

use serde::{Deserialize, Serialize};

pub const STEP_TOKEN: &str = "step";
pub const FAULT_TOKEN: &str = "fault";
pub const TIMEOUT_TOKEN: &str = "timeout";
pub const END_ADDR_TOKEN: &str = "endaddr";
pub const ERROR_ADDR_TOKEN: &str = "erroraddr";

/// Event observed on one worker's diagnostic stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerEvent {
    /// One fault configuration was tried
    Step,
    /// The fault address was reached
    Fault,
    /// No trigger address was reached within the instruction budget
    Timeout,
    /// The end address was reached, the fault had no effect
    EndAddrReached,
    /// The error address was reached, the target crashed
    ErrorAddrReached,
    /// The worker's stream is exhausted; emitted by the runner, never decoded
    Done,
    /// Any other line, surfaced verbatim
    RawLog(String),
}

impl WorkerEvent {
    /// Decode one line (without its terminator) read from a worker
    pub fn decode(line: &str) -> Self {
        match line {
            STEP_TOKEN => WorkerEvent::Step,
            FAULT_TOKEN => WorkerEvent::Fault,
            TIMEOUT_TOKEN => WorkerEvent::Timeout,
            END_ADDR_TOKEN => WorkerEvent::EndAddrReached,
            ERROR_ADDR_TOKEN => WorkerEvent::ErrorAddrReached,
            other => WorkerEvent::RawLog(other.to_string()),
        }
    }
}

/// Event tagged with the worker that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub worker_id: u32,
    pub event: WorkerEvent,
}

impl WorkerMessage {
    pub fn new(worker_id: u32, event: WorkerEvent) -> Self {
        Self { worker_id, event }
    }

    pub fn done(worker_id: u32) -> Self {
        Self::new(worker_id, WorkerEvent::Done)
    }
}
