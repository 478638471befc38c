//! Core types used throughout the campaign tooling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::SharedError;

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Identity attached to every log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// The campaign orchestrator (singleton)
    Orchestrator,
    /// Emulator instance driven by the orchestrator, by worker index
    Worker(u32),
}

impl ProcessId {
    /// Initialize the global process ID for the orchestrator
    pub fn init_orchestrator() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }

    /// Get the global process ID, falling back to the orchestrator when
    /// nothing was initialized (library use, tests)
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Orchestrator => write!(f, "orchestrator"),
            ProcessId::Worker(id) => write!(f, "worker_{id}"),
        }
    }
}

/// Effect applied by the fault plugin at an injection point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultModel {
    /// Transient instruction skip
    #[default]
    Skip,
    /// Overwrite destination register values
    Set,
}

impl FaultModel {
    pub const ALL: [FaultModel; 2] = [FaultModel::Skip, FaultModel::Set];

    /// Name understood by the fault plugin
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultModel::Skip => "skip",
            FaultModel::Set => "set",
        }
    }
}

impl fmt::Display for FaultModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultModel {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FaultModel::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| SharedError::InvalidConfig {
                field: "fault_model".to_string(),
                value: s.to_string(),
            })
    }
}
