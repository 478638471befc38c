//! Orchestrator library for exhaustive fault-injection campaigns
//!
//! Partitions the fault window across a bounded pool of emulator
//! instances, resumes each from a shared checkpoint on its own disk copy
//! and aggregates the outcome signals they emit into campaign statistics.

pub mod campaign;
pub mod config;
pub mod core;
pub mod error;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use campaign::Campaign;
pub use config::{BootMode, CampaignConfig, EmulatorConfig, RunnerSettings};
pub use core::{Aggregator, CampaignPlan, CampaignReport, CampaignStatus, Counters, WorkerSpec};
pub use error::{OrchestratorError, OrchestratorResult};
pub use traits::{
    CampaignObserver, DiskManager, MockCampaignObserver, MockDiskManager, MockProcessManager, ProcessManager,
    WorkerHandle,
};
