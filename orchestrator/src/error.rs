//! Orchestrator-specific error types

use shared::SharedError;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Required file is missing: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Failed to parse configuration file {}: {message}", path.display())]
    ConfigParseError { path: PathBuf, message: String },

    #[error("Error while creating qcow2 disk image: {message}")]
    DiskCreationFailed { message: String },

    #[error("Error while snapshotting guest: {message}")]
    SnapshotFailed { message: String },

    #[error("Failed to duplicate disk for worker {worker_id}: {source}")]
    DiskReplicationFailed {
        worker_id: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn worker {worker_id}: {message}")]
    WorkerSpawnFailed { worker_id: u32, message: String },

    #[error("Process management failed: {message}")]
    ProcessError { message: String },

    #[error("Campaign ended before all workers finished: {unfinished:?}")]
    CampaignIncomplete { unfinished: Vec<u32> },

    #[error("Shared component error")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::ProcessError { message: message.into() }
    }

    /// Describe a non-success exit status
    pub fn exit_status_message(status: ExitStatus) -> String {
        match status.code() {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
