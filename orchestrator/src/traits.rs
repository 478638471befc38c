//! Trait definitions with mockall annotations for testing
//!
//! The campaign driver only talks to the outside world through these
//! traits, so it can be exercised with mocks.

use std::path::Path;
use tokio::sync::mpsc;

use crate::core::WorkerSpec;
use crate::error::OrchestratorResult;
use shared::WorkerMessage;

/// Handle for a spawned worker process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    pub worker_id: u32,
    /// OS process ID, when the platform reports one
    pub pid: Option<u32>,
}

/// Disk image management
#[mockall::automock]
#[async_trait::async_trait]
pub trait DiskManager: Send + Sync {
    /// Create a fresh, empty base disk image at `path`
    async fn create_base_disk(&self, path: &Path) -> OrchestratorResult<()>;

    /// Copy the checkpointed disk to every worker's disk path
    ///
    /// A spec whose disk path is `source` itself is left untouched.
    async fn replicate_disk(&self, source: &Path, specs: &[WorkerSpec]) -> OrchestratorResult<()>;
}

/// Emulator process management
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync {
    /// Run the guest up to the checkpoint address, embedding the checkpoint in `disk`
    async fn run_snapshot(&self, disk: &Path) -> OrchestratorResult<()>;

    /// Start one worker; its decoded diagnostic stream is sent on `events`,
    /// followed by exactly one `Done`
    async fn spawn_worker(
        &self,
        spec: &WorkerSpec,
        events: mpsc::Sender<WorkerMessage>,
    ) -> OrchestratorResult<WorkerHandle>;

    /// Forcibly terminate the given workers
    async fn stop_workers(&self, worker_ids: &[u32]) -> OrchestratorResult<()>;

    /// Wait for every running worker to exit
    async fn wait_all(&self) -> OrchestratorResult<()>;

    /// Terminate every running worker
    async fn stop_all(&self) -> OrchestratorResult<()>;
}

/// Receives what the campaign surfaces while it runs
#[mockall::automock]
pub trait CampaignObserver: Send {
    /// A worker line that is not a control token
    fn on_raw_log(&mut self, worker_id: u32, line: &str);

    /// Progress moved to `done` out of `total`
    fn on_progress(&mut self, done: u64, total: u64);
}
