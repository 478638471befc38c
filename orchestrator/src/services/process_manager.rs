//! Real process management service implementation
//!
//! Runs the snapshot guest, spawns one emulator instance per worker and
//! keeps their handles so they can be joined or forcibly stopped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::config::{CampaignConfig, EmulatorConfig};
use crate::core::{launch, WorkerSpec};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::process_output_handler::forward_worker_output;
use crate::traits::{ProcessManager, WorkerHandle};
use shared::{process_debug, process_info, process_warn, ProcessId, WorkerMessage};

/// Real process manager implementation
pub struct RealProcessManager {
    emulator: EmulatorConfig,
    campaign: CampaignConfig,

    /// Running worker processes by worker index
    active_workers: Mutex<HashMap<u32, Child>>,

    /// Time a worker gets to exit after SIGTERM before it is killed
    stop_grace: Duration,
}

impl RealProcessManager {
    pub fn new(emulator: EmulatorConfig, campaign: CampaignConfig) -> Self {
        Self {
            emulator,
            campaign,
            active_workers: Mutex::new(HashMap::new()),
            stop_grace: Duration::from_secs(2),
        }
    }

    /// Configure stop grace period (fluent API)
    pub fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    /// Number of workers not yet joined or stopped
    pub async fn active_count(&self) -> usize {
        self.active_workers.lock().await.len()
    }

    /// Signal every child first, then give them the stop grace together
    async fn terminate_all(&self, children: Vec<(u32, Child)>) -> OrchestratorResult<()> {
        let mut stopping = JoinSet::new();
        for (worker_id, child) in children {
            let signalled = Self::request_termination(&child);
            stopping.spawn(terminate(worker_id, child, signalled, self.stop_grace));
        }

        let mut failures = Vec::new();
        while let Some(joined) = stopping.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e.to_string()),
                Err(e) => failures.push(format!("stop task failed: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::process(failures.join("; ")))
        }
    }

    #[cfg(unix)]
    fn request_termination(child: &Child) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match child.id() {
            Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok(),
            None => false,
        }
    }

    #[cfg(not(unix))]
    fn request_termination(_child: &Child) -> bool {
        false
    }
}

/// Wait out the grace for a signalled child, then kill it
async fn terminate(worker_id: u32, mut child: Child, signalled: bool, grace: Duration) -> OrchestratorResult<()> {
    if signalled {
        if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
            process_debug!(ProcessId::Worker(worker_id), "🛑 Stopped ({})", status);
            return Ok(());
        }
    }

    child
        .kill()
        .await
        .map_err(|e| OrchestratorError::process(format!("cannot kill worker {worker_id}: {e}")))?;
    process_debug!(ProcessId::Worker(worker_id), "🛑 Killed");
    Ok(())
}

#[async_trait]
impl ProcessManager for RealProcessManager {
    async fn run_snapshot(&self, disk: &Path) -> OrchestratorResult<()> {
        process_info!(
            ProcessId::current(),
            "📸 Running guest and snapshotting at address {:#x}",
            self.campaign.start_address
        );

        let status = Command::new(&self.emulator.qemu_executable_path)
            .args(launch::snapshot_args(&self.campaign, &self.emulator, disk))
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| OrchestratorError::SnapshotFailed {
                message: format!("cannot run {}: {e}", self.emulator.qemu_executable_path.display()),
            })?;

        if !status.success() {
            return Err(OrchestratorError::SnapshotFailed {
                message: OrchestratorError::exit_status_message(status),
            });
        }

        Ok(())
    }

    async fn spawn_worker(
        &self,
        spec: &WorkerSpec,
        events: mpsc::Sender<WorkerMessage>,
    ) -> OrchestratorResult<WorkerHandle> {
        // Only the diagnostic stream carries the protocol
        let mut child = Command::new(&self.emulator.qemu_executable_path)
            .args(launch::worker_args(&self.campaign, &self.emulator, spec))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OrchestratorError::WorkerSpawnFailed {
                worker_id: spec.id,
                message: e.to_string(),
            })?;

        let stderr = child.stderr.take().ok_or_else(|| OrchestratorError::WorkerSpawnFailed {
            worker_id: spec.id,
            message: "diagnostic stream was not captured".to_string(),
        })?;

        let pid = child.id();
        tokio::spawn(forward_worker_output(spec.id, stderr, events));

        self.active_workers.lock().await.insert(spec.id, child);

        process_debug!(
            ProcessId::Worker(spec.id),
            "🏭 Spawned with offset {} step {} on {}",
            spec.offset,
            spec.step,
            spec.disk_path.display()
        );

        Ok(WorkerHandle {
            worker_id: spec.id,
            pid,
        })
    }

    async fn stop_workers(&self, worker_ids: &[u32]) -> OrchestratorResult<()> {
        let children: Vec<(u32, Child)> = {
            let mut active = self.active_workers.lock().await;
            worker_ids
                .iter()
                .filter_map(|id| active.remove(id).map(|child| (*id, child)))
                .collect()
        };

        self.terminate_all(children).await
    }

    async fn wait_all(&self) -> OrchestratorResult<()> {
        let ids: Vec<u32> = self.active_workers.lock().await.keys().copied().collect();
        let mut failures = Vec::new();

        for worker_id in ids {
            // Lock held across the wait; a caller that gives up drops it
            let mut active = self.active_workers.lock().await;
            let Some(child) = active.get_mut(&worker_id) else {
                continue;
            };
            let status = child.wait().await;
            active.remove(&worker_id);
            drop(active);

            match status {
                Ok(status) => {
                    process_debug!(ProcessId::Worker(worker_id), "Exited ({})", status);
                }
                Err(e) => {
                    process_warn!(ProcessId::Worker(worker_id), "⚠️ Wait failed: {}", e);
                    failures.push(format!("worker {worker_id}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::process(format!("cannot join {}", failures.join("; "))))
        }
    }

    async fn stop_all(&self) -> OrchestratorResult<()> {
        let children: Vec<(u32, Child)> = self.active_workers.lock().await.drain().collect();

        self.terminate_all(children).await?;

        process_debug!(ProcessId::current(), "🛑 All workers stopped");
        Ok(())
    }
}
