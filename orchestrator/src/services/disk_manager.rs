//! Real disk image service implementation
//!
//! Creates the base qcow2 image with `qemu-img` and duplicates the
//! checkpointed image once per worker. Emulator instances cannot share a
//! qcow2 disk holding a checkpoint, so every worker gets a full copy.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;

use crate::core::launch;
use crate::core::WorkerSpec;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::DiskManager;
use shared::{process_debug, process_info, ProcessId};

/// Real disk manager implementation
pub struct RealDiskManager {
    /// `qemu-img` executable
    qemu_img: PathBuf,
}

impl RealDiskManager {
    pub fn new(qemu_img: PathBuf) -> Self {
        Self { qemu_img }
    }
}

#[async_trait]
impl DiskManager for RealDiskManager {
    async fn create_base_disk(&self, path: &Path) -> OrchestratorResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        process_info!(ProcessId::current(), "💽 Creating qcow2 disk image");

        let status = Command::new(&self.qemu_img)
            .args(launch::disk_creation_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| OrchestratorError::DiskCreationFailed {
                message: format!("cannot run {}: {e}", self.qemu_img.display()),
            })?;

        if !status.success() {
            return Err(OrchestratorError::DiskCreationFailed {
                message: OrchestratorError::exit_status_message(status),
            });
        }

        process_debug!(ProcessId::current(), "📁 Created base disk: {}", path.display());
        Ok(())
    }

    async fn replicate_disk(&self, source: &Path, specs: &[WorkerSpec]) -> OrchestratorResult<()> {
        process_info!(
            ProcessId::current(),
            "📀 Duplicating the disk containing the snapshot for each instance"
        );

        for spec in specs.iter().filter(|spec| spec.disk_path != source) {
            fs::copy(source, &spec.disk_path)
                .await
                .map_err(|e| OrchestratorError::DiskReplicationFailed {
                    worker_id: spec.id,
                    source: e,
                })?;
            process_debug!(ProcessId::current(), "Copied disk for worker {}", spec.id);
        }

        Ok(())
    }
}
