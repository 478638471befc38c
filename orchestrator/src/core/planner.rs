//! Campaign planning
//!
//! Sizes the search space and splits the fault window across a bounded
//! number of workers with a fixed stride: worker `i` of `n` walks offsets
//! `i, i+n, i+2n, …` inside the window. The walk itself happens in the
//! fault plugin; the planner only hands out `(offset, step)` pairs.

use std::path::{Path, PathBuf};

use crate::config::CampaignConfig;
use crate::error::{OrchestratorError, OrchestratorResult};

/// Number of ways to choose `k` offsets out of `n`, `None` on overflow
pub fn binomial(n: u32, k: u32) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // Exact at every step: result * (n - i) is divisible by (i + 1)
        result = result * u128::from(n - i) / u128::from(i + 1);
        if result > u128::from(u64::MAX) {
            return None;
        }
    }
    u64::try_from(result).ok()
}

/// Logical CPUs on this host, falling back to one
pub fn detect_host_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Emulator instances the host can run side by side
///
/// Each instance costs `guest_cpus` host CPUs. The guest CPU count is not
/// probed: callers pass 1 unless told otherwise.
pub fn host_parallelism(host_cpus: usize, guest_cpus: u32) -> usize {
    let guest_cpus = (guest_cpus as usize).max(1);
    (host_cpus / guest_cpus).max(1)
}

/// Path of the disk used by worker `worker_id`
pub fn disk_path(work_dir: &Path, worker_id: u32) -> PathBuf {
    work_dir.join(format!("disk{}.qcow2", worker_id + 1))
}

/// The slice of the offset space one worker enumerates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub id: u32,
    pub offset: u32,
    pub step: u32,
    pub disk_path: PathBuf,
}

impl WorkerSpec {
    /// Offsets this worker covers inside `[0, fault_window)`
    pub fn offsets(&self, fault_window: u32) -> impl Iterator<Item = u32> {
        (self.offset..fault_window).step_by(self.step.max(1) as usize)
    }
}

/// Campaign size and worker count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignPlan {
    /// C(fault_window, num_fault)
    pub total_campaign: u64,
    pub worker_count: u32,
}

impl CampaignPlan {
    /// Plan a validated campaign for the given host parallelism
    pub fn new(config: &CampaignConfig, host_parallelism: usize) -> OrchestratorResult<Self> {
        config.validate()?;

        let total_campaign = binomial(config.fault_window, config.num_fault).ok_or_else(|| {
            OrchestratorError::config(format!(
                "campaign size C({}, {}) does not fit in 64 bits",
                config.fault_window, config.num_fault
            ))
        })?;

        // Never start more instances than there are runs to do
        let worker_count = (host_parallelism as u64).min(total_campaign).max(1);

        Ok(Self {
            total_campaign,
            worker_count: u32::try_from(worker_count).unwrap_or(u32::MAX),
        })
    }

    /// One spec per worker, disks named by worker index under `work_dir`
    pub fn worker_specs(&self, work_dir: &Path) -> Vec<WorkerSpec> {
        (0..self.worker_count)
            .map(|id| WorkerSpec {
                id,
                offset: id,
                step: self.worker_count,
                disk_path: disk_path(work_dir, id),
            })
            .collect()
    }
}
