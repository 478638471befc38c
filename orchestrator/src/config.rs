//! Campaign configuration
//!
//! `CampaignConfig` holds the immutable parameters of one campaign,
//! `EmulatorConfig` the emulator toolchain read from a TOML file, and
//! `RunnerSettings` the knobs of the orchestrator itself.

use serde::Deserialize;
use shared::FaultModel;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Default emulator configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Default directory holding the per-worker disks
pub const DEFAULT_WORK_DIR: &str = "experiment_disks";

/// Name of the checkpoint the snapshot plugin embeds in the disk
pub const SNAPSHOT_NAME: &str = "snapshotfault";

/// Size of the freshly created base disk
pub const BASE_DISK_SIZE: &str = "32M";

/// Silence after which a worker is considered hung
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// How the target program is handed to the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootMode {
    #[default]
    Kernel,
    Bios,
}

impl BootMode {
    pub fn flag(&self) -> &'static str {
        match self {
            BootMode::Kernel => "-kernel",
            BootMode::Bios => "-bios",
        }
    }
}

/// Immutable parameters of a fault-injection campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignConfig {
    pub program: PathBuf,
    pub boot_mode: BootMode,
    /// Size of the candidate-offset range
    pub fault_window: u32,
    /// Faults injected per run
    pub num_fault: u32,
    /// Address the checkpoint is taken at
    pub start_address: u64,
    /// Reaching it marks a successful fault
    pub fault_address: u64,
    /// Reaching it means the fault had no effect
    pub end_address: u64,
    /// Reaching it means the target crashed
    pub error_address: u64,
    pub insn_timeout: u64,
    pub fault_model: FaultModel,
    /// Only used with `FaultModel::Set`
    pub set_value: u64,
    pub strict: bool,
}

impl CampaignConfig {
    /// Reject parameters that cannot describe a campaign
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.fault_window == 0 {
            return Err(OrchestratorError::config("'fault_window' must be at least 1"));
        }
        if self.num_fault == 0 {
            return Err(OrchestratorError::config("'num_fault' must be at least 1"));
        }
        if self.num_fault > self.fault_window {
            return Err(OrchestratorError::config(
                "'num_fault' cannot be higher than 'fault_window'",
            ));
        }
        Ok(())
    }
}

/// Emulator toolchain, loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmulatorConfig {
    pub qemu_executable_path: PathBuf,
    pub qemu_img_executable_path: PathBuf,
    pub qemu_snapshot_plugin_path: PathBuf,
    pub qemu_fault_plugin_path: PathBuf,
    /// Extra emulator flags, whitespace separated
    #[serde(default)]
    pub qemu_options: String,
}

impl EmulatorConfig {
    /// Read and parse the configuration file
    pub async fn load(path: &Path) -> OrchestratorResult<Self> {
        if !path.is_file() {
            return Err(OrchestratorError::MissingFile {
                path: path.to_path_buf(),
            });
        }

        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content).map_err(|message| OrchestratorError::ConfigParseError {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Extra emulator flags as individual arguments
    pub fn extra_options(&self) -> Vec<String> {
        self.qemu_options.split_whitespace().map(str::to_string).collect()
    }

    /// Executables and plugins that must exist before anything runs
    pub fn required_files(&self) -> [&Path; 4] {
        [
            &self.qemu_executable_path,
            &self.qemu_img_executable_path,
            &self.qemu_snapshot_plugin_path,
            &self.qemu_fault_plugin_path,
        ]
    }
}

/// Fail on the first path that is not an existing file
pub fn check_files_exist<'a>(paths: impl IntoIterator<Item = &'a Path>) -> OrchestratorResult<()> {
    for path in paths {
        if !path.is_file() {
            return Err(OrchestratorError::MissingFile {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Orchestrator knobs that are not part of the campaign itself
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Directory holding the per-worker disks
    pub work_dir: PathBuf,
    /// CPUs one emulator instance occupies on the host
    pub guest_cpus: u32,
    /// Deadline for every worker, measured from campaign start
    pub worker_timeout: Option<Duration>,
    /// A worker silent for this long is stopped
    pub idle_timeout: Duration,
    /// How long to keep draining after workers were stopped
    pub shutdown_grace: Duration,
    pub channel_capacity: usize,
}

impl RunnerSettings {
    pub fn new() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            guest_cpus: 1,
            worker_timeout: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            shutdown_grace: Duration::from_secs(5),
            channel_capacity: 1024,
        }
    }

    /// Configure work directory (fluent API)
    pub fn with_work_dir(mut self, work_dir: PathBuf) -> Self {
        self.work_dir = work_dir;
        self
    }

    /// Configure guest CPU cost (fluent API)
    pub fn with_guest_cpus(mut self, guest_cpus: u32) -> Self {
        self.guest_cpus = guest_cpus;
        self
    }

    /// Configure worker deadline (fluent API)
    pub fn with_worker_timeout(mut self, worker_timeout: Option<Duration>) -> Self {
        self.worker_timeout = worker_timeout;
        self
    }

    /// Configure worker inactivity limit (fluent API)
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Configure shutdown grace period (fluent API)
    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.guest_cpus == 0 {
            return Err(OrchestratorError::config("'guest_cpus' must be at least 1"));
        }
        if self.idle_timeout.is_zero() {
            return Err(OrchestratorError::config("'idle_timeout' must be positive"));
        }
        Ok(())
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an integer literal in base 0: `0x`, `0o`, `0b` prefixes or decimal
pub fn parse_int(input: &str) -> Result<u64, String> {
    let cleaned = input.trim().replace('_', "");
    let lower = cleaned.to_ascii_lowercase();

    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };

    u64::from_str_radix(digits, radix).map_err(|e| format!("invalid integer '{input}': {e}"))
}
