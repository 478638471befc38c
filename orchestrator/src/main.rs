//! Entry point for the `fault-campaign` binary
//!
//! Tries to fault a program at every combination of injection offsets in
//! the fault window and prints how each configuration ended.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;

use orchestrator::{
    config::{self, check_files_exist, parse_int},
    core::planner,
    services::{ConsoleObserver, RealDiskManager, RealProcessManager},
    BootMode, Campaign, CampaignConfig, CampaignPlan, CampaignStatus, EmulatorConfig, OrchestratorError,
    OrchestratorResult, RunnerSettings,
};
use shared::{logging, process_info, FaultModel, ProcessId};

fn parse_u32(input: &str) -> Result<u32, String> {
    let value = parse_int(input)?;
    u32::try_from(value).map_err(|_| format!("'{input}' does not fit in 32 bits"))
}

/// Exhaustive fault-injection campaign over an emulated target
#[derive(Parser)]
#[command(name = "fault-campaign")]
#[command(about = "Try to fault a given program at every possible injection offset and print results")]
pub struct Args {
    /// Path to the program that will be faulted
    pub program: PathBuf,

    /// Faulted instructions range size
    #[arg(long, visible_alias = "fw", value_parser = parse_u32)]
    pub fault_window: u32,

    /// Address of the instruction to start faulting at
    #[arg(short, long, value_parser = parse_int)]
    pub address: u64,

    /// Consider a fault configuration as valid if this address is reached
    #[arg(long, visible_alias = "fa", value_parser = parse_int)]
    pub fault_address: u64,

    /// Consider a fault configuration had no effect if this address is reached
    #[arg(long, visible_alias = "ea", value_parser = parse_int)]
    pub end_address: u64,

    /// Consider a fault configuration crashed the target if this address is reached
    #[arg(long, visible_alias = "erra", value_parser = parse_int)]
    pub error_address: u64,

    /// Instructions to execute before a configuration that reached no trigger address counts as a timeout
    #[arg(long, visible_alias = "ito", value_parser = parse_int)]
    pub insn_timeout: u64,

    /// Faults to inject per run; run time grows combinatorially with this value
    #[arg(long, visible_alias = "nf", default_value = "1", value_parser = parse_u32)]
    pub num_fault: u32,

    /// Fault model: skip (transient instruction skip) or set (overwrite destination registers)
    #[arg(long, visible_alias = "fm", default_value = "skip")]
    pub fault_model: FaultModel,

    /// Value destination registers are replaced with under the 'set' model
    #[arg(long, visible_alias = "sv", default_value = "0", value_parser = parse_int)]
    pub set_value: u64,

    /// Pass the program with -bios rather than -kernel
    #[arg(long)]
    pub bios: bool,

    /// Count a fault only if the fault address is reached after exactly 'num_fault' injections
    #[arg(long)]
    pub strict: bool,

    /// Emulator configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Directory holding the per-worker disks
    #[arg(long, default_value = config::DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    /// Host CPUs one emulator instance occupies
    #[arg(long, default_value = "1")]
    pub guest_cpus: u32,

    /// Stop workers still running after this many seconds
    #[arg(long)]
    pub worker_timeout: Option<u64>,

    /// Also write the results as JSON to this file
    #[arg(long)]
    pub results_json: Option<PathBuf>,

    /// Stop a worker that prints nothing for this many seconds
    #[arg(long, default_value_t = config::DEFAULT_IDLE_TIMEOUT.as_secs())]
    pub idle_timeout: u64,

    /// Log level
    #[arg(long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,
}

impl Args {
    fn campaign_config(&self) -> CampaignConfig {
        CampaignConfig {
            program: self.program.clone(),
            boot_mode: if self.bios { BootMode::Bios } else { BootMode::Kernel },
            fault_window: self.fault_window,
            num_fault: self.num_fault,
            start_address: self.address,
            fault_address: self.fault_address,
            end_address: self.end_address,
            error_address: self.error_address,
            insn_timeout: self.insn_timeout,
            fault_model: self.fault_model,
            set_value: self.set_value,
            strict: self.strict,
        }
    }

    fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings::new()
            .with_work_dir(self.work_dir.clone())
            .with_guest_cpus(self.guest_cpus)
            .with_worker_timeout(self.worker_timeout.map(Duration::from_secs))
            .with_idle_timeout(Duration::from_secs(self.idle_timeout))
    }
}

#[tokio::main]
async fn main() -> OrchestratorResult<()> {
    let args = Args::parse();

    ProcessId::init_orchestrator();
    logging::init_tracing_with_level(Some(&args.log_level));

    // Everything that can be rejected is rejected before a process starts
    let campaign_config = args.campaign_config();
    campaign_config.validate()?;
    let settings = args.runner_settings();
    settings.validate()?;

    let emulator = EmulatorConfig::load(&args.config).await?;
    check_files_exist(std::iter::once(campaign_config.program.as_path()).chain(emulator.required_files()))?;

    let host_cpus = planner::detect_host_cpus();
    process_info!(ProcessId::current(), "🖥️  Host CPU count: {}", host_cpus);
    process_info!(ProcessId::current(), "🖥️  Guest CPU count: {}", settings.guest_cpus);

    let plan = CampaignPlan::new(
        &campaign_config,
        planner::host_parallelism(host_cpus, settings.guest_cpus),
    )?;
    process_info!(
        ProcessId::current(),
        "🚀 Running experiment on {} QEMU instances",
        plan.worker_count
    );

    let disk_manager = RealDiskManager::new(emulator.qemu_img_executable_path.clone());
    let process_manager = RealProcessManager::new(emulator, campaign_config.clone());
    let mut campaign = Campaign::new(
        campaign_config,
        settings,
        plan,
        disk_manager,
        process_manager,
        ConsoleObserver::new(),
    );

    campaign.prepare().await?;

    // Set up graceful interruption
    let shutdown_sender = campaign.get_shutdown_sender();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(ProcessId::current(), "Received Ctrl+C signal");
                let _ = shutdown_sender.send(()).await;
            }
            Err(err) => {
                logging::log_error(ProcessId::current(), "Signal handling", &err);
            }
        }
    });

    let report = campaign.run().await?;
    println!("{}", report.render_table());

    if let Some(path) = &args.results_json {
        tokio::fs::write(path, report.to_json()?).await?;
        process_info!(ProcessId::current(), "💾 Results written to {}", path.display());
    }

    match report.status {
        CampaignStatus::Complete => {
            logging::log_success(ProcessId::current(), "Campaign complete");
            Ok(())
        }
        CampaignStatus::Partial { unfinished_workers } => Err(OrchestratorError::CampaignIncomplete {
            unfinished: unfinished_workers,
        }),
    }
}
