//! Command lines for the emulator toolchain
//!
//! Pure builders; the services in `crate::services` run them.

use std::ffi::OsString;
use std::path::Path;

use shared::FaultModel;

use super::planner::WorkerSpec;
use crate::config::{CampaignConfig, EmulatorConfig, BASE_DISK_SIZE, SNAPSHOT_NAME};

/// `qemu-img` arguments creating the empty base disk
pub fn disk_creation_args(disk: &Path) -> Vec<OsString> {
    vec![
        "create".into(),
        "-f".into(),
        "qcow2".into(),
        disk.as_os_str().to_owned(),
        BASE_DISK_SIZE.into(),
    ]
}

/// `-drive` value attaching a qcow2 disk without exposing it to the guest
pub fn drive_argument(disk: &Path) -> OsString {
    let mut drive = OsString::from("if=none,format=qcow2,file=");
    drive.push(disk.as_os_str());
    drive
}

/// Snapshot plugin argument: capture state at `start_address`
pub fn snapshot_plugin_argument(plugin: &Path, start_address: u64) -> OsString {
    let mut argument = plugin.as_os_str().to_owned();
    argument.push(format!(",addr={start_address:#x}"));
    argument
}

/// Fault plugin argument for one worker partition
pub fn fault_plugin_argument(plugin: &Path, config: &CampaignConfig, spec: &WorkerSpec) -> OsString {
    let mut argument = plugin.as_os_str().to_owned();
    argument.push(format!(
        ",fault_window={},fault_offset={},fault_step={},end_addr={:#x},error_addr={:#x}\
         ,timeout={},faulted_addr={:#x},num_fault={},strict={},fault_model={}",
        config.fault_window,
        spec.offset,
        spec.step,
        config.end_address,
        config.error_address,
        config.insn_timeout,
        config.fault_address,
        config.num_fault,
        if config.strict { "on" } else { "off" },
        config.fault_model,
    ));

    if config.fault_model == FaultModel::Set {
        argument.push(format!(",set_value={}", config.set_value));
    }
    argument
}

/// Emulator arguments running the guest up to the checkpoint address
pub fn snapshot_args(config: &CampaignConfig, emulator: &EmulatorConfig, disk: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        config.boot_mode.flag().into(),
        config.program.as_os_str().to_owned(),
        "-plugin".into(),
        snapshot_plugin_argument(&emulator.qemu_snapshot_plugin_path, config.start_address),
        "-drive".into(),
        drive_argument(disk),
        "-nographic".into(),
    ];
    args.extend(emulator.extra_options().into_iter().map(OsString::from));
    args
}

/// Emulator arguments resuming one worker from the checkpoint
pub fn worker_args(config: &CampaignConfig, emulator: &EmulatorConfig, spec: &WorkerSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-display".into(),
        "none".into(),
        "-serial".into(),
        "none".into(),
        config.boot_mode.flag().into(),
        config.program.as_os_str().to_owned(),
        "-drive".into(),
        drive_argument(&spec.disk_path),
        "-loadvm".into(),
        SNAPSHOT_NAME.into(),
        "-d".into(),
        "plugin".into(),
        "-plugin".into(),
        fault_plugin_argument(&emulator.qemu_fault_plugin_path, config, spec),
    ];
    args.extend(emulator.extra_options().into_iter().map(OsString::from));
    args
}
