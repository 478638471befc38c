//! Test fixtures and data for campaign tests
//!
//! This module provides consistent test data used across all test suites.

use orchestrator::{BootMode, CampaignConfig};
use shared::FaultModel;
use std::path::PathBuf;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Standard campaign shape: C(10, 2) = 45 runs
    pub const FAULT_WINDOW: u32 = 10;
    pub const NUM_FAULT: u32 = 2;
    pub const TOTAL_CAMPAIGN: u64 = 45;

    /// Addresses taken from the verifyPin sample target
    pub const START_ADDRESS: u64 = 0x8000_0100;
    pub const FAULT_ADDRESS: u64 = 0x8000_01a4;
    pub const END_ADDRESS: u64 = 0x8000_01c0;
    pub const ERROR_ADDRESS: u64 = 0x8000_01f0;

    pub const WORK_DIR: &'static str = "experiment_disks";

    pub fn campaign_config() -> CampaignConfig {
        CampaignConfig {
            program: PathBuf::from("verifyPin.elf"),
            boot_mode: BootMode::Kernel,
            fault_window: Self::FAULT_WINDOW,
            num_fault: Self::NUM_FAULT,
            start_address: Self::START_ADDRESS,
            fault_address: Self::FAULT_ADDRESS,
            end_address: Self::END_ADDRESS,
            error_address: Self::ERROR_ADDRESS,
            insn_timeout: 1000,
            fault_model: FaultModel::Skip,
            set_value: 0,
            strict: false,
        }
    }

    /// Diagnostic stream of a worker that found one fault
    pub fn single_fault_stream() -> Vec<&'static str> {
        vec!["step", "fault"]
    }

    /// Diagnostic stream mixing every outcome with plugin chatter
    pub fn mixed_stream() -> Vec<&'static str> {
        vec![
            "plugin: fault window 10",
            "step",
            "fault",
            "step",
            "endaddr",
            "step",
            "timeout",
            "step",
            "erroraddr",
        ]
    }
}
