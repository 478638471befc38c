//! Core campaign logic
//!
//! This module contains pure logic with no I/O dependencies: planning,
//! aggregation, worker liveness, reporting and command-line construction. Everything here is
//! deterministic and easily testable.

pub mod aggregator;
pub mod launch;
pub mod planner;
pub mod report;
pub mod watchdog;

pub use aggregator::{AggregateUpdate, Aggregator, Counters};
pub use planner::{CampaignPlan, WorkerSpec};
pub use report::{CampaignReport, CampaignStatus};
pub use watchdog::Watchdog;
