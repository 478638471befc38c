//! Campaign results and their rendering

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;

use super::aggregator::Counters;

/// How the campaign ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Every worker ran to the end of its partition
    Complete,
    /// Some workers were stopped or never reported back
    Partial { unfinished_workers: Vec<u32> },
}

impl CampaignStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, CampaignStatus::Complete)
    }
}

/// Final state of a campaign, read once for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub counters: Counters,
    pub classified_total: u64,
    pub total_campaign: u64,
    pub progress: u64,
    pub worker_count: u32,
    pub completed_workers: u32,
    #[serde(flatten)]
    pub status: CampaignStatus,
    pub elapsed_seconds: f64,
    pub finished_at: String,
}

impl CampaignReport {
    pub fn new(
        counters: Counters,
        total_campaign: u64,
        progress: u64,
        worker_count: u32,
        completed_workers: u32,
        status: CampaignStatus,
        elapsed: Duration,
    ) -> Self {
        Self {
            counters,
            classified_total: counters.classified_total(),
            total_campaign,
            progress,
            worker_count,
            completed_workers,
            status,
            elapsed_seconds: elapsed.as_secs_f64(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Results table: every count as a share of the classified total
    pub fn render_table(&self) -> String {
        render_counters(&self.counters)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Percentage of `count` in `total`, three decimals, `-` when total is zero
pub fn format_percent(count: u64, total: u64) -> String {
    if total == 0 {
        return "-".to_string();
    }
    format!("{:.3} %", count as f64 / total as f64 * 100.0)
}

/// Render counters as the results table
///
/// Percentages are relative to the sum of the four counts, not to the
/// campaign size: strict mode can make the two differ.
pub fn render_counters(counters: &Counters) -> String {
    let total = counters.classified_total();
    let mut output = String::new();

    let _ = writeln!(output, "{:^36}", "Results");
    let _ = writeln!(output, "┌───────────┬──────────┬───────────┐");
    let _ = writeln!(output, "│ {:<9} │ {:>8} │ {:>9} │", "", "Total", "Percent");
    let _ = writeln!(output, "├───────────┼──────────┼───────────┤");
    for (label, count) in counters.rows() {
        let _ = writeln!(
            output,
            "│ {:<9} │ {:>8} │ {:>9} │",
            label,
            count,
            format_percent(count, total)
        );
    }
    let _ = writeln!(output, "│ {:<9} │ {:>8} │ {:>9} │", "", total, "");
    let _ = writeln!(output, "└───────────┴──────────┴───────────┘");

    output
}
