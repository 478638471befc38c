//! Campaign-wide aggregation of worker events
//!
//! The aggregator is owned by the single consumer of the event channel, so
//! its counters need no synchronisation. Applying events is commutative
//! across workers: only counts and the set of finished workers matter.

use serde::{Deserialize, Serialize};
use shared::{WorkerEvent, WorkerMessage};
use std::collections::BTreeSet;

/// Outcome counters for a campaign
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub fault_count: u64,
    pub crash_count: u64,
    pub timeout_count: u64,
    pub end_reached_count: u64,
}

impl Counters {
    /// Sum of the four classification counts
    pub fn classified_total(&self) -> u64 {
        self.fault_count + self.crash_count + self.timeout_count + self.end_reached_count
    }

    /// Counts in reporting order
    pub fn rows(&self) -> [(&'static str, u64); 4] {
        [
            ("Fault", self.fault_count),
            ("Crash", self.crash_count),
            ("Timeout", self.timeout_count),
            ("Reach end", self.end_reached_count),
        ]
    }
}

/// What applying one message changed, for the caller to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateUpdate {
    /// Progress moved to `done` out of `total`
    Progress { done: u64, total: u64 },
    /// Progress was already at the campaign total
    ProgressSaturated,
    /// A classification counter moved
    Classified,
    /// Free-form line to surface
    RawLog { worker_id: u32, line: String },
    /// A worker finished; `remaining` workers are still running
    WorkerDone { worker_id: u32, remaining: u32 },
    /// Done from a worker already finished or outside the pool
    Ignored,
}

/// Single-owner campaign state
#[derive(Debug, Clone)]
pub struct Aggregator {
    counters: Counters,
    progress: u64,
    total_campaign: u64,
    expected_workers: u32,
    completed: BTreeSet<u32>,
}

impl Aggregator {
    pub fn new(total_campaign: u64, expected_workers: u32) -> Self {
        Self {
            counters: Counters::default(),
            progress: 0,
            total_campaign,
            expected_workers,
            completed: BTreeSet::new(),
        }
    }

    /// Fold one message into the campaign state
    pub fn apply(&mut self, message: WorkerMessage) -> AggregateUpdate {
        let WorkerMessage { worker_id, event } = message;

        match event {
            WorkerEvent::Step => {
                if self.progress >= self.total_campaign {
                    return AggregateUpdate::ProgressSaturated;
                }
                self.progress += 1;
                AggregateUpdate::Progress {
                    done: self.progress,
                    total: self.total_campaign,
                }
            }
            WorkerEvent::Fault => {
                self.counters.fault_count += 1;
                AggregateUpdate::Classified
            }
            WorkerEvent::Timeout => {
                self.counters.timeout_count += 1;
                AggregateUpdate::Classified
            }
            WorkerEvent::EndAddrReached => {
                self.counters.end_reached_count += 1;
                AggregateUpdate::Classified
            }
            WorkerEvent::ErrorAddrReached => {
                self.counters.crash_count += 1;
                AggregateUpdate::Classified
            }
            WorkerEvent::Done => {
                if worker_id >= self.expected_workers || !self.completed.insert(worker_id) {
                    return AggregateUpdate::Ignored;
                }
                AggregateUpdate::WorkerDone {
                    worker_id,
                    remaining: self.expected_workers - self.completed_workers(),
                }
            }
            WorkerEvent::RawLog(line) => AggregateUpdate::RawLog { worker_id, line },
        }
    }

    /// True once every worker has reported `Done`
    ///
    /// Progress reaching the campaign total does not end aggregation;
    /// classification events may still be in flight.
    pub fn is_finished(&self) -> bool {
        self.completed_workers() == self.expected_workers
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn total_campaign(&self) -> u64 {
        self.total_campaign
    }

    pub fn expected_workers(&self) -> u32 {
        self.expected_workers
    }

    pub fn completed_workers(&self) -> u32 {
        self.completed.len() as u32
    }

    /// Workers that have not reported `Done`, in index order
    pub fn unfinished_workers(&self) -> Vec<u32> {
        (0..self.expected_workers)
            .filter(|id| !self.completed.contains(id))
            .collect()
    }
}
