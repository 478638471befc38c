//! Per-worker liveness tracking
//!
//! A running worker prints at least one line per fault configuration, so a
//! worker silent for longer than the idle timeout is considered hung. Once
//! stopped, a worker gets the shutdown grace to deliver its `Done` before
//! the campaign stops waiting for it.

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Watchdog {
    idle_timeout: Duration,
    grace: Duration,
    last_seen: Vec<Instant>,
    stopped_at: Vec<Option<Instant>>,
}

impl Watchdog {
    /// Every worker starts out as seen at `now`
    pub fn new(workers: u32, now: Instant, idle_timeout: Duration, grace: Duration) -> Self {
        Self {
            idle_timeout,
            grace,
            last_seen: vec![now; workers as usize],
            stopped_at: vec![None; workers as usize],
        }
    }

    /// Record output from `worker_id`
    pub fn touch(&mut self, worker_id: u32, now: Instant) {
        if let Some(seen) = self.last_seen.get_mut(worker_id as usize) {
            *seen = now;
        }
    }

    /// Record that `worker_id` was asked to stop; the first request counts
    pub fn mark_stopped(&mut self, worker_id: u32, now: Instant) {
        if let Some(slot) = self.stopped_at.get_mut(worker_id as usize) {
            slot.get_or_insert(now);
        }
    }

    pub fn is_stopped(&self, worker_id: u32) -> bool {
        matches!(self.stopped_at.get(worker_id as usize), Some(Some(_)))
    }

    /// Workers that were asked to stop, in index order
    pub fn stopped(&self) -> Vec<u32> {
        (0..self.stopped_at.len() as u32)
            .filter(|id| self.is_stopped(*id))
            .collect()
    }

    /// Pending workers silent for the idle timeout and not stopped yet
    pub fn idle(&self, pending: &[u32], now: Instant) -> Vec<u32> {
        pending
            .iter()
            .copied()
            .filter(|id| !self.is_stopped(*id))
            .filter(|id| {
                self.last_seen
                    .get(*id as usize)
                    .is_some_and(|seen| now >= *seen + self.idle_timeout)
            })
            .collect()
    }

    /// True when every pending worker was stopped and its grace ran out
    pub fn gave_up_on_all(&self, pending: &[u32], now: Instant) -> bool {
        pending.iter().all(|id| match self.stopped_at.get(*id as usize) {
            Some(Some(stopped)) => now >= *stopped + self.grace,
            _ => false,
        })
    }

    /// Earliest instant at which `idle` or `gave_up_on_all` can change
    ///
    /// Stopped workers whose grace already ran out no longer schedule a
    /// wake-up; an overdue idle check is returned as is.
    pub fn next_wake(&self, pending: &[u32], now: Instant) -> Option<Instant> {
        pending
            .iter()
            .filter_map(|id| {
                let index = *id as usize;
                match self.stopped_at.get(index)? {
                    Some(stopped) => Some(*stopped + self.grace).filter(|give_up| *give_up > now),
                    None => self.last_seen.get(index).map(|seen| *seen + self.idle_timeout),
                }
            })
            .min()
    }
}
