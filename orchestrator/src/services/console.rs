//! Console observer
//!
//! Prints worker log lines verbatim on stdout and logs progress in tenths
//! of the campaign.

use std::io::Write;

use crate::traits::CampaignObserver;
use shared::{logging, ProcessId};

/// Real observer writing to the terminal
pub struct ConsoleObserver<W: Write + Send = std::io::Stdout> {
    out: W,
    last_decile: u64,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out, last_decile: 0 }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> CampaignObserver for ConsoleObserver<W> {
    fn on_raw_log(&mut self, _worker_id: u32, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }

    fn on_progress(&mut self, done: u64, total: u64) {
        if total == 0 {
            return;
        }
        let decile = done * 10 / total;
        if decile > self.last_decile {
            self.last_decile = decile;
            logging::log_progress(
                ProcessId::current(),
                "Progress",
                &format!("{done}/{total} ({}%)", decile * 10),
            );
        }
    }
}
