//! Campaign driver
//!
//! Prepares the checkpoint, starts one worker per partition and drains the
//! shared event channel until every worker has reported `Done`, or has been
//! stopped for missing the deadline or going silent. The
//! aggregator lives on this task only; workers talk to it exclusively
//! through the channel.

use tokio::sync::mpsc;
use tokio::time::Instant;

use shared::{logging, process_debug, process_error, process_info, process_warn, ProcessId, WorkerMessage};

use crate::{
    config::{CampaignConfig, RunnerSettings},
    core::{planner::disk_path, AggregateUpdate, Aggregator, CampaignPlan, CampaignReport, CampaignStatus, Watchdog},
    error::OrchestratorResult,
    traits::{CampaignObserver, DiskManager, ProcessManager},
};

/// What woke the event loop
enum LoopStep {
    Message(Option<WorkerMessage>),
    Tick,
    Interrupted,
}

/// One fault-injection campaign over injected services
pub struct Campaign<D, P, O>
where
    D: DiskManager + 'static,
    P: ProcessManager + 'static,
    O: CampaignObserver,
{
    config: CampaignConfig,
    settings: RunnerSettings,
    plan: CampaignPlan,

    /// Injected services
    disk_manager: D,
    process_manager: P,
    observer: O,

    /// Interruption signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<D, P, O> Campaign<D, P, O>
where
    D: DiskManager + 'static,
    P: ProcessManager + 'static,
    O: CampaignObserver,
{
    /// Create new campaign with injected dependencies
    pub fn new(
        config: CampaignConfig,
        settings: RunnerSettings,
        plan: CampaignPlan,
        disk_manager: D,
        process_manager: P,
        observer: O,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Self {
            config,
            settings,
            plan,
            disk_manager,
            process_manager,
            observer,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Sender that interrupts a running campaign
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn plan(&self) -> &CampaignPlan {
        &self.plan
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Build the checkpointed base disk and one copy per worker
    ///
    /// Any failure here is fatal: no worker may start without a checkpoint.
    pub async fn prepare(&self) -> OrchestratorResult<()> {
        let specs = self.plan.worker_specs(&self.settings.work_dir);
        let base_disk = disk_path(&self.settings.work_dir, 0);

        self.disk_manager.create_base_disk(&base_disk).await?;
        self.process_manager.run_snapshot(&base_disk).await?;
        logging::log_success(ProcessId::current(), "Successfully created snapshot for the experiment");

        self.disk_manager.replicate_disk(&base_disk, &specs).await?;
        Ok(())
    }

    /// Run every worker and aggregate their events into a report
    pub async fn run(&mut self) -> OrchestratorResult<CampaignReport> {
        let specs = self.plan.worker_specs(&self.settings.work_dir);
        let (events_tx, mut events_rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let mut aggregator = Aggregator::new(self.plan.total_campaign, self.plan.worker_count);

        logging::log_startup(
            ProcessId::current(),
            &format!(
                "{} runs on {} emulator instances",
                self.plan.total_campaign, self.plan.worker_count
            ),
        );

        let begin = Instant::now();
        for spec in &specs {
            match self.process_manager.spawn_worker(spec, events_tx.clone()).await {
                Ok(handle) => {
                    process_debug!(ProcessId::Worker(handle.worker_id), "Started (PID: {:?})", handle.pid);
                }
                Err(e) => {
                    logging::log_error(ProcessId::current(), "Worker spawn", &e);
                    if let Err(stop_error) = self.process_manager.stop_all().await {
                        logging::log_error(ProcessId::current(), "Stopping workers", &stop_error);
                    }
                    return Err(e);
                }
            }
        }
        // Only the workers' readers hold senders from here on
        drop(events_tx);

        let mut watchdog = Watchdog::new(
            self.plan.worker_count,
            begin,
            self.settings.idle_timeout,
            self.settings.shutdown_grace,
        );
        let mut deadline = self.settings.worker_timeout.map(|timeout| begin + timeout);
        let mut interrupted = false;

        while !aggregator.is_finished() {
            let pending = aggregator.unfinished_workers();
            let now = Instant::now();
            if watchdog.gave_up_on_all(&pending, now) {
                process_error!(ProcessId::current(), "❌ Workers {:?} never reported back", pending);
                break;
            }

            let wake = match (deadline, watchdog.next_wake(&pending, now)) {
                (Some(deadline), Some(check)) => Some(deadline.min(check)),
                (deadline, check) => deadline.or(check),
            };

            let step = tokio::select! {
                biased;
                message = events_rx.recv() => LoopStep::Message(message),
                _ = self.shutdown_rx.recv(), if !interrupted => LoopStep::Interrupted,
                _ = sleep_until(wake) => LoopStep::Tick,
            };

            match step {
                LoopStep::Message(Some(message)) => {
                    watchdog.touch(message.worker_id, Instant::now());
                    self.dispatch(&mut aggregator, message);
                }
                LoopStep::Message(None) => {
                    process_warn!(
                        ProcessId::current(),
                        "⚠️ Event channel closed with workers still pending: {:?}",
                        aggregator.unfinished_workers()
                    );
                    break;
                }
                LoopStep::Interrupted => {
                    interrupted = true;
                    deadline = None;
                    logging::log_shutdown(ProcessId::current(), "campaign interrupted");
                    self.drain_queued(&mut events_rx, &mut aggregator, &mut watchdog);
                    let pending = aggregator.unfinished_workers();
                    self.stop_workers(&pending, &mut watchdog).await;
                }
                LoopStep::Tick => {
                    self.drain_queued(&mut events_rx, &mut aggregator, &mut watchdog);
                    let now = Instant::now();
                    let pending = aggregator.unfinished_workers();

                    if deadline.is_some_and(|deadline| now >= deadline) {
                        deadline = None;
                        process_warn!(ProcessId::current(), "⏰ Worker deadline passed, stopping unfinished workers");
                        self.stop_workers(&pending, &mut watchdog).await;
                    } else {
                        let idle = watchdog.idle(&pending, now);
                        if !idle.is_empty() {
                            process_warn!(
                                ProcessId::current(),
                                "⏰ Workers {:?} silent for {:?}, stopping them",
                                idle,
                                self.settings.idle_timeout
                            );
                            self.stop_workers(&idle, &mut watchdog).await;
                        }
                    }
                }
            }
        }

        self.join_workers().await;
        let elapsed = begin.elapsed();
        process_info!(ProcessId::current(), "⏱️ All faults injected in {:.3}s", elapsed.as_secs_f64());

        let status = Self::final_status(&aggregator, &watchdog);
        Ok(CampaignReport::new(
            aggregator.counters(),
            aggregator.total_campaign(),
            aggregator.progress(),
            aggregator.expected_workers(),
            aggregator.completed_workers(),
            status,
            elapsed,
        ))
    }

    /// Route one aggregated message to the observer
    fn dispatch(&mut self, aggregator: &mut Aggregator, message: WorkerMessage) {
        match aggregator.apply(message) {
            AggregateUpdate::Progress { done, total } => self.observer.on_progress(done, total),
            AggregateUpdate::RawLog { worker_id, line } => self.observer.on_raw_log(worker_id, &line),
            AggregateUpdate::WorkerDone { worker_id, remaining } => {
                process_debug!(ProcessId::Worker(worker_id), "Done, {} workers remaining", remaining);
            }
            AggregateUpdate::Ignored => {
                process_debug!(ProcessId::current(), "Ignoring repeated or unknown Done");
            }
            AggregateUpdate::Classified | AggregateUpdate::ProgressSaturated => {}
        }
    }

    /// Apply everything already queued, so workers that finished are not stopped
    fn drain_queued(
        &mut self,
        events_rx: &mut mpsc::Receiver<WorkerMessage>,
        aggregator: &mut Aggregator,
        watchdog: &mut Watchdog,
    ) {
        let now = Instant::now();
        while let Ok(message) = events_rx.try_recv() {
            watchdog.touch(message.worker_id, now);
            self.dispatch(aggregator, message);
        }
    }

    /// Stop the given workers and give each the shutdown grace to report back
    async fn stop_workers(&self, worker_ids: &[u32], watchdog: &mut Watchdog) {
        let targets: Vec<u32> = worker_ids
            .iter()
            .copied()
            .filter(|id| !watchdog.is_stopped(*id))
            .collect();
        if targets.is_empty() {
            return;
        }

        if let Err(e) = self.process_manager.stop_workers(&targets).await {
            logging::log_error(ProcessId::current(), "Stopping workers", &e);
        }

        let now = Instant::now();
        for worker_id in targets {
            watchdog.mark_stopped(worker_id, now);
        }
    }

    /// Wait for the pool to exit, killing whatever outlives the grace period
    async fn join_workers(&self) {
        match tokio::time::timeout(self.settings.shutdown_grace, self.process_manager.wait_all()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => logging::log_error(ProcessId::current(), "Joining workers", &e),
            Err(_) => {
                process_warn!(ProcessId::current(), "⚠️ Workers still running after the grace period, killing them");
                if let Err(e) = self.process_manager.stop_all().await {
                    logging::log_error(ProcessId::current(), "Stopping workers", &e);
                }
            }
        }
    }

    /// Complete only when every worker finished on its own
    fn final_status(aggregator: &Aggregator, watchdog: &Watchdog) -> CampaignStatus {
        let mut unfinished = aggregator.unfinished_workers();
        unfinished.extend(watchdog.stopped());
        unfinished.sort_unstable();
        unfinished.dedup();

        if unfinished.is_empty() {
            CampaignStatus::Complete
        } else {
            CampaignStatus::Partial {
                unfinished_workers: unfinished,
            }
        }
    }
}

/// Sleep until `wake`, or forever when there is nothing to wait for
async fn sleep_until(wake: Option<Instant>) {
    match wake {
        Some(instant) => tokio::time::sleep_until(instant).await,
        None => std::future::pending().await,
    }
}
