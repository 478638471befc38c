//! Test helpers and builder patterns for campaign tests
//!
//! Scripted mock process managers replay worker diagnostic streams through
//! the real line reader, so the wire protocol is exercised end to end.
use orchestrator::services::process_output_handler::forward_worker_output;
use orchestrator::{
    Campaign, CampaignConfig, CampaignPlan, CampaignReport, MockCampaignObserver, MockDiskManager, MockProcessManager,
    RunnerSettings, WorkerHandle,
};
use shared::{WorkerEvent, WorkerMessage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::fixtures::TestFixtures;

/// Type alias for test campaign with all mocks
pub type TestCampaign = Campaign<MockDiskManager, MockProcessManager, MockCampaignObserver>;

/// Builder pattern for creating test campaigns with sensible defaults
pub struct CampaignBuilder {
    config: CampaignConfig,
    settings: RunnerSettings,
    worker_count: usize,
    disk_manager: MockDiskManager,
    process_manager: MockProcessManager,
    observer: MockCampaignObserver,
}

impl CampaignBuilder {
    pub fn new() -> Self {
        Self {
            config: TestFixtures::campaign_config(),
            settings: RunnerSettings::new()
                .with_work_dir(PathBuf::from(TestFixtures::WORK_DIR))
                .with_shutdown_grace(Duration::from_millis(200)),
            worker_count: 3,
            disk_manager: MockDiskManager::new(),
            process_manager: MockProcessManager::new(),
            observer: TestHelpers::quiet_observer(),
        }
    }

    /// Set the host parallelism the plan is computed for
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_config<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut CampaignConfig),
    {
        setup(&mut self.config);
        self
    }

    pub fn with_settings<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(RunnerSettings) -> RunnerSettings,
    {
        self.settings = setup(self.settings);
        self
    }

    pub fn with_disk_manager(mut self, disk_manager: MockDiskManager) -> Self {
        self.disk_manager = disk_manager;
        self
    }

    pub fn with_process_manager(mut self, process_manager: MockProcessManager) -> Self {
        self.process_manager = process_manager;
        self
    }

    pub fn with_observer(mut self, observer: MockCampaignObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Build the campaign with all configured mocks
    pub fn build(self) -> TestCampaign {
        let plan = CampaignPlan::new(&self.config, self.worker_count).expect("valid test campaign");
        Campaign::new(
            self.config,
            self.settings,
            plan,
            self.disk_manager,
            self.process_manager,
            self.observer,
        )
    }
}

impl Default for CampaignBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Observer that accepts anything
    pub fn quiet_observer() -> MockCampaignObserver {
        let mut observer = MockCampaignObserver::new();
        observer.expect_on_raw_log().returning(|_, _| ()).times(0..);
        observer.expect_on_progress().returning(|_, _| ()).times(0..);
        observer
    }

    /// Joining and stopping the whole pool always succeeds
    pub fn allow_pool_lifecycle(process_manager: &mut MockProcessManager) {
        process_manager.expect_wait_all().returning(|| Ok(())).times(0..);
        process_manager.expect_stop_all().returning(|| Ok(())).times(0..);
    }

    fn stream_bytes(lines: &[&str]) -> Vec<u8> {
        lines.iter().map(|line| format!("{line}\n")).collect::<String>().into_bytes()
    }

    /// Worker `i` replays `streams[i]` then closes its stream
    pub fn scripted_process_manager(streams: Vec<Vec<&'static str>>) -> MockProcessManager {
        let mut process_manager = MockProcessManager::new();
        let count = streams.len();

        process_manager
            .expect_spawn_worker()
            .times(count)
            .returning(move |spec, events| {
                let bytes = Self::stream_bytes(&streams[spec.id as usize]);
                tokio::spawn(forward_worker_output(spec.id, std::io::Cursor::new(bytes), events));
                Ok(WorkerHandle {
                    worker_id: spec.id,
                    pid: None,
                })
            });
        process_manager.expect_stop_workers().returning(|_| Ok(())).times(0..);
        Self::allow_pool_lifecycle(&mut process_manager);
        process_manager
    }

    /// Like `scripted_process_manager`, but `hung_worker` emits one step and
    /// then stalls. With `release_on_stop` it closes its stream once stopped,
    /// as a killed emulator would; otherwise it never reports back.
    pub fn hung_process_manager(
        streams: Vec<Vec<&'static str>>,
        hung_worker: u32,
        release_on_stop: bool,
    ) -> MockProcessManager {
        let mut process_manager = MockProcessManager::new();
        let release = Arc::new(Notify::new());
        let spawn_release = release.clone();

        process_manager.expect_spawn_worker().returning(move |spec, events| {
            let worker_id = spec.id;
            if worker_id == hung_worker {
                let release = spawn_release.clone();
                tokio::spawn(async move {
                    let _ = events.send(WorkerMessage::new(worker_id, WorkerEvent::Step)).await;
                    release.notified().await;
                    let _ = events.send(WorkerMessage::done(worker_id)).await;
                });
            } else {
                let bytes = Self::stream_bytes(&streams[worker_id as usize]);
                tokio::spawn(forward_worker_output(worker_id, std::io::Cursor::new(bytes), events));
            }
            Ok(WorkerHandle { worker_id, pid: None })
        });

        process_manager.expect_stop_workers().returning(move |ids| {
            if release_on_stop && ids.contains(&hung_worker) {
                release.notify_one();
            }
            Ok(())
        });
        Self::allow_pool_lifecycle(&mut process_manager);
        process_manager
    }

    /// Assert the four counters in table order
    pub fn assert_counters(report: &CampaignReport, fault: u64, crash: u64, timeout: u64, end: u64) {
        assert_eq!(report.counters.fault_count, fault, "fault count");
        assert_eq!(report.counters.crash_count, crash, "crash count");
        assert_eq!(report.counters.timeout_count, timeout, "timeout count");
        assert_eq!(report.counters.end_reached_count, end, "end reached count");
    }
}
