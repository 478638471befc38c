//! Integration tests for the campaign driver
//!
//! These tests drive `Campaign` through mockall-generated services. Worker
//! streams are replayed through the real diagnostic line reader.

use mockall::Sequence;
use orchestrator::{
    CampaignStatus, MockCampaignObserver, MockDiskManager, MockProcessManager, OrchestratorError, RunnerSettings,
    WorkerHandle,
};
use shared::{WorkerEvent, WorkerMessage};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod common;
use common::{CampaignBuilder, TestFixtures, TestHelpers};

fn base_disk() -> PathBuf {
    Path::new(TestFixtures::WORK_DIR).join("disk1.qcow2")
}

/// Preparation runs disk creation, snapshot and replication in that order
#[tokio::test]
async fn test_prepare_builds_checkpoint_before_replicating() {
    // Arrange
    let mut seq = Sequence::new();
    let mut disk_manager = MockDiskManager::new();
    let mut process_manager = MockProcessManager::new();

    disk_manager
        .expect_create_base_disk()
        .withf(|path| path == base_disk().as_path())
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    process_manager
        .expect_run_snapshot()
        .withf(|path| path == base_disk().as_path())
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    disk_manager
        .expect_replicate_disk()
        .withf(|source, specs| source == base_disk().as_path() && specs.len() == 3)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let campaign = CampaignBuilder::new()
        .with_disk_manager(disk_manager)
        .with_process_manager(process_manager)
        .build();

    // Act
    let result = campaign.prepare().await;

    // Assert
    assert!(result.is_ok());
}

/// A failed snapshot aborts preparation before any disk is copied
#[tokio::test]
async fn test_prepare_stops_on_snapshot_failure() {
    // Arrange
    let mut disk_manager = MockDiskManager::new();
    let mut process_manager = MockProcessManager::new();

    disk_manager.expect_create_base_disk().times(1).returning(|_| Ok(()));
    process_manager.expect_run_snapshot().times(1).returning(|_| {
        Err(OrchestratorError::SnapshotFailed {
            message: "exited with status 1".to_string(),
        })
    });
    disk_manager.expect_replicate_disk().times(0);

    let campaign = CampaignBuilder::new()
        .with_disk_manager(disk_manager)
        .with_process_manager(process_manager)
        .build();

    // Act
    let result = campaign.prepare().await;

    // Assert
    assert!(matches!(result, Err(OrchestratorError::SnapshotFailed { .. })));
}

/// Without a base disk the snapshot is never attempted
#[tokio::test]
async fn test_prepare_stops_on_disk_creation_failure() {
    // Arrange
    let mut disk_manager = MockDiskManager::new();
    let mut process_manager = MockProcessManager::new();

    disk_manager.expect_create_base_disk().times(1).returning(|_| {
        Err(OrchestratorError::DiskCreationFailed {
            message: "qemu-img exited with status 1".to_string(),
        })
    });
    process_manager.expect_run_snapshot().times(0);
    disk_manager.expect_replicate_disk().times(0);

    let campaign = CampaignBuilder::new()
        .with_disk_manager(disk_manager)
        .with_process_manager(process_manager)
        .build();

    // Act
    let result = campaign.prepare().await;

    // Assert
    assert!(matches!(result, Err(OrchestratorError::DiskCreationFailed { .. })));
}

/// Four workers over a window of four, one fault each
#[tokio::test]
async fn test_one_fault_per_worker_reports_full_fault_share() {
    // Arrange
    let streams = vec![TestFixtures::single_fault_stream(); 4];
    let mut campaign = CampaignBuilder::new()
        .with_config(|config| {
            config.fault_window = 4;
            config.num_fault = 1;
        })
        .with_worker_count(4)
        .with_process_manager(TestHelpers::scripted_process_manager(streams))
        .build();

    // Act
    let report = campaign.run().await.expect("campaign runs");

    // Assert
    TestHelpers::assert_counters(&report, 4, 0, 0, 0);
    assert_eq!(report.total_campaign, 4);
    assert_eq!(report.progress, 4);
    assert_eq!(report.completed_workers, 4);
    assert_eq!(report.status, CampaignStatus::Complete);

    let table = report.render_table();
    let fault_row = table.lines().find(|line| line.contains("Fault")).expect("fault row");
    assert!(fault_row.contains("100.000 %"));
    let crash_row = table.lines().find(|line| line.contains("Crash")).expect("crash row");
    assert!(crash_row.contains("0.000 %"));
}

/// Every outcome token lands in its counter, whichever worker sent it
#[tokio::test]
async fn test_mixed_streams_are_classified() {
    // Arrange
    let streams = vec![TestFixtures::mixed_stream(); 3];
    let mut campaign = CampaignBuilder::new()
        .with_process_manager(TestHelpers::scripted_process_manager(streams))
        .build();

    // Act
    let report = campaign.run().await.expect("campaign runs");

    // Assert
    TestHelpers::assert_counters(&report, 3, 3, 3, 3);
    assert_eq!(report.classified_total, 12);
    assert_eq!(report.total_campaign, TestFixtures::TOTAL_CAMPAIGN);
    assert_eq!(report.progress, 12);
    assert!(report.status.is_complete());
}

/// Lines that are not sentinels reach the observer verbatim
#[tokio::test]
async fn test_raw_lines_pass_through_to_observer() {
    // Arrange
    let mut observer = MockCampaignObserver::new();
    observer
        .expect_on_raw_log()
        .withf(|_, line| line == "plugin: fault window 10")
        .times(3)
        .returning(|_, _| ());
    observer
        .expect_on_progress()
        .withf(|_, total| *total == TestFixtures::TOTAL_CAMPAIGN)
        .times(12)
        .returning(|_, _| ());

    let streams = vec![TestFixtures::mixed_stream(); 3];
    let mut campaign = CampaignBuilder::new()
        .with_process_manager(TestHelpers::scripted_process_manager(streams))
        .with_observer(observer)
        .build();

    // Act
    let result = campaign.run().await;

    // Assert
    assert!(result.is_ok());
}

/// Progress saturates at the campaign size but the run waits for Done
#[tokio::test]
async fn test_saturated_progress_still_waits_for_done() {
    // Arrange: C(3, 3) = 1 run, one worker that over-reports steps
    let streams = vec![vec!["step", "step", "step", "fault", "fault"]];
    let mut campaign = CampaignBuilder::new()
        .with_config(|config| {
            config.fault_window = 3;
            config.num_fault = 3;
        })
        .with_worker_count(8)
        .with_process_manager(TestHelpers::scripted_process_manager(streams))
        .build();

    // Act
    let report = campaign.run().await.expect("campaign runs");

    // Assert
    assert_eq!(report.worker_count, 1);
    assert_eq!(report.progress, 1);
    TestHelpers::assert_counters(&report, 2, 0, 0, 0);
    assert!(report.status.is_complete());
}

/// A worker that never finishes is stopped at the deadline
#[tokio::test]
async fn test_worker_deadline_yields_partial_results() {
    // Arrange
    let streams = vec![TestFixtures::single_fault_stream(); 3];
    let mut campaign = CampaignBuilder::new()
        .with_settings(|settings| settings.with_worker_timeout(Some(Duration::from_millis(100))))
        .with_process_manager(TestHelpers::hung_process_manager(streams, 1, false))
        .build();

    // Act
    let report = tokio::time::timeout(Duration::from_secs(5), campaign.run())
        .await
        .expect("deadline bounds the campaign")
        .expect("campaign runs");

    // Assert
    TestHelpers::assert_counters(&report, 2, 0, 0, 0);
    assert_eq!(report.progress, 3);
    assert_eq!(report.completed_workers, 2);
    assert_eq!(
        report.status,
        CampaignStatus::Partial {
            unfinished_workers: vec![1]
        }
    );
}

/// A stopped worker that still reports Done did not finish its partition
#[tokio::test]
async fn test_stopped_worker_counts_as_unfinished() {
    // Arrange
    let streams = vec![TestFixtures::single_fault_stream(); 3];
    let mut campaign = CampaignBuilder::new()
        .with_settings(|settings| {
            settings
                .with_worker_timeout(Some(Duration::from_millis(100)))
                .with_shutdown_grace(Duration::from_secs(2))
        })
        .with_process_manager(TestHelpers::hung_process_manager(streams, 1, true))
        .build();

    // Act
    let report = tokio::time::timeout(Duration::from_secs(5), campaign.run())
        .await
        .expect("deadline bounds the campaign")
        .expect("campaign runs");

    // Assert
    assert_eq!(report.completed_workers, 3);
    assert_eq!(
        report.status,
        CampaignStatus::Partial {
            unfinished_workers: vec![1]
        }
    );
}

/// Interruption stops unfinished workers and keeps what was gathered
#[tokio::test]
async fn test_interrupt_yields_partial_results() {
    // Arrange
    let streams = vec![TestFixtures::single_fault_stream(); 3];
    let mut campaign = CampaignBuilder::new()
        .with_process_manager(TestHelpers::hung_process_manager(streams, 2, true))
        .build();
    let shutdown = campaign.get_shutdown_sender();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown.send(()).await;
    });

    // Act
    let report = tokio::time::timeout(Duration::from_secs(5), campaign.run())
        .await
        .expect("interrupt bounds the campaign")
        .expect("campaign runs");

    // Assert
    TestHelpers::assert_counters(&report, 2, 0, 0, 0);
    assert_eq!(
        report.status,
        CampaignStatus::Partial {
            unfinished_workers: vec![2]
        }
    );
}

/// Streams that close without Done end the loop instead of hanging it
#[tokio::test]
async fn test_closed_channel_without_done_is_partial() {
    // Arrange
    let mut process_manager = MockProcessManager::new();
    process_manager.expect_spawn_worker().times(3).returning(|spec, events| {
        let worker_id = spec.id;
        tokio::spawn(async move {
            let _ = events
                .send(WorkerMessage::new(worker_id, WorkerEvent::Fault))
                .await;
            if worker_id != 0 {
                let _ = events.send(WorkerMessage::done(worker_id)).await;
            }
        });
        Ok(WorkerHandle { worker_id, pid: None })
    });
    TestHelpers::allow_pool_lifecycle(&mut process_manager);

    let mut campaign = CampaignBuilder::new().with_process_manager(process_manager).build();

    // Act
    let report = tokio::time::timeout(Duration::from_secs(5), campaign.run())
        .await
        .expect("closed channel ends the campaign")
        .expect("campaign runs");

    // Assert
    TestHelpers::assert_counters(&report, 3, 0, 0, 0);
    assert_eq!(
        report.status,
        CampaignStatus::Partial {
            unfinished_workers: vec![0]
        }
    );
}

/// A worker that cannot start aborts the campaign and stops the others
#[tokio::test]
async fn test_spawn_failure_stops_pool() {
    // Arrange
    let mut process_manager = MockProcessManager::new();
    process_manager.expect_spawn_worker().times(2).returning(|spec, _events| {
        if spec.id == 1 {
            Err(OrchestratorError::WorkerSpawnFailed {
                worker_id: 1,
                message: "No such file or directory".to_string(),
            })
        } else {
            Ok(WorkerHandle {
                worker_id: spec.id,
                pid: None,
            })
        }
    });
    process_manager.expect_stop_all().times(1).returning(|| Ok(()));
    process_manager.expect_wait_all().times(0);

    let mut campaign = CampaignBuilder::new().with_process_manager(process_manager).build();

    // Act
    let result = campaign.run().await;

    // Assert
    assert!(matches!(
        result,
        Err(OrchestratorError::WorkerSpawnFailed { worker_id: 1, .. })
    ));
}

/// Default settings stop a silent worker; slow but chatty workers keep running
#[tokio::test(start_paused = true)]
async fn test_default_settings_stop_silent_worker() {
    // Arrange: worker 0 reports every minute for ten minutes, worker 1 hangs
    let release = std::sync::Arc::new(tokio::sync::Notify::new());
    let spawn_release = release.clone();

    let mut process_manager = MockProcessManager::new();
    process_manager.expect_spawn_worker().times(3).returning(move |spec, events| {
        let worker_id = spec.id;
        let release = spawn_release.clone();
        tokio::spawn(async move {
            match worker_id {
                0 => {
                    for _ in 0..10 {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        let _ = events.send(WorkerMessage::new(worker_id, WorkerEvent::Step)).await;
                    }
                }
                1 => {
                    let _ = events.send(WorkerMessage::new(worker_id, WorkerEvent::Step)).await;
                    release.notified().await;
                    return;
                }
                _ => {
                    let _ = events.send(WorkerMessage::new(worker_id, WorkerEvent::Fault)).await;
                }
            }
            let _ = events.send(WorkerMessage::done(worker_id)).await;
        });
        Ok(WorkerHandle { worker_id, pid: None })
    });
    process_manager
        .expect_stop_workers()
        .withf(|ids| ids == [1])
        .times(1)
        .returning(|_| Ok(()));
    TestHelpers::allow_pool_lifecycle(&mut process_manager);

    let mut campaign = CampaignBuilder::new()
        .with_settings(|_| RunnerSettings::new())
        .with_process_manager(process_manager)
        .build();

    // Act
    let report = tokio::time::timeout(Duration::from_secs(3600), campaign.run())
        .await
        .expect("silent worker is given up on")
        .expect("campaign runs");

    // Assert
    assert_eq!(report.progress, 11);
    assert_eq!(report.completed_workers, 2);
    assert_eq!(
        report.status,
        CampaignStatus::Partial {
            unfinished_workers: vec![1]
        }
    );
    drop(release);
}

/// Output already delivered when the deadline passes is not lost to the stop
#[tokio::test]
async fn test_output_queued_before_deadline_counts_as_finished() {
    // Arrange: every worker's full stream is queued before the loop starts
    let mut process_manager = MockProcessManager::new();
    process_manager.expect_spawn_worker().times(3).returning(|spec, events| {
        let worker_id = spec.id;
        for event in [WorkerEvent::Step, WorkerEvent::Fault, WorkerEvent::Done] {
            events
                .try_send(WorkerMessage::new(worker_id, event))
                .expect("channel has room");
        }
        Ok(WorkerHandle { worker_id, pid: None })
    });
    process_manager.expect_stop_workers().times(0);
    TestHelpers::allow_pool_lifecycle(&mut process_manager);

    let mut campaign = CampaignBuilder::new()
        .with_settings(|settings| settings.with_worker_timeout(Some(Duration::ZERO)))
        .with_process_manager(process_manager)
        .build();

    // Act
    let report = campaign.run().await.expect("campaign runs");

    // Assert
    TestHelpers::assert_counters(&report, 3, 0, 0, 0);
    assert_eq!(report.status, CampaignStatus::Complete);
}

/// A failing cleanup does not mask the spawn error
#[tokio::test]
async fn test_spawn_failure_reported_even_if_cleanup_fails() {
    // Arrange
    let mut process_manager = MockProcessManager::new();
    process_manager.expect_spawn_worker().times(1).returning(|_, _| {
        Err(OrchestratorError::WorkerSpawnFailed {
            worker_id: 0,
            message: "Permission denied".to_string(),
        })
    });
    process_manager
        .expect_stop_all()
        .times(1)
        .returning(|| Err(OrchestratorError::process("cannot kill worker 0")));

    let mut campaign = CampaignBuilder::new().with_process_manager(process_manager).build();

    // Act
    let result = campaign.run().await;

    // Assert
    assert!(matches!(
        result,
        Err(OrchestratorError::WorkerSpawnFailed { worker_id: 0, .. })
    ));
}

/// The plan is fixed at construction from the configured parallelism
#[test]
fn test_campaign_exposes_plan() {
    let campaign = CampaignBuilder::new().with_worker_count(2).build();

    assert_eq!(campaign.plan().total_campaign, TestFixtures::TOTAL_CAMPAIGN);
    assert_eq!(campaign.plan().worker_count, 2);
    assert_eq!(campaign.config().fault_window, TestFixtures::FAULT_WINDOW);
}
