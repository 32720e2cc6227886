//! End-to-end paper runs: synthetic feed, paper venues, full engine loop.

use std::time::Duration;
use tandem_bot::{AppConfig, Application};
use tempfile::TempDir;

/// Config tuned so a full open/close cycle fits in tens of milliseconds.
fn fast_paper_config(dir: &TempDir, cycle_cap: u32) -> AppConfig {
    let mut config = AppConfig::default();

    config.engine.cycle_cap = cycle_cap;
    config.engine.tick_interval_ms = 5;
    config.engine.close_retry_delay_ms = 0;
    config.engine.notify_every_cycles = 0;
    config.engine.emergency_stop_file = dir.path().join("STOP").to_string_lossy().into_owned();

    config.thresholds.entry_window_ms = 30;
    config.thresholds.burst_window_ms = 60_000;

    config.quota.ledger_dir = dir.path().join("quota").to_string_lossy().into_owned();
    config.recorder.data_dir = dir.path().join("bbo").to_string_lossy().into_owned();
    config.telemetry.metrics_port = 0;

    config.paper.latency_ms = 0;
    config.paper.feed_tick_interval_ms = 2;
    config.paper.pinched_ticks = 200;
    config.paper.normal_ticks = 5;

    config
}

/// Test that a paper run trades to its cycle cap and stops on its own,
/// leaving quota logs and recorded tape behind.
#[tokio::test]
async fn test_paper_run_reaches_cycle_cap() {
    let dir = TempDir::new().unwrap();
    let config = fast_paper_config(&dir, 2);

    let app = Application::new(config).unwrap();
    tokio::time::timeout(Duration::from_secs(30), app.run())
        .await
        .expect("run did not stop at the cycle cap")
        .unwrap();

    // Admitted orders were persisted per account.
    assert!(dir.path().join("quota").join("paper-a.json").exists());
    assert!(dir.path().join("quota").join("paper-b.json").exists());

    // The recorder wrote at least one tape file.
    let tapes: Vec<_> = std::fs::read_dir(dir.path().join("bbo"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(!tapes.is_empty());
}

/// Test that a pre-existing emergency stop file ends the run on the
/// first tick.
#[tokio::test]
async fn test_emergency_file_stops_paper_run() {
    let dir = TempDir::new().unwrap();
    let config = fast_paper_config(&dir, 50_000);
    std::fs::write(dir.path().join("STOP"), b"halt").unwrap();

    let app = Application::new(config).unwrap();
    tokio::time::timeout(Duration::from_secs(10), app.run())
        .await
        .expect("run did not notice the stop file")
        .unwrap();
}
