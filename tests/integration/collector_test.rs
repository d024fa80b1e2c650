// Tests for snapshot aggregation across scripted sources

use std::sync::Arc;
use std::time::Duration;

use sysdash::core::system_monitor::*;

use super::mock::{self, Behavior, Scripted};

const BUDGET: Duration = Duration::from_secs(2);

#[tokio::test(start_paused = true)]
async fn test_nominal_sources_fill_every_domain() {
    let collector = Collector::new(mock::nominal_sources(), BUDGET);
    let snapshot = collector.collect(&mock::caps()).await;

    assert!(snapshot.system.is_available());
    assert!(snapshot.network.is_available());
    assert!(snapshot.ports.is_available());
    assert!(snapshot.memory.is_available());
    assert!(snapshot.sensors.is_available());
    assert!(snapshot.battery.is_available());
    assert!(snapshot.cpu.is_available());
    assert!(snapshot.gpu.is_available());
    assert!(snapshot.disks.is_available());
    assert!(snapshot.peripherals.is_available());
    assert!(snapshot.browsers.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out_alone() {
    let mut sources = mock::nominal_sources();
    sources.ports = Arc::new(Scripted::new(
        Domain::Ports,
        Behavior::Sleep(Duration::from_secs(600), Reading::Available(Vec::new())),
    ));

    let collector = Collector::new(sources, BUDGET);
    let snapshot = collector.collect(&mock::caps()).await;

    assert_eq!(snapshot.ports, Reading::Unavailable(UnavailableReason::Timeout));
    assert!(snapshot.memory.is_available());
    assert!(snapshot.browsers.is_available());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_source_stuck_in_a_blocking_call_times_out() {
    let mut sources = mock::nominal_sources();
    sources.disks = Arc::new(Scripted::new(
        Domain::Disks,
        Behavior::Block(Duration::from_secs(3), Reading::Available(mock::disks(40.0))),
    ));

    let collector = Collector::new(sources, Duration::from_millis(200));
    let started = std::time::Instant::now();
    let snapshot = collector.collect(&mock::caps()).await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(2), "tick took {:?}", elapsed);
    assert_eq!(snapshot.disks, Reading::Unavailable(UnavailableReason::Timeout));
    assert!(snapshot.memory.is_available());
    assert!(snapshot.cpu.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_source_does_not_stop_the_tick() {
    let mut sources = mock::nominal_sources();
    sources.gpu = Arc::new(Scripted::new(Domain::Gpu, Behavior::Panic));

    let collector = Collector::new(sources, BUDGET);
    let snapshot = collector.collect(&mock::caps()).await;

    assert_eq!(snapshot.gpu, Reading::Unavailable(UnavailableReason::QueryFailed));
    assert!(snapshot.cpu.is_available());
    assert!(snapshot.disks.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_every_source_failing_still_builds_a_snapshot() {
    let mut sources = mock::nominal_sources();
    sources.system = Arc::new(Scripted::new(Domain::System, Behavior::Panic));
    sources.network = Arc::new(Scripted::new(
        Domain::Network,
        Behavior::Return(Reading::Unavailable(UnavailableReason::QueryFailed)),
    ));
    sources.memory = Arc::new(Unsupported::new(Domain::Memory));
    sources.cpu = Arc::new(Scripted::new(
        Domain::Cpu,
        Behavior::Sleep(Duration::from_secs(60), Reading::Available(mock::cpu())),
    ));
    sources.disks = Arc::new(Unsupported::new(Domain::Disks));

    let collector = Collector::new(sources, BUDGET);
    let snapshot = collector.collect(&mock::caps()).await;

    assert_eq!(snapshot.system.reason(), Some(UnavailableReason::QueryFailed));
    assert_eq!(snapshot.memory.reason(), Some(UnavailableReason::NotSupportedOnPlatform));
    assert_eq!(snapshot.cpu.reason(), Some(UnavailableReason::Timeout));
    assert_eq!(snapshot.derived.total_cache_kb.reason(), Some(UnavailableReason::Timeout));
    assert_eq!(snapshot.disks.reason(), Some(UnavailableReason::NotSupportedOnPlatform));
}

#[tokio::test(start_paused = true)]
async fn test_sources_run_concurrently() {
    let mut sources = mock::nominal_sources();
    let delay = Duration::from_millis(1500);
    sources.system = Arc::new(Scripted::new(
        Domain::System,
        Behavior::Sleep(delay, Reading::Available(mock::system())),
    ));
    sources.cpu = Arc::new(Scripted::new(
        Domain::Cpu,
        Behavior::Sleep(delay, Reading::Available(mock::cpu())),
    ));

    // Each source fits the budget; run one after the other they would not
    let collector = Collector::new(sources, BUDGET);
    let start = tokio::time::Instant::now();
    let snapshot = collector.collect(&mock::caps()).await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(snapshot.system.is_available());
    assert!(snapshot.cpu.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_derived_fields() {
    let collector = Collector::new(mock::nominal_sources(), BUDGET);
    let snapshot = collector.collect(&mock::caps()).await;

    assert_eq!(snapshot.derived.total_cache_kb, Reading::Available(32 + 512 + 8192));

    let report = snapshot.disks.value().unwrap();
    assert_eq!(report.volumes[0].temperature_celsius, Reading::Available(38));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_serializes_with_reasons() {
    let mut sources = mock::nominal_sources();
    sources.battery = Arc::new(Unsupported::new(Domain::Battery));

    let collector = Collector::new(sources, BUDGET);
    let snapshot = collector.collect(&mock::caps()).await;
    let json = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(json["battery"]["status"], "unavailable");
    assert_eq!(json["battery"]["value"], "NotSupportedOnPlatform");
    assert_eq!(json["memory"]["status"], "available");
}
