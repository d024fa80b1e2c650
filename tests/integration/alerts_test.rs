// End-to-end warning evaluation over collected snapshots

use std::sync::Arc;
use std::time::Duration;

use sysdash::core::system_monitor::*;

use super::mock::{self, Behavior, Scripted};

async fn collect(sources: SourceSet) -> Snapshot {
    Collector::new(sources, Duration::from_secs(2))
        .collect(&mock::caps())
        .await
}

#[tokio::test(start_paused = true)]
async fn test_nominal_machine_has_no_warnings() {
    let snapshot = collect(mock::nominal_sources()).await;
    assert!(evaluate(&snapshot).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_low_memory_and_full_disk() {
    let mut sources = mock::nominal_sources();
    sources.memory = mock::ok(Domain::Memory, mock::memory(200 * 1024));
    sources.disks = mock::ok(Domain::Disks, mock::disks(98.0));

    let snapshot = collect(sources).await;
    let warnings = evaluate(&snapshot);

    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[0].domain, Domain::Memory);
    assert_eq!(warnings[0].severity, Severity::Critical);
    assert_eq!(warnings[1].domain, Domain::Disks);
    assert_eq!(warnings[1].severity, Severity::Critical);
    assert_eq!(warnings[1].measured_value, 98.0);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_network_counts_as_offline() {
    let mut sources = mock::nominal_sources();
    sources.network = Arc::new(Scripted::new(
        Domain::Network,
        Behavior::Sleep(Duration::from_secs(30), Reading::Available(mock::network(true))),
    ));

    let snapshot = collect(sources).await;
    let warnings = evaluate(&snapshot);

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].domain, Domain::Network);
    assert_eq!(warnings[0].severity, Severity::Critical);
}

#[tokio::test(start_paused = true)]
async fn test_offline_and_unconfirmed_match() {
    let mut offline = mock::nominal_sources();
    offline.network = mock::ok(Domain::Network, mock::network(false));

    let mut unknown = mock::nominal_sources();
    let mut reading = mock::network(true);
    reading.connected = Reading::Unavailable(UnavailableReason::QueryFailed);
    unknown.network = mock::ok(Domain::Network, reading);

    let offline = evaluate(&collect(offline).await);
    let unknown = evaluate(&collect(unknown).await);

    assert_eq!(offline.len(), 1);
    assert_eq!(offline[0].severity, unknown[0].severity);
    assert_eq!(offline[0].message, unknown[0].message);
}

#[tokio::test(start_paused = true)]
async fn test_hot_disk_from_temperature_list() {
    let mut report = mock::disks(50.0);
    report.temperatures = Reading::Available(vec![DiskTemperature {
        device: "/dev/nvme0n1".to_string(),
        celsius: 61,
    }]);
    let mut sources = mock::nominal_sources();
    sources.disks = mock::ok(Domain::Disks, report);

    let warnings = evaluate(&collect(sources).await);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("/dev/nvme0n1"));
    assert_eq!(warnings[0].threshold, 60.0);
}
