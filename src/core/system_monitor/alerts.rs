//! Warning evaluation over a finished snapshot.
//!
//! Thresholds are fixed constants. Warnings come out in [`Domain::ALL`]
//! order, and within a domain in the order the readings appear.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::metrics::{Domain, GpuVendor, Snapshot};
use super::reading::Reading;
use super::sources::disks::base_device;

/// Available memory below this is critical (512 MiB)
pub const LOW_MEMORY_KB: u64 = 512 * 1024;
/// Volume usage at or above this is critical
pub const DISK_FULL_PERCENT: f64 = 97.0;
/// Physical disk temperature at or above this is critical
pub const DISK_HOT_CELSIUS: u32 = 60;
/// CPU core or aggregate usage at or above this is a warning
pub const CPU_MAX_PERCENT: f64 = 99.0;
/// GPU utilization at or above this is a warning
pub const GPU_MAX_PERCENT: f64 = 99.0;

/// Temperature above which a GPU is considered too hot. The limit itself
/// is still within range.
pub fn gpu_temperature_limit(vendor: GpuVendor) -> f64 {
    match vendor {
        GpuVendor::Amd => 90.0,
        _ => 85.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// One threshold violation found in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub severity: Severity,
    pub domain: Domain,
    pub message: String,
    pub measured_value: f64,
    pub threshold: f64,
}

impl Warning {
    fn new(severity: Severity, domain: Domain, message: String, measured_value: f64, threshold: f64) -> Self {
        Self {
            severity,
            domain,
            message,
            measured_value,
            threshold,
        }
    }
}

/// Evaluate every threshold against `snapshot`.
///
/// Missing values are skipped, except connectivity: a check that could not
/// confirm the machine is online is reported like an offline one.
pub fn evaluate(snapshot: &Snapshot) -> Vec<Warning> {
    let mut warnings = Vec::new();

    for domain in Domain::ALL {
        match domain {
            Domain::Network => network_warnings(snapshot, &mut warnings),
            Domain::Memory => memory_warnings(snapshot, &mut warnings),
            Domain::Cpu => cpu_warnings(snapshot, &mut warnings),
            Domain::Gpu => gpu_warnings(snapshot, &mut warnings),
            Domain::Disks => disk_warnings(snapshot, &mut warnings),
            _ => {}
        }
    }

    warnings
}

fn network_warnings(snapshot: &Snapshot, warnings: &mut Vec<Warning>) {
    let connected = match &snapshot.network {
        Reading::Available(network) => network.connected.value().copied().unwrap_or(false),
        Reading::Unavailable(_) => false,
    };

    if !connected {
        warnings.push(Warning::new(
            Severity::Critical,
            Domain::Network,
            "No internet connection. Please connect to Wi-Fi or LAN cable".to_string(),
            0.0,
            1.0,
        ));
    }
}

fn memory_warnings(snapshot: &Snapshot, warnings: &mut Vec<Warning>) {
    let Some(memory) = snapshot.memory.value() else {
        return;
    };

    if memory.available_kb < LOW_MEMORY_KB {
        warnings.push(Warning::new(
            Severity::Critical,
            Domain::Memory,
            format!("Low memory! Only {} MB available", memory.available_kb / 1024),
            memory.available_kb as f64,
            LOW_MEMORY_KB as f64,
        ));
    }
}

fn cpu_warnings(snapshot: &Snapshot, warnings: &mut Vec<Warning>) {
    let Some(cpu) = snapshot.cpu.value() else {
        return;
    };

    if cpu.global_usage_percent >= CPU_MAX_PERCENT {
        warnings.push(Warning::new(
            Severity::Warning,
            Domain::Cpu,
            format!("CPU at {:.1}% utilisation", cpu.global_usage_percent),
            cpu.global_usage_percent,
            CPU_MAX_PERCENT,
        ));
    }

    for core in cpu.cores.iter().filter(|c| c.usage_percent >= CPU_MAX_PERCENT) {
        warnings.push(Warning::new(
            Severity::Warning,
            Domain::Cpu,
            format!("CPU core {} at {:.1}% utilisation", core.index, core.usage_percent),
            core.usage_percent,
            CPU_MAX_PERCENT,
        ));
    }
}

fn gpu_warnings(snapshot: &Snapshot, warnings: &mut Vec<Warning>) {
    let Some(gpus) = snapshot.gpu.value() else {
        return;
    };

    for gpu in gpus {
        if let Some(&usage) = gpu.utilization_percent.value() {
            if usage >= GPU_MAX_PERCENT {
                warnings.push(Warning::new(
                    Severity::Warning,
                    Domain::Gpu,
                    format!("GPU{} at {:.0}% utilisation", gpu.index, usage),
                    usage,
                    GPU_MAX_PERCENT,
                ));
            }
        }

        if let Some(&temp) = gpu.temperature_celsius.value() {
            let limit = gpu_temperature_limit(gpu.vendor);
            if temp > limit {
                warnings.push(Warning::new(
                    Severity::Warning,
                    Domain::Gpu,
                    format!("GPU{} is {:.0}°C", gpu.index, temp),
                    temp,
                    limit,
                ));
            }
        }
    }
}

fn disk_warnings(snapshot: &Snapshot, warnings: &mut Vec<Warning>) {
    let Some(report) = snapshot.disks.value() else {
        return;
    };

    for volume in report.volumes.iter().filter(|v| v.used_percent >= DISK_FULL_PERCENT) {
        warnings.push(Warning::new(
            Severity::Critical,
            Domain::Disks,
            format!("{} is {:.1}% full", volume.mount_point, volume.used_percent),
            volume.used_percent,
            DISK_FULL_PERCENT,
        ));
    }

    // Volume temperatures first, then disks without a mounted volume. Each
    // physical disk is judged once.
    let from_volumes = report
        .volumes
        .iter()
        .filter_map(|v| v.temperature_celsius.value().map(|&celsius| (base_device(&v.device), celsius)));
    let from_disks = report
        .temperatures
        .value()
        .into_iter()
        .flatten()
        .map(|t| (t.device.clone(), t.celsius));

    let mut seen = HashSet::new();
    for (device, celsius) in from_volumes.chain(from_disks) {
        if !seen.insert(device.clone()) || celsius < DISK_HOT_CELSIUS {
            continue;
        }
        warnings.push(Warning::new(
            Severity::Critical,
            Domain::Disks,
            format!("High disk temperature: {} is {}°C", device, celsius),
            celsius as f64,
            DISK_HOT_CELSIUS as f64,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::system_monitor::metrics::*;
    use crate::core::system_monitor::reading::UnavailableReason;
    use chrono::Local;

    fn unavailable<T>() -> Reading<T> {
        Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
    }

    fn online() -> Reading<NetworkReading> {
        Reading::Available(NetworkReading {
            connected: Reading::Available(true),
            private_ipv4: Vec::new(),
            private_ipv6: Vec::new(),
            public_ipv4: unavailable(),
            public_ipv6: unavailable(),
            active_mac: unavailable(),
        })
    }

    fn volume(mount: &str, used_percent: f64) -> DiskReading {
        DiskReading {
            device: "/dev/sda1".to_string(),
            mount_point: mount.to_string(),
            filesystem_type: "ext4".to_string(),
            drive_kind: Reading::Available(DriveKind::Ssd),
            total_kb: 1000,
            used_kb: (used_percent * 10.0) as u64,
            free_kb: 1000 - (used_percent * 10.0) as u64,
            used_percent,
            temperature_celsius: unavailable(),
        }
    }

    fn disks(volumes: Vec<DiskReading>, temps: Vec<u32>) -> Reading<DiskReport> {
        Reading::Available(DiskReport {
            volumes,
            temperatures: Reading::Available(
                temps
                    .into_iter()
                    .map(|celsius| DiskTemperature {
                        device: "/dev/sda".to_string(),
                        celsius,
                    })
                    .collect(),
            ),
        })
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            taken_at: Local::now(),
            system: unavailable(),
            network: online(),
            ports: Reading::Available(Vec::new()),
            memory: Reading::Available(MemoryReading {
                total_kb: 16 * 1024 * 1024,
                used_kb: 4 * 1024 * 1024,
                free_kb: 12 * 1024 * 1024,
                available_kb: 12 * 1024 * 1024,
                used_percent: 25.0,
            }),
            sensors: unavailable(),
            battery: Reading::Available(Vec::new()),
            cpu: Reading::Available(CpuReading {
                brand: "Test CPU".to_string(),
                global_usage_percent: 12.0,
                cores: vec![CoreReading {
                    index: 0,
                    usage_percent: 12.0,
                    frequency_mhz: Reading::Available(3200),
                }],
                cache: unavailable(),
            }),
            gpu: Reading::Available(Vec::new()),
            disks: disks(vec![volume("/", 40.0)], vec![35]),
            peripherals: unavailable(),
            browsers: Reading::Available(Vec::new()),
            derived: DerivedFields {
                total_cache_kb: unavailable(),
            },
        }
    }

    #[test]
    fn test_nominal_snapshot_has_no_warnings() {
        assert!(evaluate(&snapshot()).is_empty());
    }

    #[test]
    fn test_disk_full_boundary() {
        let mut snap = snapshot();
        snap.disks = disks(vec![volume("/", 97.0)], Vec::new());
        let warnings = evaluate(&snap);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Critical);
        assert_eq!(warnings[0].domain, Domain::Disks);

        snap.disks = disks(vec![volume("/", 96.9)], Vec::new());
        assert!(evaluate(&snap).is_empty());
    }

    #[test]
    fn test_disk_temperature_boundary() {
        let mut snap = snapshot();
        snap.disks = disks(vec![volume("/", 10.0)], vec![60]);
        let warnings = evaluate(&snap);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Critical);
        assert_eq!(warnings[0].measured_value, 60.0);

        snap.disks = disks(vec![volume("/", 10.0)], vec![59]);
        assert!(evaluate(&snap).is_empty());
    }

    #[test]
    fn test_volume_temperature_counts_once_per_disk() {
        let mut root = volume("/", 10.0);
        root.temperature_celsius = Reading::Available(60);
        let mut home = volume("/home", 10.0);
        home.device = "/dev/sda2".to_string();
        home.temperature_celsius = Reading::Available(60);

        let mut snap = snapshot();
        snap.disks = Reading::Available(DiskReport {
            volumes: vec![root.clone(), home.clone()],
            temperatures: Reading::Unavailable(UnavailableReason::PermissionDenied),
        });
        let warnings = evaluate(&snap);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Critical);
        assert_eq!(warnings[0].measured_value, 60.0);
        assert!(warnings[0].message.contains("/dev/sda "));

        // The same disk in the report list does not warn twice
        snap.disks = disks(vec![root.clone(), home], vec![60]);
        assert_eq!(evaluate(&snap).len(), 1);

        root.temperature_celsius = Reading::Available(59);
        snap.disks = Reading::Available(DiskReport {
            volumes: vec![root],
            temperatures: Reading::Unavailable(UnavailableReason::PermissionDenied),
        });
        assert!(evaluate(&snap).is_empty());
    }

    #[test]
    fn test_unconfirmed_connectivity_matches_offline() {
        let mut offline = snapshot();
        offline.network = Reading::Available(NetworkReading {
            connected: Reading::Available(false),
            ..online().into_value().unwrap()
        });

        let mut unknown = snapshot();
        unknown.network = Reading::Available(NetworkReading {
            connected: Reading::Unavailable(UnavailableReason::Timeout),
            ..online().into_value().unwrap()
        });

        let offline = evaluate(&offline);
        let unknown = evaluate(&unknown);
        assert_eq!(offline.len(), 1);
        assert_eq!(offline, unknown);
        assert_eq!(unknown[0].severity, Severity::Critical);
    }

    #[test]
    fn test_missing_network_domain_is_critical() {
        let mut snap = snapshot();
        snap.network = Reading::Unavailable(UnavailableReason::Timeout);
        let warnings = evaluate(&snap);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].domain, Domain::Network);
        assert_eq!(warnings[0].severity, Severity::Critical);
    }

    #[test]
    fn test_low_memory_and_full_disk_in_domain_order() {
        let mut snap = snapshot();
        if let Reading::Available(memory) = &mut snap.memory {
            memory.available_kb = 100 * 1024;
        }
        snap.disks = disks(vec![volume("/", 98.0)], vec![30]);

        let warnings = evaluate(&snap);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].domain, Domain::Memory);
        assert_eq!(warnings[1].domain, Domain::Disks);
    }

    #[test]
    fn test_cpu_core_and_aggregate() {
        let mut snap = snapshot();
        snap.cpu = Reading::Available(CpuReading {
            brand: "Test CPU".to_string(),
            global_usage_percent: 60.0,
            cores: vec![
                CoreReading {
                    index: 0,
                    usage_percent: 99.5,
                    frequency_mhz: unavailable(),
                },
                CoreReading {
                    index: 1,
                    usage_percent: 20.0,
                    frequency_mhz: unavailable(),
                },
            ],
            cache: unavailable(),
        });

        let warnings = evaluate(&snap);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
        assert!(warnings[0].message.contains("core 0"));
    }

    #[test]
    fn test_gpu_vendor_temperature_limits() {
        let mut snap = snapshot();
        snap.gpu = Reading::Available(vec![
            GpuReading {
                index: 0,
                name: Reading::Available("Radeon RX 7900".to_string()),
                vendor: GpuVendor::Amd,
                utilization_percent: Reading::Available(50.0),
                temperature_celsius: Reading::Available(88.0),
            },
            GpuReading {
                index: 1,
                name: Reading::Available("GeForce RTX 4080".to_string()),
                vendor: GpuVendor::Nvidia,
                utilization_percent: Reading::Available(100.0),
                temperature_celsius: Reading::Available(88.0),
            },
        ]);

        let warnings = evaluate(&snap);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.message.starts_with("GPU1")));
    }

    #[test]
    fn test_gpu_temperature_limit_is_exclusive() {
        let gpu = |celsius: f64| GpuReading {
            index: 0,
            name: Reading::Available("GeForce RTX 4080".to_string()),
            vendor: GpuVendor::Nvidia,
            utilization_percent: Reading::Available(10.0),
            temperature_celsius: Reading::Available(celsius),
        };

        let mut snap = snapshot();
        snap.gpu = Reading::Available(vec![gpu(85.0)]);
        assert!(evaluate(&snap).is_empty());

        snap.gpu = Reading::Available(vec![gpu(85.5)]);
        assert_eq!(evaluate(&snap).len(), 1);
    }

    #[test]
    fn test_all_unavailable_is_tolerated() {
        let mut snap = snapshot();
        snap.memory = unavailable();
        snap.cpu = unavailable();
        snap.gpu = unavailable();
        snap.disks = unavailable();
        assert!(evaluate(&snap).is_empty());
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let mut snap = snapshot();
        snap.network = Reading::Unavailable(UnavailableReason::QueryFailed);
        snap.disks = disks(vec![volume("/", 99.0), volume("/home", 98.0)], vec![70]);
        assert_eq!(evaluate(&snap), evaluate(&snap));
    }
}
