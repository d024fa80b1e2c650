// Scripted sources shared by the integration tests

use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

use sysdash::core::system_monitor::*;
use sysdash::platform::{CapabilityProfile, OsFamily, Tool};

/// How a scripted source behaves when read.
#[derive(Clone)]
pub enum Behavior<T> {
    Return(Reading<T>),
    Sleep(Duration, Reading<T>),
    /// Hold the worker thread in a synchronous call
    Block(Duration, Reading<T>),
    Panic,
}

pub struct Scripted<T> {
    domain: Domain,
    behavior: Behavior<T>,
}

impl<T> Scripted<T> {
    pub fn new(domain: Domain, behavior: Behavior<T>) -> Self {
        Self { domain, behavior }
    }
}

impl<T: Clone + Send + Sync + 'static> TelemetrySource for Scripted<T> {
    type Output = T;

    fn domain(&self) -> Domain {
        self.domain
    }

    fn read<'a>(&'a self, _caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<T>> {
        Box::pin(async move {
            match &self.behavior {
                Behavior::Return(reading) => reading.clone(),
                Behavior::Sleep(delay, reading) => {
                    tokio::time::sleep(*delay).await;
                    reading.clone()
                }
                Behavior::Block(delay, reading) => {
                    std::thread::sleep(*delay);
                    reading.clone()
                }
                Behavior::Panic => panic!("scripted {} source failure", self.domain.label()),
            }
        })
    }
}

pub fn ok<T: Clone + Send + Sync + 'static>(domain: Domain, value: T) -> SharedSource<T> {
    Arc::new(Scripted::new(domain, Behavior::Return(Reading::Available(value))))
}

pub fn caps() -> CapabilityProfile {
    CapabilityProfile::new(OsFamily::Linux, false, Vec::<Tool>::new())
}

pub fn system() -> SystemReading {
    SystemReading {
        os_name: "Test Linux".to_string(),
        os_version: Reading::Available("1.0".to_string()),
        kernel: Reading::Available("6.8.0".to_string()),
        hostname: Reading::Available("bench".to_string()),
        uptime_secs: 3_725,
        system_model: Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform),
    }
}

pub fn network(connected: bool) -> NetworkReading {
    NetworkReading {
        connected: Reading::Available(connected),
        private_ipv4: vec![InterfaceAddress {
            interface: "eth0".to_string(),
            address: "192.168.1.20".to_string(),
        }],
        private_ipv6: Vec::new(),
        public_ipv4: Reading::Available("203.0.113.7".to_string()),
        public_ipv6: Reading::Unavailable(UnavailableReason::QueryFailed),
        active_mac: Reading::Available("AA:BB:CC:DD:EE:FF".to_string()),
    }
}

pub fn memory(available_kb: u64) -> MemoryReading {
    let total_kb = 16 * 1024 * 1024;
    MemoryReading {
        total_kb,
        used_kb: total_kb - available_kb,
        free_kb: available_kb,
        available_kb,
        used_percent: (total_kb - available_kb) as f64 / total_kb as f64 * 100.0,
    }
}

pub fn cpu() -> CpuReading {
    CpuReading {
        brand: "Test CPU".to_string(),
        global_usage_percent: 15.0,
        cores: (0..4)
            .map(|index| CoreReading {
                index,
                usage_percent: 15.0,
                frequency_mhz: Reading::Available(2400),
            })
            .collect(),
        cache: Reading::Available(vec![
            CacheLevel {
                level: 1,
                kind: CacheKind::Data,
                size_kb: 32,
            },
            CacheLevel {
                level: 2,
                kind: CacheKind::Unified,
                size_kb: 512,
            },
            CacheLevel {
                level: 3,
                kind: CacheKind::Unified,
                size_kb: 8192,
            },
        ]),
    }
}

pub fn disks(used_percent: f64) -> DiskReport {
    DiskReport {
        volumes: vec![DiskReading {
            device: "/dev/nvme0n1p2".to_string(),
            mount_point: "/".to_string(),
            filesystem_type: "ext4".to_string(),
            drive_kind: Reading::Available(DriveKind::Ssd),
            total_kb: 500 * 1024 * 1024,
            used_kb: (500.0 * 1024.0 * 1024.0 * used_percent / 100.0) as u64,
            free_kb: (500.0 * 1024.0 * 1024.0 * (100.0 - used_percent) / 100.0) as u64,
            used_percent,
            temperature_celsius: Reading::Unavailable(UnavailableReason::QueryFailed),
        }],
        temperatures: Reading::Available(vec![DiskTemperature {
            device: "/dev/nvme0n1".to_string(),
            celsius: 38,
        }]),
    }
}

/// Nominal values for every domain.
pub fn nominal_sources() -> SourceSet {
    SourceSet {
        system: ok(Domain::System, system()),
        network: ok(Domain::Network, network(true)),
        ports: ok(Domain::Ports, Vec::new()),
        memory: ok(Domain::Memory, memory(8 * 1024 * 1024)),
        sensors: ok(
            Domain::Sensors,
            SensorsReading {
                cpu_temperatures: Reading::Available(vec![TemperatureSensor {
                    label: "Package id 0".to_string(),
                    celsius: 45.0,
                }]),
                fans: Reading::Available(Vec::new()),
            },
        ),
        battery: ok(Domain::Battery, Vec::new()),
        cpu: ok(Domain::Cpu, cpu()),
        gpu: ok(Domain::Gpu, Vec::new()),
        disks: ok(Domain::Disks, disks(40.0)),
        peripherals: ok(
            Domain::Peripherals,
            PeripheralsReading {
                audio_device: Reading::Available("HDA Intel PCH".to_string()),
                monitors: Reading::Available(Vec::new()),
                npu: Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform),
            },
        ),
        browsers: ok(Domain::Browsers, Vec::new()),
    }
}
