use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::reading::Reading;

/// Telemetry domains in their fixed, documented order.
///
/// The collector fills the snapshot in this order and the alert evaluator
/// emits warnings in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Domain {
    System,
    Network,
    Ports,
    Memory,
    Sensors,
    Battery,
    Cpu,
    Gpu,
    Disks,
    Peripherals,
    Browsers,
}

impl Domain {
    pub const ALL: [Domain; 11] = [
        Domain::System,
        Domain::Network,
        Domain::Ports,
        Domain::Memory,
        Domain::Sensors,
        Domain::Battery,
        Domain::Cpu,
        Domain::Gpu,
        Domain::Disks,
        Domain::Peripherals,
        Domain::Browsers,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Domain::System => "system",
            Domain::Network => "network",
            Domain::Ports => "ports",
            Domain::Memory => "memory",
            Domain::Sensors => "sensors",
            Domain::Battery => "battery",
            Domain::Cpu => "cpu",
            Domain::Gpu => "gpu",
            Domain::Disks => "disks",
            Domain::Peripherals => "peripherals",
            Domain::Browsers => "browsers",
        }
    }
}

/// One complete, immutable set of readings from a single refresh tick.
///
/// Every domain field is always present, either with a value or with the
/// reason it is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Local>,
    pub system: Reading<SystemReading>,
    pub network: Reading<NetworkReading>,
    pub ports: Reading<Vec<PortEntry>>,
    pub memory: Reading<MemoryReading>,
    pub sensors: Reading<SensorsReading>,
    pub battery: Reading<Vec<BatteryReading>>,
    pub cpu: Reading<CpuReading>,
    pub gpu: Reading<Vec<GpuReading>>,
    pub disks: Reading<DiskReport>,
    pub peripherals: Reading<PeripheralsReading>,
    pub browsers: Reading<Vec<BrowserReading>>,
    pub derived: DerivedFields,
}

/// Values computed by the collector from several fields after collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    /// Sum of all CPU cache levels in KB
    pub total_cache_kb: Reading<u64>,
}

// ============================================================================
// System
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReading {
    pub os_name: String,
    pub os_version: Reading<String>,
    pub kernel: Reading<String>,
    pub hostname: Reading<String>,
    pub uptime_secs: u64,
    pub system_model: Reading<String>,
}

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReading {
    /// Whether an outside host answered; `Unavailable` means it could not be confirmed
    pub connected: Reading<bool>,
    pub private_ipv4: Vec<InterfaceAddress>,
    pub private_ipv6: Vec<InterfaceAddress>,
    pub public_ipv4: Reading<String>,
    pub public_ipv6: Reading<String>,
    pub active_mac: Reading<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub interface: String,
    pub address: String,
}

// ============================================================================
// Ports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortEntry {
    pub protocol: String,
    pub local_address: String,
    pub port: u16,
    pub remote_address: String,
    pub state: String,
    /// Owning process; needs elevation on most platforms
    pub process: Reading<String>,
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub total_kb: u64,
    pub used_kb: u64,
    pub free_kb: u64,
    pub available_kb: u64,
    pub used_percent: f64,
}

// ============================================================================
// Sensors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorsReading {
    pub cpu_temperatures: Reading<Vec<TemperatureSensor>>,
    pub fans: Reading<Vec<FanReading>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSensor {
    pub label: String,
    pub celsius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanReading {
    pub label: String,
    pub rpm: u32,
}

// ============================================================================
// Battery
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    Charging,
    Discharging,
    Full,
    Empty,
    Unknown,
}

impl std::fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatteryStatus::Charging => write!(f, "Charging"),
            BatteryStatus::Discharging => write!(f, "Discharging"),
            BatteryStatus::Full => write!(f, "Fully charged"),
            BatteryStatus::Empty => write!(f, "Empty"),
            BatteryStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub percent: f64,
    pub status: BatteryStatus,
    pub cycle_count: Reading<u32>,
}

// ============================================================================
// CPU
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuReading {
    pub brand: String,
    pub global_usage_percent: f64,
    /// One entry per logical core, in enumeration order
    pub cores: Vec<CoreReading>,
    pub cache: Reading<Vec<CacheLevel>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreReading {
    pub index: usize,
    pub usage_percent: f64,
    pub frequency_mhz: Reading<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKind {
    Data,
    Instruction,
    Unified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLevel {
    pub level: u8,
    pub kind: CacheKind,
    pub size_kb: u64,
}

impl CacheLevel {
    pub fn label(&self) -> String {
        match self.kind {
            CacheKind::Data => format!("L{}d", self.level),
            CacheKind::Instruction => format!("L{}i", self.level),
            CacheKind::Unified => format!("L{}", self.level),
        }
    }
}

// ============================================================================
// GPU
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    #[default]
    Unknown,
}

impl GpuVendor {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("nvidia") || lower.contains("geforce") || lower.contains("quadro") {
            GpuVendor::Nvidia
        } else if lower.contains("amd") || lower.contains("radeon") || lower.contains("ati ") {
            GpuVendor::Amd
        } else if lower.contains("intel") {
            GpuVendor::Intel
        } else if lower.contains("apple") {
            GpuVendor::Apple
        } else {
            GpuVendor::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuReading {
    pub index: usize,
    pub name: Reading<String>,
    pub vendor: GpuVendor,
    pub utilization_percent: Reading<f64>,
    pub temperature_celsius: Reading<f64>,
}

// ============================================================================
// Disks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveKind {
    Ssd,
    Hdd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskReport {
    /// One entry per mounted physical volume
    pub volumes: Vec<DiskReading>,
    /// One entry per physical disk that reported a temperature
    pub temperatures: Reading<Vec<DiskTemperature>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskReading {
    pub device: String,
    pub mount_point: String,
    pub filesystem_type: String,
    pub drive_kind: Reading<DriveKind>,
    pub total_kb: u64,
    pub used_kb: u64,
    pub free_kb: u64,
    pub used_percent: f64,
    /// Filled by the collector from [`DiskReport::temperatures`]
    pub temperature_celsius: Reading<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskTemperature {
    pub device: String,
    pub celsius: u32,
}

// ============================================================================
// Peripherals
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralsReading {
    pub audio_device: Reading<String>,
    pub monitors: Reading<Vec<MonitorReading>>,
    pub npu: Reading<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReading {
    pub name: String,
    pub resolution: Reading<String>,
    pub refresh_hz: Reading<f64>,
}

// ============================================================================
// Browsers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserReading {
    pub name: String,
    pub version: Reading<String>,
    pub install_path: String,
}
