//! Telemetry core.
//!
//! Sources read the platform, the collector assembles them into a
//! [`Snapshot`] once per tick, and the alert evaluator turns a snapshot into
//! [`Warning`]s.

pub mod alerts;
pub mod cache;
mod collector;
mod metrics;
mod reading;
pub mod source;
pub mod sources;

pub use alerts::{evaluate, Severity, Warning};
pub use cache::{Endpoint, LookupCache, LookupKey, LookupTransport, NetTransport};
pub use collector::{attach_disk_temperatures, Collector};
pub use metrics::{
    BatteryReading, BatteryStatus, BrowserReading, CacheKind, CacheLevel, CoreReading, CpuReading,
    DerivedFields, DiskReading, DiskReport, DiskTemperature, Domain, DriveKind, FanReading,
    GpuReading, GpuVendor, InterfaceAddress, MemoryReading, MonitorReading, NetworkReading,
    PeripheralsReading, PortEntry, SensorsReading, Snapshot, SystemReading, TemperatureSensor,
};
pub use reading::{Reading, UnavailableReason};
pub use source::{SharedSource, SourceSet, TelemetrySource, Unsupported};
