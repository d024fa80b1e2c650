//! Physical memory totals.

use futures_util::future::BoxFuture;
use std::sync::Arc;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::core::system_monitor::source::{SharedSource, TelemetrySource, Unsupported};
use crate::core::system_monitor::{Domain, MemoryReading, Reading, UnavailableReason};
use crate::platform::{blocking, CapabilityProfile, OsFamily};

pub fn for_platform(os: OsFamily) -> SharedSource<MemoryReading> {
    if os == OsFamily::Other && !sysinfo::IS_SUPPORTED_SYSTEM {
        return Arc::new(Unsupported::new(Domain::Memory));
    }
    Arc::new(SysinfoMemory)
}

/// sysinfo covers every supported family, Termux included (`/proc/meminfo`).
struct SysinfoMemory;

impl TelemetrySource for SysinfoMemory {
    type Output = MemoryReading;

    fn domain(&self) -> Domain {
        Domain::Memory
    }

    fn read<'a>(&'a self, _caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<MemoryReading>> {
        Box::pin(async move { blocking(read_memory).await.unwrap_or_else(Reading::Unavailable) })
    }
}

fn read_memory() -> Reading<MemoryReading> {
    let system = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
    );

    memory_from_bytes(
        system.total_memory(),
        system.used_memory(),
        system.free_memory(),
        system.available_memory(),
    )
}

/// Convert sysinfo byte counts to a KB reading.
///
/// A zero total means the kernel interface answered with nothing useful.
pub fn memory_from_bytes(total: u64, used: u64, free: u64, available: u64) -> Reading<MemoryReading> {
    if total == 0 {
        return Reading::Unavailable(UnavailableReason::QueryFailed);
    }

    Reading::Available(MemoryReading {
        total_kb: total / 1024,
        used_kb: used / 1024,
        free_kb: free / 1024,
        available_kb: available / 1024,
        used_percent: (used as f64 / total as f64) * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_from_bytes() {
        let gib = 1024 * 1024 * 1024;
        let reading = memory_from_bytes(16 * gib, 4 * gib, 2 * gib, 12 * gib);
        let memory = reading.value().unwrap();
        assert_eq!(memory.total_kb, 16 * 1024 * 1024);
        assert_eq!(memory.available_kb, 12 * 1024 * 1024);
        assert!((memory.used_percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_total_is_unavailable() {
        assert_eq!(
            memory_from_bytes(0, 0, 0, 0),
            Reading::Unavailable(UnavailableReason::QueryFailed)
        );
    }
}
