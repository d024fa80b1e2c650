//! CPU brand, utilization, clocks and cache hierarchy.
//!
//! Utilization is a delta between two refreshes, so one `sysinfo::System` is
//! kept for the lifetime of the source. The very first read primes it and
//! waits `MINIMUM_CPU_UPDATE_INTERVAL` before measuring. Refreshes run on
//! the blocking pool.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::core::system_monitor::source::{SharedSource, TelemetrySource};
use crate::core::system_monitor::{
    CacheKind, CacheLevel, CoreReading, CpuReading, Domain, Reading, UnavailableReason,
};
use crate::platform::probe::read_trimmed;
use crate::platform::{blocking, CapabilityProfile, OsFamily, Probe, Tool};

const SYSFS_CACHE_ROOT: &str = "/sys/devices/system/cpu/cpu0/cache";

pub fn for_platform(os: OsFamily, probe: Probe) -> SharedSource<CpuReading> {
    let cache = match os {
        OsFamily::Linux | OsFamily::Android => CacheSource::Sysfs,
        OsFamily::MacOs => CacheSource::Sysctl,
        OsFamily::Windows => CacheSource::Cpuid,
        OsFamily::Other => CacheSource::None,
    };

    Arc::new(CpuSource {
        system: Arc::new(Mutex::new(System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()),
        ))),
        primed: AtomicBool::new(false),
        cache,
        probe,
    })
}

/// Where the cache hierarchy comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheSource {
    Sysfs,
    Sysctl,
    Cpuid,
    None,
}

struct CpuSource {
    system: Arc<Mutex<System>>,
    primed: AtomicBool,
    cache: CacheSource,
    probe: Probe,
}

/// Brand, aggregate usage and per-core readings of a refreshed `System`.
fn usage_snapshot(system: &System) -> Reading<(String, f64, Vec<CoreReading>)> {
    let cpus = system.cpus();
    if cpus.is_empty() {
        return Reading::Unavailable(UnavailableReason::QueryFailed);
    }

    let brand = cpus
        .first()
        .map(|c| c.brand().trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| "Unknown CPU".to_string());

    let cores = cpus
        .iter()
        .enumerate()
        .map(|(index, cpu)| CoreReading {
            index,
            usage_percent: cpu.cpu_usage() as f64,
            frequency_mhz: match cpu.frequency() {
                0 => Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform),
                mhz => Reading::Available(mhz),
            },
        })
        .collect();

    Reading::Available((brand, system.global_cpu_usage() as f64, cores))
}

impl CpuSource {
    async fn cache_levels(&self, caps: &CapabilityProfile) -> Reading<Vec<CacheLevel>> {
        let levels = match self.cache {
            CacheSource::Sysfs => blocking(|| read_sysfs_cache(Path::new(SYSFS_CACHE_ROOT)))
                .await
                .unwrap_or_else(Reading::Unavailable),
            CacheSource::Sysctl => self.read_sysctl_cache(caps).await,
            CacheSource::Cpuid => read_cpuid_cache(),
            CacheSource::None => Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform),
        };

        levels.and_then(|levels| {
            if levels.is_empty() {
                Reading::Unavailable(UnavailableReason::QueryFailed)
            } else {
                Reading::Available(levels)
            }
        })
    }

    async fn read_sysctl_cache(&self, caps: &CapabilityProfile) -> Reading<Vec<CacheLevel>> {
        const KEYS: [(&str, u8, CacheKind); 4] = [
            ("hw.l1icachesize", 1, CacheKind::Instruction),
            ("hw.l1dcachesize", 1, CacheKind::Data),
            ("hw.l2cachesize", 2, CacheKind::Unified),
            ("hw.l3cachesize", 3, CacheKind::Unified),
        ];

        let mut levels = Vec::new();
        let mut last_error = UnavailableReason::QueryFailed;

        for (key, level, kind) in KEYS {
            match self.probe.run(caps, Tool::Sysctl, &["-n", key]).await {
                Ok(out) => {
                    if let Ok(bytes) = out.trim().parse::<u64>() {
                        if bytes > 0 {
                            levels.push(CacheLevel {
                                level,
                                kind,
                                size_kb: bytes / 1024,
                            });
                        }
                    }
                }
                // Apple Silicon has no L3 entry
                Err(reason) => last_error = reason,
            }
        }

        if levels.is_empty() {
            Reading::Unavailable(last_error)
        } else {
            Reading::Available(levels)
        }
    }
}

impl TelemetrySource for CpuSource {
    type Output = CpuReading;

    fn domain(&self) -> Domain {
        Domain::Cpu
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<CpuReading>> {
        Box::pin(async move {
            if !self.primed.swap(true, Ordering::SeqCst) {
                let system = Arc::clone(&self.system);
                if let Err(reason) = blocking(move || system.lock().refresh_cpu_all()).await {
                    return Reading::Unavailable(reason);
                }
                tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
            }

            let system = Arc::clone(&self.system);
            let usage = blocking(move || {
                let mut system = system.lock();
                system.refresh_cpu_all();
                usage_snapshot(&system)
            })
            .await
            .unwrap_or_else(Reading::Unavailable);

            let cache = self.cache_levels(caps).await;

            usage.map(|(brand, global_usage_percent, cores)| CpuReading {
                brand,
                global_usage_percent,
                cores,
                cache,
            })
        })
    }
}

/// `32K`, `1024K`, `8M` as used by sysfs `size` files.
pub fn parse_cache_size_kb(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Some(kb) = raw.strip_suffix('K') {
        kb.parse().ok()
    } else if let Some(mb) = raw.strip_suffix('M') {
        mb.parse::<u64>().ok().map(|mb| mb * 1024)
    } else {
        raw.parse::<u64>().ok().map(|bytes| bytes / 1024)
    }
}

fn parse_cache_kind(raw: &str) -> Option<CacheKind> {
    match raw.trim() {
        "Data" => Some(CacheKind::Data),
        "Instruction" => Some(CacheKind::Instruction),
        "Unified" => Some(CacheKind::Unified),
        _ => None,
    }
}

/// Read every `index*` directory of a sysfs cpu cache root.
pub fn read_sysfs_cache(root: &Path) -> Reading<Vec<CacheLevel>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => return Reading::Unavailable(UnavailableReason::from(&e)),
    };

    let mut dirs: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("index"))
        })
        .collect();
    dirs.sort();

    let levels = dirs
        .iter()
        .filter_map(|dir| {
            let level = read_trimmed(dir.join("level")).ok()?.parse::<u8>().ok()?;
            let kind = parse_cache_kind(&read_trimmed(dir.join("type")).ok()?)?;
            let size_kb = parse_cache_size_kb(&read_trimmed(dir.join("size")).ok()?)?;
            Some(CacheLevel { level, kind, size_kb })
        })
        .collect();

    Reading::Available(levels)
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn read_cpuid_cache() -> Reading<Vec<CacheLevel>> {
    use raw_cpuid::{CacheType, CpuId};

    let cpuid = CpuId::new();
    let Some(params) = cpuid.get_cache_parameters() else {
        return Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform);
    };

    let levels = params
        .filter_map(|cache| {
            let kind = match cache.cache_type() {
                CacheType::Data => CacheKind::Data,
                CacheType::Instruction => CacheKind::Instruction,
                CacheType::Unified => CacheKind::Unified,
                _ => return None,
            };
            let bytes = cache.associativity()
                * cache.physical_line_partitions()
                * cache.coherency_line_size()
                * cache.sets();
            Some(CacheLevel {
                level: cache.level(),
                kind,
                size_kb: (bytes / 1024) as u64,
            })
        })
        .collect();

    Reading::Available(levels)
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn read_cpuid_cache() -> Reading<Vec<CacheLevel>> {
    Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
}

/// Sum of every cache level, in KB.
pub fn total_cache_kb(levels: &[CacheLevel]) -> u64 {
    levels.iter().map(|l| l.size_kb).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_size() {
        assert_eq!(parse_cache_size_kb("48K"), Some(48));
        assert_eq!(parse_cache_size_kb("36M"), Some(36 * 1024));
        assert_eq!(parse_cache_size_kb("65536"), Some(64));
        assert_eq!(parse_cache_size_kb("big"), None);
    }

    #[test]
    fn test_read_sysfs_cache() {
        let root = tempfile::tempdir().unwrap();
        let layout = [
            ("index0", "1", "Data", "48K"),
            ("index1", "1", "Instruction", "32K"),
            ("index2", "2", "Unified", "1280K"),
            ("index3", "3", "Unified", "24M"),
        ];
        for (dir, level, kind, size) in layout {
            let path = root.path().join(dir);
            std::fs::create_dir(&path).unwrap();
            std::fs::write(path.join("level"), format!("{}\n", level)).unwrap();
            std::fs::write(path.join("type"), format!("{}\n", kind)).unwrap();
            std::fs::write(path.join("size"), format!("{}\n", size)).unwrap();
        }
        std::fs::create_dir(root.path().join("uevent_dir")).unwrap();

        let levels = read_sysfs_cache(root.path()).into_value().unwrap();
        assert_eq!(levels.len(), 4);
        assert_eq!(levels[0].label(), "L1d");
        assert_eq!(levels[1].label(), "L1i");
        assert_eq!(levels[3].size_kb, 24 * 1024);
        assert_eq!(total_cache_kb(&levels), 48 + 32 + 1280 + 24 * 1024);
    }

    #[test]
    fn test_missing_sysfs_cache() {
        let root = tempfile::tempdir().unwrap();
        assert!(!read_sysfs_cache(&root.path().join("missing")).is_available());
    }
}
