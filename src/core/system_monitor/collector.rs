//! Snapshot aggregation.
//!
//! One call to [`Collector::collect`] runs every source of the set
//! concurrently, each on its own task under its own deadline, and always
//! returns a complete [`Snapshot`].

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;

use super::cache::{LookupCache, NetTransport};
use super::metrics::*;
use super::reading::{Reading, UnavailableReason};
use super::source::{SharedSource, SourceSet};
use super::sources;
use crate::core::config::Settings;
use crate::error::Result;
use crate::platform::CapabilityProfile;

/// Runs all sources for one tick and assembles the snapshot.
pub struct Collector {
    sources: SourceSet,
    budget: Duration,
}

impl Collector {
    /// Create a collector over an explicit source set.
    ///
    /// `budget` is the deadline of every single source invocation.
    pub fn new(sources: SourceSet, budget: Duration) -> Self {
        Self { sources, budget }
    }

    /// Build the real sources for the resolved platform, sharing one lookup
    /// cache for the life of the collector.
    pub fn for_platform(caps: &CapabilityProfile, settings: &Settings) -> Result<Self> {
        let transport = NetTransport::new(settings.lookup_timeout())?;
        let cache = Arc::new(LookupCache::new(settings.cache_ttl(), Box::new(transport)));
        let sources = SourceSet::for_platform(caps, cache, settings);
        Ok(Self::new(sources, settings.source_budget()))
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Collect one snapshot.
    ///
    /// A source that panics or overruns the budget only loses its own
    /// domain; the rest of the snapshot is unaffected.
    pub async fn collect(&self, caps: &CapabilityProfile) -> Snapshot {
        let s = &self.sources;
        let budget = self.budget;
        let caps = Arc::new(caps.clone());

        let (system, network, ports, memory, sensors, battery, cpu, gpu, disks, peripherals, browsers) = tokio::join!(
            guarded(&s.system, &caps, budget),
            guarded(&s.network, &caps, budget),
            guarded(&s.ports, &caps, budget),
            guarded(&s.memory, &caps, budget),
            guarded(&s.sensors, &caps, budget),
            guarded(&s.battery, &caps, budget),
            guarded(&s.cpu, &caps, budget),
            guarded(&s.gpu, &caps, budget),
            guarded(&s.disks, &caps, budget),
            guarded(&s.peripherals, &caps, budget),
            guarded(&s.browsers, &caps, budget),
        );

        let disks = disks.map(attach_disk_temperatures);
        let derived = DerivedFields {
            total_cache_kb: derive_total_cache(&cpu),
        };

        Snapshot {
            taken_at: Local::now(),
            system,
            network,
            ports,
            memory,
            sensors,
            battery,
            cpu,
            gpu,
            disks,
            peripherals,
            browsers,
            derived,
        }
    }
}

/// Run one source on its own task under the tick budget, turning panics and
/// overruns into unavailable readings.
///
/// A source stuck in a synchronous call only pins its own worker, so the
/// deadline still fires for the tick.
async fn guarded<T: Send + 'static>(
    source: &SharedSource<T>,
    caps: &Arc<CapabilityProfile>,
    budget: Duration,
) -> Reading<T> {
    let domain = source.domain();
    let task = {
        let source = Arc::clone(source);
        let caps = Arc::clone(caps);
        tokio::spawn(async move { source.read(&caps).await })
    };
    let abort = task.abort_handle();

    let reading = match tokio::time::timeout(budget, task).await {
        Ok(Ok(reading)) => reading,
        Ok(Err(e)) => {
            if e.is_panic() {
                log::warn!("{} source panicked", domain.label());
            } else {
                log::warn!("{} source was cancelled", domain.label());
            }
            Reading::Unavailable(UnavailableReason::QueryFailed)
        }
        Err(_) => {
            // Kills any child process at the task's next await
            abort.abort();
            log::warn!("{} source exceeded its {:?} budget", domain.label(), budget);
            Reading::Unavailable(UnavailableReason::Timeout)
        }
    };

    if let Some(reason) = reading.reason() {
        log::debug!("{} unavailable: {}", domain.label(), reason);
    }
    reading
}

/// Copy each physical disk temperature onto the volumes that live on it.
pub fn attach_disk_temperatures(mut report: DiskReport) -> DiskReport {
    for volume in &mut report.volumes {
        volume.temperature_celsius = match &report.temperatures {
            Reading::Available(temps) => {
                let base = sources::disks::base_device(&volume.device);
                temps
                    .iter()
                    .find(|t| t.device == base)
                    .map(|t| Reading::Available(t.celsius))
                    .unwrap_or(Reading::Unavailable(UnavailableReason::QueryFailed))
            }
            Reading::Unavailable(reason) => Reading::Unavailable(*reason),
        };
    }
    report
}

fn derive_total_cache(cpu: &Reading<CpuReading>) -> Reading<u64> {
    cpu.as_ref()
        .and_then(|cpu| cpu.cache.as_ref())
        .and_then(|levels| {
            if levels.is_empty() {
                Reading::Unavailable(UnavailableReason::QueryFailed)
            } else {
                Reading::Available(sources::cpu::total_cache_kb(levels))
            }
        })
}
