//! The adapter seam between the collector and the platform.
//!
//! Each telemetry domain has one [`TelemetrySource`] per OS family. The
//! variant is picked once, from the capability profile, when the
//! [`SourceSet`] is built.

use futures_util::future::BoxFuture;
use std::marker::PhantomData;
use std::sync::Arc;

use super::cache::LookupCache;
use super::metrics::*;
use super::reading::{Reading, UnavailableReason};
use super::sources;
use crate::core::config::Settings;
use crate::platform::{CapabilityProfile, Probe};

/// Trait for one domain's raw data source.
///
/// Implementations must turn every failure into a [`Reading::Unavailable`];
/// nothing may escape as a panic or a raw error.
pub trait TelemetrySource: Send + Sync {
    type Output: Send + 'static;

    /// Domain this source fills
    fn domain(&self) -> Domain;

    /// Query the platform once
    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<Self::Output>>;
}

/// Sources are shared so each invocation can run on its own task.
pub type SharedSource<T> = Arc<dyn TelemetrySource<Output = T>>;

/// Strategy for a domain that does not exist on the running platform.
pub struct Unsupported<T> {
    domain: Domain,
    _output: PhantomData<fn() -> T>,
}

impl<T> Unsupported<T> {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            _output: PhantomData,
        }
    }
}

impl<T: Send + 'static> TelemetrySource for Unsupported<T> {
    type Output = T;

    fn domain(&self) -> Domain {
        self.domain
    }

    fn read<'a>(&'a self, _caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<T>> {
        Box::pin(async { Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform) })
    }
}

/// One source per domain, in [`Domain::ALL`] order.
pub struct SourceSet {
    pub system: SharedSource<SystemReading>,
    pub network: SharedSource<NetworkReading>,
    pub ports: SharedSource<Vec<PortEntry>>,
    pub memory: SharedSource<MemoryReading>,
    pub sensors: SharedSource<SensorsReading>,
    pub battery: SharedSource<Vec<BatteryReading>>,
    pub cpu: SharedSource<CpuReading>,
    pub gpu: SharedSource<Vec<GpuReading>>,
    pub disks: SharedSource<DiskReport>,
    pub peripherals: SharedSource<PeripheralsReading>,
    pub browsers: SharedSource<Vec<BrowserReading>>,
}

impl SourceSet {
    /// Select the strategy of every domain for the resolved platform.
    pub fn for_platform(caps: &CapabilityProfile, cache: Arc<LookupCache>, settings: &Settings) -> Self {
        let os = caps.os_family;
        let probe = Probe::new(settings.tool_timeout());

        Self {
            system: sources::system::for_platform(os, probe),
            network: sources::network::for_platform(os, probe, cache),
            ports: sources::ports::for_platform(os, probe),
            memory: sources::memory::for_platform(os),
            sensors: sources::sensors::for_platform(os),
            battery: sources::battery::for_platform(os),
            cpu: sources::cpu::for_platform(os, probe),
            gpu: sources::gpu::for_platform(os, probe),
            disks: sources::disks::for_platform(os, probe),
            peripherals: sources::peripherals::for_platform(os, probe),
            browsers: sources::browsers::for_platform(os, probe),
        }
    }
}
