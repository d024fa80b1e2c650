//! Battery charge, status and cycle count via the `battery` crate.

use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::core::system_monitor::source::{SharedSource, TelemetrySource, Unsupported};
use crate::core::system_monitor::{BatteryReading, BatteryStatus, Domain, Reading, UnavailableReason};
use crate::platform::{blocking, CapabilityProfile, OsFamily};

pub fn for_platform(os: OsFamily) -> SharedSource<Vec<BatteryReading>> {
    match os {
        OsFamily::Other => Arc::new(Unsupported::new(Domain::Battery)),
        _ => Arc::new(BatterySource),
    }
}

struct BatterySource;

impl TelemetrySource for BatterySource {
    type Output = Vec<BatteryReading>;

    fn domain(&self) -> Domain {
        Domain::Battery
    }

    fn read<'a>(&'a self, _caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<Vec<BatteryReading>>> {
        // The battery manager is not Send; it lives and dies on the pool thread
        Box::pin(async move { blocking(read_batteries).await.unwrap_or_else(Reading::Unavailable) })
    }
}

/// A machine without batteries yields an empty list, not an error.
fn read_batteries() -> Reading<Vec<BatteryReading>> {
    use battery::units::ratio::percent;

    let manager = match battery::Manager::new() {
        Ok(manager) => manager,
        Err(e) => {
            log::debug!("Battery manager unavailable: {}", e);
            return Reading::Unavailable(UnavailableReason::QueryFailed);
        }
    };

    let batteries = match manager.batteries() {
        Ok(batteries) => batteries,
        Err(e) => {
            log::debug!("Cannot enumerate batteries: {}", e);
            return Reading::Unavailable(UnavailableReason::QueryFailed);
        }
    };

    let readings = batteries
        .filter_map(|battery| match battery {
            Ok(battery) => Some(BatteryReading {
                percent: clamp_percent(battery.state_of_charge().get::<percent>() as f64),
                status: status_from(battery.state()),
                cycle_count: Reading::from_option(battery.cycle_count(), UnavailableReason::NotSupportedOnPlatform),
            }),
            Err(e) => {
                log::debug!("Skipping unreadable battery: {}", e);
                None
            }
        })
        .collect();

    Reading::Available(readings)
}

fn status_from(state: battery::State) -> BatteryStatus {
    match state {
        battery::State::Charging => BatteryStatus::Charging,
        battery::State::Discharging => BatteryStatus::Discharging,
        battery::State::Full => BatteryStatus::Full,
        battery::State::Empty => BatteryStatus::Empty,
        _ => BatteryStatus::Unknown,
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
