#[cfg(feature = "nvml")]
use nvml_wrapper::{enum_wrappers::device::TemperatureSensor, Nvml};
#[cfg(feature = "nvml")]
use once_cell::sync::Lazy;

use crate::core::system_monitor::{GpuReading, GpuVendor, Reading, UnavailableReason};

/// Singleton - NVML must be initialized ONCE only
#[cfg(feature = "nvml")]
static NVML: Lazy<Option<Nvml>> = Lazy::new(|| match Nvml::init() {
    Ok(nvml) => Some(nvml),
    Err(e) => {
        log::debug!("NVML not available: {}", e);
        None
    }
});

/// Read every NVIDIA GPU through NVML.
///
/// Returns `None` when NVML is not compiled in or the driver library is
/// missing, so the caller can fall back to `nvidia-smi`.
#[cfg(feature = "nvml")]
pub fn read_nvml() -> Option<Vec<GpuReading>> {
    let nvml = NVML.as_ref()?;
    let count = nvml.device_count().ok()?;

    let readings = (0..count)
        .map(|index| match nvml.device_by_index(index) {
            Ok(device) => GpuReading {
                index: index as usize,
                name: Reading::from_option(device.name().ok(), UnavailableReason::QueryFailed),
                vendor: GpuVendor::Nvidia,
                utilization_percent: Reading::from_option(
                    device.utilization_rates().ok().map(|u| u.gpu as f64),
                    UnavailableReason::QueryFailed,
                ),
                temperature_celsius: Reading::from_option(
                    device
                        .temperature(TemperatureSensor::Gpu)
                        .ok()
                        .map(|t| t as f64),
                    UnavailableReason::QueryFailed,
                ),
            },
            Err(e) => {
                log::debug!("NVML device {} unavailable: {}", index, e);
                GpuReading {
                    index: index as usize,
                    name: Reading::Unavailable(UnavailableReason::QueryFailed),
                    vendor: GpuVendor::Nvidia,
                    utilization_percent: Reading::Unavailable(UnavailableReason::QueryFailed),
                    temperature_celsius: Reading::Unavailable(UnavailableReason::QueryFailed),
                }
            }
        })
        .collect();

    Some(readings)
}

#[cfg(not(feature = "nvml"))]
pub fn read_nvml() -> Option<Vec<GpuReading>> {
    None
}
