//! CPU temperature sensors and fan speeds.

use futures_util::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;
use sysinfo::Components;

use crate::core::system_monitor::source::{SharedSource, TelemetrySource};
use crate::core::system_monitor::{Domain, FanReading, Reading, SensorsReading, TemperatureSensor, UnavailableReason};
use crate::platform::probe::{read_number, read_trimmed};
use crate::platform::{blocking, CapabilityProfile, OsFamily};

const HWMON_ROOT: &str = "/sys/class/hwmon";

pub fn for_platform(os: OsFamily) -> SharedSource<SensorsReading> {
    Arc::new(SensorSource { os })
}

struct SensorSource {
    os: OsFamily,
}

impl TelemetrySource for SensorSource {
    type Output = SensorsReading;

    fn domain(&self) -> Domain {
        Domain::Sensors
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<SensorsReading>> {
        let (os, elevated) = (self.os, caps.is_elevated);
        Box::pin(async move {
            blocking(move || read_sensors(os, elevated))
                .await
                .unwrap_or_else(Reading::Unavailable)
        })
    }
}

fn read_sensors(os: OsFamily, elevated: bool) -> Reading<SensorsReading> {
    let components = Components::new_with_refreshed_list();
    let sensors: Vec<TemperatureSensor> = components
        .iter()
        .filter_map(|c| {
            c.temperature()
                .filter(|t| t.is_finite() && *t > 0.0)
                .map(|t| TemperatureSensor {
                    label: c.label().to_string(),
                    celsius: t as f64,
                })
        })
        .collect();

    let cpu_temperatures = if sensors.is_empty() {
        // Windows only exposes thermal zones to elevated callers
        if os == OsFamily::Windows && !elevated {
            Reading::Unavailable(UnavailableReason::PermissionDenied)
        } else {
            Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
        }
    } else {
        Reading::Available(select_cpu_sensors(sensors))
    };

    let fans = if os.is_linux_like() {
        read_hwmon_fans(Path::new(HWMON_ROOT))
    } else {
        Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
    };

    Reading::Available(SensorsReading { cpu_temperatures, fans })
}

fn is_cpu_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    ["core", "package", "cpu", "tctl", "tdie", "coretemp", "k10temp", "zenpower"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Keep CPU sensors; when nothing looks like a CPU, the first sensor stands in.
pub fn select_cpu_sensors(sensors: Vec<TemperatureSensor>) -> Vec<TemperatureSensor> {
    let cpu: Vec<TemperatureSensor> = sensors.iter().filter(|s| is_cpu_label(&s.label)).cloned().collect();
    if cpu.is_empty() {
        sensors.into_iter().take(1).collect()
    } else {
        cpu
    }
}

/// Read every `fan*_input` below a hwmon root.
pub fn read_hwmon_fans(root: &Path) -> Reading<Vec<FanReading>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => return Reading::Unavailable(UnavailableReason::from(&e)),
    };

    let mut chips: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    chips.sort();

    let mut fans = Vec::new();
    for chip in chips {
        let chip_name = read_trimmed(chip.join("name")).unwrap_or_else(|_| "hwmon".to_string());

        let Ok(files) = std::fs::read_dir(&chip) else { continue };
        let mut inputs: Vec<String> = files
            .filter_map(|f| f.ok())
            .filter_map(|f| f.file_name().to_str().map(str::to_string))
            .filter(|name| name.starts_with("fan") && name.ends_with("_input"))
            .collect();
        inputs.sort();

        for input in inputs {
            let Ok(rpm) = read_number::<_, u32>(chip.join(&input)) else { continue };
            let prefix = input.trim_end_matches("_input");
            let label = read_trimmed(chip.join(format!("{}_label", prefix)))
                .unwrap_or_else(|_| format!("{} {}", chip_name, prefix));
            fans.push(FanReading { label, rpm });
        }
    }

    if fans.is_empty() {
        Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
    } else {
        Reading::Available(fans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(label: &str, celsius: f64) -> TemperatureSensor {
        TemperatureSensor {
            label: label.to_string(),
            celsius,
        }
    }

    #[test]
    fn test_select_cpu_sensors() {
        let sensors = vec![
            sensor("acpitz temp1", 40.0),
            sensor("coretemp Package id 0", 55.0),
            sensor("coretemp Core 0", 52.0),
            sensor("nvme Composite", 38.0),
        ];
        let cpu = select_cpu_sensors(sensors);
        assert_eq!(cpu.len(), 2);
        assert_eq!(cpu[0].label, "coretemp Package id 0");
    }

    #[test]
    fn test_select_cpu_sensors_falls_back_to_first() {
        let cpu = select_cpu_sensors(vec![sensor("acpitz temp1", 40.0), sensor("iwlwifi", 35.0)]);
        assert_eq!(cpu, vec![sensor("acpitz temp1", 40.0)]);
    }

    #[test]
    fn test_read_hwmon_fans() {
        let root = tempfile::tempdir().unwrap();
        let chip = root.path().join("hwmon2");
        std::fs::create_dir(&chip).unwrap();
        std::fs::write(chip.join("name"), "thinkpad\n").unwrap();
        std::fs::write(chip.join("fan1_input"), "2400\n").unwrap();
        std::fs::write(chip.join("fan2_input"), "0\n").unwrap();
        std::fs::write(chip.join("fan2_label"), "Aux Fan\n").unwrap();

        let fans = read_hwmon_fans(root.path()).into_value().unwrap();
        assert_eq!(
            fans,
            vec![
                FanReading { label: "thinkpad fan1".to_string(), rpm: 2400 },
                FanReading { label: "Aux Fan".to_string(), rpm: 0 },
            ]
        );
    }

    #[test]
    fn test_missing_hwmon_root() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(
            read_hwmon_fans(&root.path().join("nope")),
            Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
        );
    }
}
