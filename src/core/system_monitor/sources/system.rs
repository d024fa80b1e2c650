//! OS, kernel, hostname, uptime and machine model.

use futures_util::future::BoxFuture;
use std::sync::Arc;
use sysinfo::System;

use crate::core::system_monitor::source::{SharedSource, TelemetrySource};
use crate::core::system_monitor::{Domain, Reading, SystemReading, UnavailableReason};
use crate::platform::probe::read_trimmed;
use crate::platform::{blocking, CapabilityProfile, OsFamily, Probe, Tool};

pub fn for_platform(os: OsFamily, probe: Probe) -> SharedSource<SystemReading> {
    match os {
        OsFamily::Linux | OsFamily::Android => Arc::new(LinuxSystem { android: os == OsFamily::Android }),
        OsFamily::MacOs => Arc::new(MacSystem { probe }),
        OsFamily::Windows => Arc::new(WindowsSystem { probe }),
        OsFamily::Other => Arc::new(GenericSystem),
    }
}

fn hostname() -> Reading<String> {
    Reading::from_option(System::host_name(), UnavailableReason::QueryFailed)
}

fn kernel() -> Reading<String> {
    Reading::from_option(System::kernel_version(), UnavailableReason::QueryFailed)
}

// ============================================================================
// Linux / Termux
// ============================================================================

struct LinuxSystem {
    android: bool,
}

impl LinuxSystem {
    fn os_identity(android: bool) -> (String, Reading<String>) {
        if let Ok(text) = std::fs::read_to_string("/etc/os-release") {
            let (name, version) = parse_os_release(&text);
            return (
                name.unwrap_or_else(|| "Linux".to_string()),
                Reading::from_option(version, UnavailableReason::QueryFailed),
            );
        }

        if android {
            let version = std::fs::read_to_string("/system/build.prop")
                .map_err(UnavailableReason::from)
                .and_then(|text| {
                    parse_build_prop_release(&text).ok_or(UnavailableReason::QueryFailed)
                });
            return ("Android (Termux)".to_string(), Reading::from(version));
        }

        ("Linux".to_string(), Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform))
    }

    /// os-release and DMI are plain files, read on the blocking pool.
    fn read_blocking(android: bool) -> Reading<SystemReading> {
        let (os_name, os_version) = Self::os_identity(android);

        let vendor = read_trimmed("/sys/class/dmi/id/sys_vendor").ok();
        let product = read_trimmed("/sys/class/dmi/id/product_name").ok();
        let version = read_trimmed("/sys/class/dmi/id/product_version").ok();

        Reading::Available(SystemReading {
            os_name,
            os_version,
            kernel: kernel(),
            hostname: hostname(),
            uptime_secs: System::uptime(),
            system_model: Reading::from_option(
                format_dmi_model(vendor.as_deref(), product.as_deref(), version.as_deref()),
                UnavailableReason::NotSupportedOnPlatform,
            ),
        })
    }
}

impl TelemetrySource for LinuxSystem {
    type Output = SystemReading;

    fn domain(&self) -> Domain {
        Domain::System
    }

    fn read<'a>(&'a self, _caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<SystemReading>> {
        let android = self.android;
        Box::pin(async move {
            blocking(move || Self::read_blocking(android))
                .await
                .unwrap_or_else(Reading::Unavailable)
        })
    }
}

/// Extract `PRETTY_NAME` and `VERSION_ID` from `/etc/os-release`.
pub fn parse_os_release(text: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut version = None;

    for line in text.lines() {
        if let Some(value) = line.strip_prefix("PRETTY_NAME=") {
            name = Some(value.trim().trim_matches('"').to_string());
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            version = Some(value.trim().trim_matches('"').to_string());
        }
    }

    (name, version)
}

fn parse_build_prop_release(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.strip_prefix("ro.build.version.release="))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Combine DMI vendor/product/version, skipping the version when the product
/// name already contains it.
pub fn format_dmi_model(vendor: Option<&str>, product: Option<&str>, version: Option<&str>) -> Option<String> {
    if vendor.is_none() && product.is_none() {
        return None;
    }

    let base = format!("{} {}", vendor.unwrap_or("Unknown"), product.unwrap_or("Unknown"))
        .trim()
        .to_string();

    match (version, product) {
        (Some(v), Some(p)) if !p.contains(v) => Some(format!("{} ({})", base, v)),
        (Some(v), None) => Some(format!("{} ({})", base, v)),
        _ => Some(base),
    }
}

// ============================================================================
// macOS
// ============================================================================

struct MacSystem {
    probe: Probe,
}

impl TelemetrySource for MacSystem {
    type Output = SystemReading;

    fn domain(&self) -> Domain {
        Domain::System
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<SystemReading>> {
        Box::pin(async move {
            let name = self.probe.run(caps, Tool::SwVers, &["-productName"]).await;
            let version = self.probe.run(caps, Tool::SwVers, &["-productVersion"]).await;
            let model = self.probe.run(caps, Tool::Sysctl, &["-n", "hw.model"]).await;

            Reading::Available(SystemReading {
                os_name: name
                    .map(|n| n.trim().to_string())
                    .unwrap_or_else(|_| "macOS".to_string()),
                os_version: Reading::from(version.map(|v| v.trim().to_string())),
                kernel: kernel(),
                hostname: hostname(),
                uptime_secs: System::uptime(),
                system_model: Reading::from(model.map(|m| format!("Apple {}", m.trim()))),
            })
        })
    }
}

// ============================================================================
// Windows
// ============================================================================

struct WindowsSystem {
    probe: Probe,
}

const WINDOWS_MODEL_SCRIPT: &str =
    "$cs = Get-CimInstance Win32_ComputerSystem; \"$($cs.Manufacturer) $($cs.Model)\"";

impl TelemetrySource for WindowsSystem {
    type Output = SystemReading;

    fn domain(&self) -> Domain {
        Domain::System
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<SystemReading>> {
        Box::pin(async move {
            let build = System::kernel_version();
            let os_name = build
                .as_deref()
                .map(windows_name_for_build)
                .unwrap_or("Windows")
                .to_string();

            let model = self
                .probe
                .powershell(caps, WINDOWS_MODEL_SCRIPT)
                .await
                .and_then(|out| {
                    let model = out.trim().to_string();
                    if model.is_empty() {
                        Err(UnavailableReason::QueryFailed)
                    } else {
                        Ok(model)
                    }
                });

            Reading::Available(SystemReading {
                os_name,
                os_version: Reading::from_option(System::os_version(), UnavailableReason::QueryFailed),
                kernel: Reading::from_option(build, UnavailableReason::QueryFailed),
                hostname: hostname(),
                uptime_secs: System::uptime(),
                system_model: Reading::from(model),
            })
        })
    }
}

/// Windows 11 kept the 10.0 version number; only the build tells them apart.
pub fn windows_name_for_build(version: &str) -> &'static str {
    let build = version
        .rsplit('.')
        .next()
        .and_then(|b| b.trim().parse::<u32>().ok())
        .unwrap_or(0);

    if build >= 22000 {
        "Windows 11"
    } else {
        "Windows 10"
    }
}

// ============================================================================
// Anything else sysinfo knows about
// ============================================================================

struct GenericSystem;

impl TelemetrySource for GenericSystem {
    type Output = SystemReading;

    fn domain(&self) -> Domain {
        Domain::System
    }

    fn read<'a>(&'a self, _caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<SystemReading>> {
        Box::pin(async move {
            Reading::Available(SystemReading {
                os_name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
                os_version: Reading::from_option(System::os_version(), UnavailableReason::QueryFailed),
                kernel: kernel(),
                hostname: hostname(),
                uptime_secs: System::uptime(),
                system_model: Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform),
            })
        })
    }
}
