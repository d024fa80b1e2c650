//! Audio device, connected monitors and NPU presence.

use futures_util::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

use crate::core::system_monitor::source::{SharedSource, TelemetrySource, Unsupported};
use crate::core::system_monitor::{Domain, MonitorReading, PeripheralsReading, Reading, UnavailableReason};
use crate::platform::{blocking, CapabilityProfile, OsFamily, Probe, Tool};

/// `   1920x1080     60.00*+  59.94` -> resolution and the starred rate
static XRANDR_MODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+x\d+)\s+.*?(\d+(?:\.\d+)?)\*").ok());

static NPU_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)neural|\bnpu\b|\bai boost\b").ok());

pub fn for_platform(os: OsFamily, probe: Probe) -> SharedSource<PeripheralsReading> {
    match os {
        OsFamily::Linux | OsFamily::Android => Arc::new(LinuxPeripherals { probe }),
        OsFamily::MacOs => Arc::new(MacPeripherals { probe }),
        OsFamily::Windows => Arc::new(WindowsPeripherals { probe }),
        OsFamily::Other => Arc::new(Unsupported::new(Domain::Peripherals)),
    }
}

fn non_empty<T>(items: Vec<T>) -> Reading<Vec<T>> {
    if items.is_empty() {
        Reading::Unavailable(UnavailableReason::QueryFailed)
    } else {
        Reading::Available(items)
    }
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Linux
// ============================================================================

struct LinuxPeripherals {
    probe: Probe,
}

impl LinuxPeripherals {
    async fn audio(&self, caps: &CapabilityProfile) -> Reading<String> {
        if let Ok(out) = self.probe.run(caps, Tool::Aplay, &["-l"]).await {
            if let Some(name) = parse_aplay(&out) {
                return Reading::Available(name);
            }
        }
        match blocking(|| std::fs::read_to_string("/proc/asound/cards")).await {
            Ok(Ok(text)) => Reading::from_option(parse_asound_cards(&text), UnavailableReason::QueryFailed),
            Ok(Err(e)) => Reading::Unavailable(UnavailableReason::from(&e)),
            Err(reason) => Reading::Unavailable(reason),
        }
    }

    async fn monitors(&self, caps: &CapabilityProfile) -> Reading<Vec<MonitorReading>> {
        match self.probe.run(caps, Tool::Xrandr, &["--current"]).await {
            Ok(out) => non_empty(parse_xrandr(&out)),
            Err(reason) => Reading::Unavailable(reason),
        }
    }

    async fn npu(&self, caps: &CapabilityProfile) -> Reading<String> {
        if let Ok(out) = self.probe.run(caps, Tool::Lspci, &[]).await {
            if let Some(name) = parse_lspci_npu(&out) {
                return Reading::Available(name);
            }
        }
        if blocking(|| Path::new("/sys/class/intel_npu").exists()).await.unwrap_or(false) {
            return Reading::Available("Intel NPU".to_string());
        }
        if let Ok(out) = self.probe.run(caps, Tool::Lsmod, &[]).await {
            if let Some(module) = parse_lsmod_npu(&out) {
                return Reading::Available(format!("NPU driver loaded ({})", module));
            }
        }
        Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
    }
}

impl TelemetrySource for LinuxPeripherals {
    type Output = PeripheralsReading;

    fn domain(&self) -> Domain {
        Domain::Peripherals
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<PeripheralsReading>> {
        Box::pin(async move {
            let (audio_device, monitors, npu) =
                futures_util::future::join3(self.audio(caps), self.monitors(caps), self.npu(caps)).await;
            Reading::Available(PeripheralsReading {
                audio_device,
                monitors,
                npu,
            })
        })
    }
}

/// `card 0: PCH [HDA Intel PCH], device 0: ALC257 Analog [ALC257 Analog]` -> `PCH [HDA Intel PCH]`
pub fn parse_aplay(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.starts_with("card"))
        .find_map(|line| {
            let (_, rest) = line.split_once(':')?;
            let name = rest.split(',').next()?.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
}

/// ` 0 [PCH            ]: HDA-Intel - HDA Intel PCH` -> `PCH`
pub fn parse_asound_cards(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let start = line.find('[')?;
        let end = line[start..].find(']')? + start;
        let name = line[start + 1..end].trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}

pub fn parse_xrandr(output: &str) -> Vec<MonitorReading> {
    let Some(mode) = XRANDR_MODE.as_ref() else {
        return Vec::new();
    };

    let mut monitors = Vec::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        if let Some((name, _)) = line.split_once(" connected") {
            if !line.starts_with(' ') {
                current = Some(name.trim().to_string());
                continue;
            }
        }
        if line.contains(" disconnected") && !line.starts_with(' ') {
            current = None;
            continue;
        }
        if let Some(name) = current.as_ref() {
            if let Some(caps) = mode.captures(line) {
                monitors.push(MonitorReading {
                    name: name.clone(),
                    resolution: Reading::Available(caps[1].to_string()),
                    refresh_hz: Reading::from_option(caps[2].parse::<f64>().ok(), UnavailableReason::QueryFailed),
                });
                current = None;
            }
        }
    }

    monitors
}

/// Controller name of the first lspci row that looks like an NPU.
pub fn parse_lspci_npu(output: &str) -> Option<String> {
    let pattern = NPU_PATTERN.as_ref()?;
    output.lines().find(|line| pattern.is_match(line)).map(|line| {
        let parts: Vec<&str> = line.splitn(3, ':').collect();
        if parts.len() == 3 {
            parts[2].trim().to_string()
        } else {
            line.trim().to_string()
        }
    })
}

pub fn parse_lsmod_npu(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let module = line.split_whitespace().next()?;
        matches!(module, "intel_vpu" | "intel_npu" | "amdxdna" | "amd_npu").then(|| module.to_string())
    })
}

// ============================================================================
// macOS
// ============================================================================

struct MacPeripherals {
    probe: Probe,
}

impl TelemetrySource for MacPeripherals {
    type Output = PeripheralsReading;

    fn domain(&self) -> Domain {
        Domain::Peripherals
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<PeripheralsReading>> {
        Box::pin(async move {
            let (audio, displays) = futures_util::future::join(
                self.probe.run(caps, Tool::SystemProfiler, &["SPAudioDataType"]),
                self.probe.run(caps, Tool::SystemProfiler, &["SPDisplaysDataType"]),
            )
            .await;

            let audio_device = match audio {
                Ok(out) => Reading::from_option(parse_default_output_device(&out), UnavailableReason::QueryFailed),
                Err(reason) => Reading::Unavailable(reason),
            };
            let monitors = match displays {
                Ok(out) => non_empty(parse_displays(&out)),
                Err(reason) => Reading::Unavailable(reason),
            };
            let npu = if std::env::consts::ARCH == "aarch64" {
                Reading::Available("Apple Neural Engine".to_string())
            } else {
                Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
            };

            Reading::Available(PeripheralsReading {
                audio_device,
                monitors,
                npu,
            })
        })
    }
}

/// A `Name:` header line in system_profiler output (nothing after the colon).
fn profiler_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    trimmed.strip_suffix(':').filter(|name| !name.contains(':'))
}

/// Device block carrying `Default Output Device: Yes`, else the first device.
pub fn parse_default_output_device(output: &str) -> Option<String> {
    let mut current: Option<&str> = None;
    let mut first: Option<&str> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(name) = profiler_header(line) {
            if !matches!(name, "Audio" | "Devices") {
                current = Some(name);
                first = first.or(Some(name));
            }
            continue;
        }
        if trimmed == "Default Output Device: Yes" {
            return current.map(str::to_string);
        }
    }

    first.map(str::to_string)
}

/// Monitors listed below `Displays:` of `system_profiler SPDisplaysDataType`.
pub fn parse_displays(output: &str) -> Vec<MonitorReading> {
    let mut monitors: Vec<MonitorReading> = Vec::new();
    let mut displays_indent: Option<usize> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        if trimmed == "Displays:" {
            displays_indent = Some(indent);
            continue;
        }
        match displays_indent {
            Some(base) if indent > base => {}
            _ => {
                displays_indent = None;
                continue;
            }
        }

        if let Some(name) = profiler_header(line) {
            monitors.push(MonitorReading {
                name: name.to_string(),
                resolution: Reading::Unavailable(UnavailableReason::QueryFailed),
                refresh_hz: Reading::Unavailable(UnavailableReason::QueryFailed),
            });
            continue;
        }

        let Some(monitor) = monitors.last_mut() else { continue };
        if let Some(value) = trimmed.strip_prefix("Resolution:") {
            monitor.resolution = Reading::Available(value.trim().replace(" x ", "x"));
        } else if let Some(value) = trimmed.strip_prefix("Refresh Rate:") {
            if let Some(hz) = value.trim().trim_end_matches("Hz").trim().parse::<f64>().ok() {
                monitor.refresh_hz = Reading::Available(hz);
            }
        } else if let Some(value) = trimmed.strip_prefix("UI Looks like:") {
            if let Some(hz) = value
                .split('@')
                .nth(1)
                .and_then(|rate| rate.trim().trim_end_matches("Hz").trim().parse::<f64>().ok())
            {
                monitor.refresh_hz = Reading::Available(hz);
            }
        }
    }

    monitors
}

// ============================================================================
// Windows
// ============================================================================

struct WindowsPeripherals {
    probe: Probe,
}

const WINDOWS_AUDIO_SCRIPT: &str = "Get-CimInstance Win32_SoundDevice | Select-Object -ExpandProperty Name";
const WINDOWS_MONITOR_SCRIPT: &str = "Get-CimInstance Win32_VideoController | ForEach-Object { \"$($_.Name)|$($_.CurrentHorizontalResolution)|$($_.CurrentVerticalResolution)|$($_.CurrentRefreshRate)\" }";
const WINDOWS_NPU_SCRIPT: &str = "Get-CimInstance Win32_PnPEntity | Where-Object { $_.Name -match 'NPU|neural|AI Boost' } | Select-Object -ExpandProperty Name";

impl TelemetrySource for WindowsPeripherals {
    type Output = PeripheralsReading;

    fn domain(&self) -> Domain {
        Domain::Peripherals
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<PeripheralsReading>> {
        Box::pin(async move {
            let (audio, monitors, npu) = futures_util::future::join3(
                self.probe.powershell(caps, WINDOWS_AUDIO_SCRIPT),
                self.probe.powershell(caps, WINDOWS_MONITOR_SCRIPT),
                self.probe.powershell(caps, WINDOWS_NPU_SCRIPT),
            )
            .await;

            Reading::Available(PeripheralsReading {
                audio_device: match audio {
                    Ok(out) => Reading::from_option(first_line(&out), UnavailableReason::QueryFailed),
                    Err(reason) => Reading::Unavailable(reason),
                },
                monitors: match monitors {
                    Ok(out) => non_empty(parse_video_controllers(&out)),
                    Err(reason) => Reading::Unavailable(reason),
                },
                npu: match npu {
                    Ok(out) => Reading::from_option(first_line(&out), UnavailableReason::NotSupportedOnPlatform),
                    Err(reason) => Reading::Unavailable(reason),
                },
            })
        })
    }
}

/// `name|width|height|hz` rows; blank fields belong to inactive adapters.
pub fn parse_video_controllers(output: &str) -> Vec<MonitorReading> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.trim().split('|').collect();
            if fields.len() < 4 || fields[0].is_empty() {
                return None;
            }
            let resolution = match (fields[1].parse::<u32>(), fields[2].parse::<u32>()) {
                (Ok(w), Ok(h)) => Reading::Available(format!("{}x{}", w, h)),
                _ => Reading::Unavailable(UnavailableReason::QueryFailed),
            };
            Some(MonitorReading {
                name: fields[0].to_string(),
                resolution,
                refresh_hz: Reading::from_option(fields[3].parse::<f64>().ok(), UnavailableReason::QueryFailed),
            })
        })
        .collect()
}
