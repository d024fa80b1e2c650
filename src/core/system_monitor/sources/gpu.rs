//! GPU name, vendor, utilization and temperature.
//!
//! Strategies are tried in order until one returns at least one GPU:
//! NVML, `nvidia-smi`, `rocm-smi`, then the kernel DRM interface.

use futures_util::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;

use crate::core::system_monitor::source::{SharedSource, TelemetrySource, Unsupported};
use crate::core::system_monitor::{Domain, GpuReading, GpuVendor, Reading, UnavailableReason};
use crate::platform::gpu::read_nvml;
use crate::platform::probe::{read_number, read_trimmed};
use crate::platform::{CapabilityProfile, OsFamily, Probe, Tool};

const DRM_ROOT: &str = "/sys/class/drm";

const NVIDIA_SMI_QUERY: [&str; 2] = [
    "--query-gpu=name,utilization.gpu,temperature.gpu",
    "--format=csv,noheader,nounits",
];

pub fn for_platform(os: OsFamily, probe: Probe) -> SharedSource<Vec<GpuReading>> {
    match os {
        OsFamily::Linux | OsFamily::Android => Arc::new(LinuxGpu { probe }),
        OsFamily::MacOs => Arc::new(MacGpu { probe }),
        OsFamily::Windows => Arc::new(WindowsGpu { probe }),
        OsFamily::Other => Arc::new(Unsupported::new(Domain::Gpu)),
    }
}

fn non_empty(gpus: Vec<GpuReading>) -> Reading<Vec<GpuReading>> {
    if gpus.is_empty() {
        Reading::Unavailable(UnavailableReason::QueryFailed)
    } else {
        Reading::Available(gpus)
    }
}

async fn nvidia_smi(probe: &Probe, caps: &CapabilityProfile) -> Reading<Vec<GpuReading>> {
    match probe.run(caps, Tool::NvidiaSmi, &NVIDIA_SMI_QUERY).await {
        Ok(out) => non_empty(parse_nvidia_smi_csv(&out)),
        Err(reason) => Reading::Unavailable(reason),
    }
}

fn nvml() -> Reading<Vec<GpuReading>> {
    match read_nvml() {
        Some(gpus) => non_empty(gpus),
        None => Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform),
    }
}

// ============================================================================
// Linux
// ============================================================================

struct LinuxGpu {
    probe: Probe,
}

impl TelemetrySource for LinuxGpu {
    type Output = Vec<GpuReading>;

    fn domain(&self) -> Domain {
        Domain::Gpu
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<Vec<GpuReading>>> {
        Box::pin(async move {
            if let reading @ Reading::Available(_) = nvml() {
                return reading;
            }
            if let reading @ Reading::Available(_) = nvidia_smi(&self.probe, caps).await {
                return reading;
            }
            if let Ok(out) = self.probe.run(caps, Tool::RocmSmi, &["--showuse", "--showtemp", "--showproductname", "--json"]).await {
                if let reading @ Reading::Available(_) = non_empty(parse_rocm_smi_json(&out)) {
                    return reading;
                }
            }

            let names = match self.probe.run(caps, Tool::Lspci, &[]).await {
                Ok(out) => parse_lspci_gpus(&out),
                Err(_) => Vec::new(),
            };
            let drm = read_drm_gpus(Path::new(DRM_ROOT), &names);
            if !drm.is_empty() {
                return Reading::Available(drm);
            }

            // No DRM cards (containers, Termux) but lspci still names them
            if names.is_empty() {
                Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform)
            } else {
                Reading::Available(
                    names
                        .into_iter()
                        .enumerate()
                        .map(|(index, name)| name_only(index, name, UnavailableReason::NotSupportedOnPlatform))
                        .collect(),
                )
            }
        })
    }
}

fn name_only(index: usize, name: String, missing: UnavailableReason) -> GpuReading {
    GpuReading {
        index,
        vendor: GpuVendor::from_name(&name),
        name: Reading::Available(name),
        utilization_percent: Reading::Unavailable(missing),
        temperature_celsius: Reading::Unavailable(missing),
    }
}

/// Parse one `name, util, temp` row per GPU. `[N/A]` fields stay unavailable.
pub fn parse_nvidia_smi_csv(output: &str) -> Vec<GpuReading> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let number = |i: usize| {
                Reading::from_option(
                    fields.get(i).and_then(|v| v.parse::<f64>().ok()),
                    UnavailableReason::QueryFailed,
                )
            };
            let name = fields.first().map(|s| s.to_string()).filter(|s| !s.is_empty());

            GpuReading {
                index,
                name: Reading::from_option(name, UnavailableReason::QueryFailed),
                vendor: GpuVendor::Nvidia,
                utilization_percent: number(1),
                temperature_celsius: number(2),
            }
        })
        .collect()
}

/// Parse `rocm-smi --showuse --showtemp --showproductname --json`.
pub fn parse_rocm_smi_json(output: &str) -> Vec<GpuReading> {
    let Ok(serde_json::Value::Object(cards)) = serde_json::from_str::<serde_json::Value>(output) else {
        return Vec::new();
    };

    let mut names: Vec<&String> = cards.keys().filter(|k| k.starts_with("card")).collect();
    names.sort();

    names
        .into_iter()
        .enumerate()
        .filter_map(|(index, card)| {
            let fields = cards.get(card)?.as_object()?;
            let find = |pred: &dyn Fn(&str) -> bool| {
                fields
                    .iter()
                    .find(|(k, _)| pred(&k.to_lowercase()))
                    .and_then(|(_, v)| v.as_str())
                    .map(str::trim)
            };
            let number = |value: Option<&str>| {
                Reading::from_option(value.and_then(|v| v.parse::<f64>().ok()), UnavailableReason::QueryFailed)
            };

            let temperature = find(&|k| k.contains("temperature") && k.contains("edge"))
                .or_else(|| find(&|k| k.contains("temperature")));
            let name = find(&|k| k.contains("card series"))
                .or_else(|| find(&|k| k.contains("card model")))
                .map(str::to_string);

            Some(GpuReading {
                index,
                name: Reading::from_option(name, UnavailableReason::QueryFailed),
                vendor: GpuVendor::Amd,
                utilization_percent: number(find(&|k| k.contains("gpu use"))),
                temperature_celsius: number(temperature),
            })
        })
        .collect()
}

/// Names of VGA/3D controllers from plain `lspci`.
pub fn parse_lspci_gpus(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| {
            line.contains("VGA compatible controller") || line.contains("3D controller") || line.contains("Display controller")
        })
        .filter_map(|line| {
            let (_, rest) = line.split_once("controller")?;
            let name = rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            let name = name.split(" (rev").next().unwrap_or(name).trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

pub fn vendor_from_pci_id(id: &str) -> GpuVendor {
    match id.trim().to_lowercase().as_str() {
        "0x10de" => GpuVendor::Nvidia,
        "0x1002" => GpuVendor::Amd,
        "0x8086" => GpuVendor::Intel,
        _ => GpuVendor::Unknown,
    }
}

/// Read `cardN` entries of a DRM root: vendor id, amdgpu busy percent and the
/// first hwmon temperature.
pub fn read_drm_gpus(root: &Path, names: &[String]) -> Vec<GpuReading> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    let mut cards: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            let number = name.strip_prefix("card")?.parse::<u32>().ok()?;
            Some((number, e.path()))
        })
        .collect();
    cards.sort_by_key(|(number, _)| *number);

    cards
        .into_iter()
        .enumerate()
        .map(|(index, (_, card))| {
            let device = card.join("device");
            let vendor = read_trimmed(device.join("vendor"))
                .map(|id| vendor_from_pci_id(&id))
                .unwrap_or_default();

            let name = names
                .get(index)
                .cloned()
                .or_else(|| names.iter().find(|n| GpuVendor::from_name(n) == vendor).cloned());

            GpuReading {
                index,
                name: Reading::from_option(name, UnavailableReason::ToolMissing),
                vendor,
                utilization_percent: Reading::from(read_number::<_, f64>(device.join("gpu_busy_percent"))),
                temperature_celsius: Reading::from(read_hwmon_temp(&device)),
            }
        })
        .collect()
}

fn read_hwmon_temp(device: &Path) -> Result<f64, UnavailableReason> {
    let entries = std::fs::read_dir(device.join("hwmon"))?;
    let mut dirs: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    dirs.sort();

    dirs.iter()
        .find_map(|dir| read_number::<_, f64>(dir.join("temp1_input")).ok())
        .map(|milli| milli / 1000.0)
        .ok_or(UnavailableReason::NotSupportedOnPlatform)
}

// ============================================================================
// macOS
// ============================================================================

struct MacGpu {
    probe: Probe,
}

impl TelemetrySource for MacGpu {
    type Output = Vec<GpuReading>;

    fn domain(&self) -> Domain {
        Domain::Gpu
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<Vec<GpuReading>>> {
        Box::pin(async move {
            match self.probe.run(caps, Tool::SystemProfiler, &["SPDisplaysDataType"]).await {
                Ok(out) => non_empty(
                    parse_chipset_models(&out)
                        .into_iter()
                        .enumerate()
                        .map(|(index, name)| name_only(index, name, UnavailableReason::NotSupportedOnPlatform))
                        .collect(),
                ),
                Err(reason) => Reading::Unavailable(reason),
            }
        })
    }
}

/// `Chipset Model: Apple M2 Pro` lines of `system_profiler SPDisplaysDataType`.
pub fn parse_chipset_models(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Chipset Model:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

// ============================================================================
// Windows
// ============================================================================

struct WindowsGpu {
    probe: Probe,
}

impl TelemetrySource for WindowsGpu {
    type Output = Vec<GpuReading>;

    fn domain(&self) -> Domain {
        Domain::Gpu
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<Vec<GpuReading>>> {
        Box::pin(async move {
            if let reading @ Reading::Available(_) = nvml() {
                return reading;
            }
            if let reading @ Reading::Available(_) = nvidia_smi(&self.probe, caps).await {
                return reading;
            }

            match self
                .probe
                .powershell(caps, "Get-CimInstance Win32_VideoController | Select-Object -ExpandProperty Name")
                .await
            {
                Ok(out) => non_empty(
                    out.lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .enumerate()
                        .map(|(index, name)| name_only(index, name.to_string(), UnavailableReason::ToolMissing))
                        .collect(),
                ),
                Err(reason) => Reading::Unavailable(reason),
            }
        })
    }
}
