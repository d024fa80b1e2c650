//! Mounted volumes and physical-disk temperatures.
//!
//! Volumes come from sysinfo, queried on the blocking pool (`statvfs`
//! blocks on a hung network mount). Temperatures come from `smartctl`,
//! which needs both the tool and an elevated process; anything else leaves
//! the temperature list unavailable with the matching reason while the
//! volume list stays intact.

use futures_util::future::{join_all, BoxFuture};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use sysinfo::{DiskKind, Disks};

use crate::core::system_monitor::source::{SharedSource, TelemetrySource};
use crate::core::system_monitor::{
    DiskReading, DiskReport, DiskTemperature, Domain, DriveKind, Reading, UnavailableReason,
};
use crate::platform::probe::read_trimmed;
use crate::platform::{blocking, CapabilityProfile, OsFamily, Probe, Tool};

/// Kernel and virtual filesystems that are not storage.
const PSEUDO_FILESYSTEMS: &[&str] = &[
    "tmpfs", "devtmpfs", "proc", "sysfs", "cgroup", "cgroup2", "overlay", "squashfs", "ramfs",
    "autofs", "debugfs", "tracefs", "securityfs", "pstore", "bpf", "fusectl", "configfs",
    "mqueue", "hugetlbfs", "efivarfs", "devpts", "nsfs", "binfmt_misc", "rpc_pipefs", "devfs",
    "nullfs", "fuse.portal", "fuse.gvfsd-fuse",
];

pub fn for_platform(os: OsFamily, probe: Probe) -> SharedSource<DiskReport> {
    let platform = match os {
        OsFamily::Linux | OsFamily::Android => DiskPlatform::Linux,
        OsFamily::MacOs => DiskPlatform::Mac,
        OsFamily::Windows => DiskPlatform::Windows,
        OsFamily::Other => DiskPlatform::Generic,
    };
    Arc::new(DiskSource { platform, probe })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiskPlatform {
    Linux,
    Mac,
    Windows,
    Generic,
}

struct DiskSource {
    platform: DiskPlatform,
    probe: Probe,
}

/// sysinfo's view of one volume before platform fix-ups.
struct RawVolume {
    device: String,
    mount_point: String,
    filesystem_type: String,
    kind: DiskKind,
    total: u64,
    available: u64,
}

fn list_volumes() -> Vec<RawVolume> {
    let disks = Disks::new_with_refreshed_list();
    let mut volumes: Vec<RawVolume> = disks
        .iter()
        .map(|disk| RawVolume {
            device: disk.name().to_string_lossy().to_string(),
            mount_point: disk.mount_point().to_string_lossy().to_string(),
            filesystem_type: disk.file_system().to_string_lossy().to_string(),
            kind: disk.kind(),
            total: disk.total_space(),
            available: disk.available_space(),
        })
        .filter(|v| !is_pseudo_filesystem(&v.filesystem_type) && v.total > 0)
        .collect();

    // Shortest mount first, so "/" wins over "/home" for a shared btrfs device
    volumes.sort_by(|a, b| {
        a.mount_point
            .len()
            .cmp(&b.mount_point.len())
            .then_with(|| a.mount_point.cmp(&b.mount_point))
    });
    let mut seen = BTreeSet::new();
    volumes.retain(|v| seen.insert(v.device.clone()));
    volumes.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
    volumes
}

pub fn is_pseudo_filesystem(fs: &str) -> bool {
    let fs = fs.to_lowercase();
    PSEUDO_FILESYSTEMS.contains(&fs.as_str())
}

fn drive_kind_from_sysinfo(kind: DiskKind) -> Option<DriveKind> {
    match kind {
        DiskKind::SSD => Some(DriveKind::Ssd),
        DiskKind::HDD => Some(DriveKind::Hdd),
        DiskKind::Unknown(_) => None,
    }
}

fn to_reading(volume: &RawVolume, device: String, drive_kind: Reading<DriveKind>) -> DiskReading {
    let used = volume.total.saturating_sub(volume.available);
    DiskReading {
        device,
        mount_point: volume.mount_point.clone(),
        filesystem_type: volume.filesystem_type.clone(),
        drive_kind,
        total_kb: volume.total / 1024,
        used_kb: used / 1024,
        free_kb: volume.available / 1024,
        used_percent: if volume.total > 0 {
            (used as f64 / volume.total as f64) * 100.0
        } else {
            0.0
        },
        // Filled in by the collector
        temperature_celsius: Reading::Unavailable(UnavailableReason::QueryFailed),
    }
}

impl DiskSource {
    async fn volumes(&self, caps: &CapabilityProfile) -> Vec<DiskReading> {
        let raw = match blocking(list_volumes).await {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };

        match self.platform {
            DiskPlatform::Linux => blocking(move || {
                raw.iter()
                    .map(|v| {
                        let kind = drive_kind_from_sysinfo(v.kind)
                            .map(Reading::Available)
                            .unwrap_or_else(|| linux_rotational(&v.device));
                        to_reading(v, v.device.clone(), kind)
                    })
                    .collect::<Vec<_>>()
            })
            .await
            .unwrap_or_default(),
            DiskPlatform::Mac => {
                let infos = join_all(raw.iter().map(|v| async move {
                    self.probe
                        .run(caps, Tool::Diskutil, &["info", v.mount_point.as_str()])
                        .await
                }))
                .await;

                raw.iter()
                    .zip(infos)
                    .map(|(v, info)| {
                        let info = info.ok().map(|out| parse_diskutil_info(&out)).unwrap_or_default();
                        let kind = match drive_kind_from_sysinfo(v.kind).or(info.solid_state) {
                            Some(kind) => Reading::Available(kind),
                            None => Reading::Unavailable(UnavailableReason::QueryFailed),
                        };
                        to_reading(v, info.device_node.unwrap_or_else(|| v.device.clone()), kind)
                    })
                    .collect()
            }
            DiskPlatform::Windows => {
                let letters = match self
                    .probe
                    .powershell(
                        caps,
                        "Get-Partition | Where-Object DriveLetter | ForEach-Object { \"$($_.DriveLetter)|$($_.DiskNumber)\" }",
                    )
                    .await
                {
                    Ok(out) => parse_partition_map(&out),
                    Err(_) => HashMap::new(),
                };

                raw.iter()
                    .map(|v| {
                        let device = v
                            .mount_point
                            .chars()
                            .next()
                            .and_then(|letter| letters.get(&letter.to_ascii_uppercase()))
                            .map(|n| format!("\\\\.\\PhysicalDrive{}", n))
                            .unwrap_or_else(|| v.device.clone());
                        let kind = Reading::from_option(drive_kind_from_sysinfo(v.kind), UnavailableReason::QueryFailed);
                        to_reading(v, device, kind)
                    })
                    .collect()
            }
            DiskPlatform::Generic => raw
                .iter()
                .map(|v| {
                    let kind = Reading::from_option(drive_kind_from_sysinfo(v.kind), UnavailableReason::NotSupportedOnPlatform);
                    to_reading(v, v.device.clone(), kind)
                })
                .collect(),
        }
    }

    async fn temperatures(&self, caps: &CapabilityProfile, volumes: &[DiskReading]) -> Reading<Vec<DiskTemperature>> {
        if self.platform == DiskPlatform::Generic {
            return Reading::Unavailable(UnavailableReason::NotSupportedOnPlatform);
        }
        if !caps.has(Tool::Smartctl) {
            return Reading::Unavailable(UnavailableReason::ToolMissing);
        }
        if !caps.is_elevated {
            return Reading::Unavailable(UnavailableReason::PermissionDenied);
        }

        let devices: BTreeSet<String> = volumes
            .iter()
            .map(|v| base_device(&v.device))
            .filter(|d| is_whole_disk(d))
            .collect();

        let results = join_all(devices.iter().map(|device| async move {
            let target = smartctl_target(device);
            // smartctl sets status bits even when it printed the attributes
            let output = self
                .probe
                .run_program(Tool::Smartctl.binary(), &["-A", target.as_str()])
                .await;
            match output {
                Ok(out) => parse_smartctl_temperature(&out.stdout).map(|celsius| DiskTemperature {
                    device: device.clone(),
                    celsius,
                }),
                Err(reason) => {
                    log::debug!("smartctl -A {} failed: {}", target, reason);
                    None
                }
            }
        }))
        .await;

        let temperatures: Vec<DiskTemperature> = results.into_iter().flatten().collect();
        if temperatures.is_empty() {
            Reading::Unavailable(UnavailableReason::QueryFailed)
        } else {
            Reading::Available(temperatures)
        }
    }
}

impl TelemetrySource for DiskSource {
    type Output = DiskReport;

    fn domain(&self) -> Domain {
        Domain::Disks
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<DiskReport>> {
        Box::pin(async move {
            let volumes = self.volumes(caps).await;
            if volumes.is_empty() {
                return Reading::Unavailable(UnavailableReason::QueryFailed);
            }
            let temperatures = self.temperatures(caps, &volumes).await;
            Reading::Available(DiskReport { volumes, temperatures })
        })
    }
}

fn linux_rotational(device: &str) -> Reading<DriveKind> {
    let base = base_device(device);
    let Some(name) = base.strip_prefix("/dev/") else {
        return Reading::Unavailable(UnavailableReason::QueryFailed);
    };
    match read_trimmed(Path::new("/sys/block").join(name).join("queue/rotational")) {
        Ok(flag) if flag == "0" => Reading::Available(DriveKind::Ssd),
        Ok(flag) if flag == "1" => Reading::Available(DriveKind::Hdd),
        Ok(_) => Reading::Unavailable(UnavailableReason::QueryFailed),
        Err(reason) => Reading::Unavailable(reason),
    }
}

/// Whole-disk device of a partition.
///
/// `/dev/sda1` -> `/dev/sda`, `/dev/nvme0n1p2` -> `/dev/nvme0n1`,
/// `/dev/mmcblk0p1` -> `/dev/mmcblk0`, `/dev/disk3s1s1` -> `/dev/disk3`.
/// Anything else is returned unchanged.
pub fn base_device(device: &str) -> String {
    if let Some(rest) = device.strip_prefix("/dev/disk") {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            return format!("/dev/disk{}", digits);
        }
    }

    if device.starts_with("/dev/nvme") || device.starts_with("/dev/mmcblk") {
        if let Some(pos) = device.rfind('p') {
            let (head, tail) = (&device[..pos], &device[pos + 1..]);
            if !tail.is_empty()
                && tail.chars().all(|c| c.is_ascii_digit())
                && head.ends_with(|c: char| c.is_ascii_digit())
            {
                return head.to_string();
            }
        }
        return device.to_string();
    }

    for prefix in ["/dev/sd", "/dev/vd", "/dev/hd", "/dev/xvd"] {
        if device.starts_with(prefix) {
            return device.trim_end_matches(|c: char| c.is_ascii_digit()).to_string();
        }
    }

    device.to_string()
}

fn is_whole_disk(device: &str) -> bool {
    ["/dev/sd", "/dev/vd", "/dev/hd", "/dev/xvd", "/dev/nvme", "/dev/disk", "\\\\.\\PhysicalDrive"]
        .iter()
        .any(|p| device.starts_with(p))
}

/// smartctl on Windows addresses `\\.\PhysicalDriveN` as `/dev/pdN`.
fn smartctl_target(device: &str) -> String {
    match device.strip_prefix("\\\\.\\PhysicalDrive") {
        Some(n) => format!("/dev/pd{}", n),
        None => device.to_string(),
    }
}

/// Temperature from `smartctl -A`.
///
/// Understands ATA attribute 194 (then 190), the NVMe `Temperature:` line and
/// the SCSI `Current Drive Temperature:` line.
pub fn parse_smartctl_temperature(output: &str) -> Option<u32> {
    let attribute = |id: &str| {
        output.lines().find_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() >= 10 && cols[0] == id {
                cols[9].parse::<u32>().ok()
            } else {
                None
            }
        })
    };

    attribute("194").or_else(|| attribute("190")).or_else(|| {
        output.lines().find_map(|line| {
            let line = line.trim();
            let value = line
                .strip_prefix("Temperature:")
                .or_else(|| line.strip_prefix("Current Drive Temperature:"))?;
            value.split_whitespace().next()?.parse::<u32>().ok()
        })
    })
}

#[derive(Debug, Default, PartialEq)]
pub struct DiskutilInfo {
    pub device_node: Option<String>,
    pub solid_state: Option<DriveKind>,
}

/// `Device Node:` and `Solid State:` of `diskutil info <mount>`.
pub fn parse_diskutil_info(output: &str) -> DiskutilInfo {
    let mut info = DiskutilInfo::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else { continue };
        match key.trim() {
            "Device Node" => info.device_node = Some(value.trim().to_string()),
            "Solid State" => {
                info.solid_state = match value.trim() {
                    "Yes" => Some(DriveKind::Ssd),
                    "No" => Some(DriveKind::Hdd),
                    _ => None,
                }
            }
            _ => {}
        }
    }
    info
}

/// `C|0` lines: drive letter to physical disk number.
pub fn parse_partition_map(output: &str) -> HashMap<char, u32> {
    output
        .lines()
        .filter_map(|line| {
            let (letter, number) = line.trim().split_once('|')?;
            let letter = letter.chars().next()?.to_ascii_uppercase();
            Some((letter, number.trim().parse().ok()?))
        })
        .collect()
}
