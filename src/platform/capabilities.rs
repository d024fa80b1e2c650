//! Platform capability resolution.
//!
//! Resolved exactly once at startup. Every detection failure degrades the
//! matching flag to `false` instead of aborting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::elevation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    Linux,
    /// Android userland (Termux)
    Android,
    MacOs,
    Windows,
    Other,
}

impl OsFamily {
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "android" => OsFamily::Android,
            "linux" if Path::new("/data/data/com.termux").exists() => OsFamily::Android,
            "linux" => OsFamily::Linux,
            "macos" => OsFamily::MacOs,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Other,
        }
    }

    /// Linux and Android share sysfs/procfs and most userland tools.
    pub fn is_linux_like(&self) -> bool {
        matches!(self, OsFamily::Linux | OsFamily::Android)
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Linux => write!(f, "Linux"),
            OsFamily::Android => write!(f, "Android"),
            OsFamily::MacOs => write!(f, "macOS"),
            OsFamily::Windows => write!(f, "Windows"),
            OsFamily::Other => write!(f, "Other"),
        }
    }
}

/// Optional external tools that sources may shell out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tool {
    Smartctl,
    NvidiaSmi,
    RocmSmi,
    Ss,
    Netstat,
    Lsof,
    Ip,
    Route,
    Ifconfig,
    Xrandr,
    Aplay,
    Lspci,
    Lsmod,
    SystemProfiler,
    SwVers,
    Sysctl,
    Diskutil,
    Plutil,
    PowerShell,
    Getmac,
}

impl Tool {
    pub const ALL: [Tool; 20] = [
        Tool::Smartctl,
        Tool::NvidiaSmi,
        Tool::RocmSmi,
        Tool::Ss,
        Tool::Netstat,
        Tool::Lsof,
        Tool::Ip,
        Tool::Route,
        Tool::Ifconfig,
        Tool::Xrandr,
        Tool::Aplay,
        Tool::Lspci,
        Tool::Lsmod,
        Tool::SystemProfiler,
        Tool::SwVers,
        Tool::Sysctl,
        Tool::Diskutil,
        Tool::Plutil,
        Tool::PowerShell,
        Tool::Getmac,
    ];

    /// Executable name as looked up in the search path
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::Smartctl => "smartctl",
            Tool::NvidiaSmi => "nvidia-smi",
            Tool::RocmSmi => "rocm-smi",
            Tool::Ss => "ss",
            Tool::Netstat => "netstat",
            Tool::Lsof => "lsof",
            Tool::Ip => "ip",
            Tool::Route => "route",
            Tool::Ifconfig => "ifconfig",
            Tool::Xrandr => "xrandr",
            Tool::Aplay => "aplay",
            Tool::Lspci => "lspci",
            Tool::Lsmod => "lsmod",
            Tool::SystemProfiler => "system_profiler",
            Tool::SwVers => "sw_vers",
            Tool::Sysctl => "sysctl",
            Tool::Diskutil => "diskutil",
            Tool::Plutil => "plutil",
            Tool::PowerShell => "powershell",
            Tool::Getmac => "getmac",
        }
    }
}

/// Process-lifetime record of OS family, elevation and tool availability.
///
/// Read-only after [`CapabilityProfile::resolve`]; sources borrow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub os_family: OsFamily,
    pub is_elevated: bool,
    tools: BTreeSet<Tool>,
}

impl CapabilityProfile {
    /// Detect the running platform. Call once per process.
    pub fn resolve() -> Self {
        let os_family = OsFamily::detect();
        let is_elevated = elevation::is_elevated();

        let tools: BTreeSet<Tool> = Tool::ALL
            .iter()
            .copied()
            .filter(|tool| match which::which(tool.binary()) {
                Ok(path) => {
                    log::debug!("Found {} at {}", tool.binary(), path.display());
                    true
                }
                Err(_) => false,
            })
            .collect();

        log::info!(
            "Capabilities: os={}, elevated={}, tools={}",
            os_family,
            is_elevated,
            tools.len()
        );

        Self {
            os_family,
            is_elevated,
            tools,
        }
    }

    /// Build a profile from explicit values, bypassing detection.
    pub fn new(os_family: OsFamily, is_elevated: bool, tools: impl IntoIterator<Item = Tool>) -> Self {
        Self {
            os_family,
            is_elevated,
            tools: tools.into_iter().collect(),
        }
    }

    pub fn has(&self, tool: Tool) -> bool {
        self.tools.contains(&tool)
    }

    pub fn tools(&self) -> impl Iterator<Item = Tool> + '_ {
        self.tools.iter().copied()
    }
}
