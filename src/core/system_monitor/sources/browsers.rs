//! Installed web browsers with their versions and install paths.

use futures_util::future::{join_all, BoxFuture};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::system_monitor::source::{SharedSource, TelemetrySource, Unsupported};
use crate::core::system_monitor::{BrowserReading, Domain, Reading, UnavailableReason};
use crate::platform::{blocking, CapabilityProfile, OsFamily, Probe, Tool};

/// Longest version string kept from `--version` output.
const MAX_VERSION_LEN: usize = 50;

const LINUX_COMMANDS: &[(&str, &[&str])] = &[
    ("Google Chrome", &["google-chrome", "google-chrome-stable"]),
    ("Chromium", &["chromium", "chromium-browser"]),
    ("Mozilla Firefox", &["firefox"]),
    ("Microsoft Edge", &["microsoft-edge", "microsoft-edge-stable"]),
    ("Brave", &["brave-browser", "brave"]),
    ("Opera", &["opera"]),
    ("Vivaldi", &["vivaldi", "vivaldi-stable"]),
    ("Floorp", &["floorp"]),
    ("Tor Browser", &["torbrowser-launcher"]),
];

const SNAP_PATHS: &[(&str, &str)] = &[
    ("Chromium", "/snap/bin/chromium"),
    ("Mozilla Firefox", "/snap/bin/firefox"),
    ("Brave", "/snap/bin/brave"),
    ("Floorp", "/snap/bin/floorp"),
    ("Tor Browser", "/snap/bin/torbrowser-launcher"),
];

const FLATPAK_EXPORTS: &str = "/var/lib/flatpak/exports/bin";

const FLATPAK_IDS: &[(&str, &str)] = &[
    ("Chromium", "org.chromium.Chromium"),
    ("Mozilla Firefox", "org.mozilla.firefox"),
    ("Brave", "com.brave.Browser"),
    ("Floorp", "one.ablaze.floorp"),
    ("Tor Browser", "org.torproject.torbrowser-launcher"),
];

const MAC_BUNDLES: &[(&str, &str)] = &[
    ("Google Chrome", "Google Chrome.app"),
    ("Mozilla Firefox", "Firefox.app"),
    ("Safari", "Safari.app"),
    ("Microsoft Edge", "Microsoft Edge.app"),
    ("Brave Browser", "Brave Browser.app"),
    ("Opera", "Opera.app"),
    ("Vivaldi", "Vivaldi.app"),
    ("Floorp", "Floorp.app"),
    ("Orion", "Orion.app"),
    ("Tor Browser", "Tor Browser.app"),
];

pub fn for_platform(os: OsFamily, probe: Probe) -> SharedSource<Vec<BrowserReading>> {
    match os {
        OsFamily::Other => Arc::new(Unsupported::new(Domain::Browsers)),
        _ => Arc::new(BrowserSource { os, probe }),
    }
}

/// A browser found on disk, before its version is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub path: PathBuf,
}

impl Candidate {
    fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
        }
    }
}

struct BrowserSource {
    os: OsFamily,
    probe: Probe,
}

impl BrowserSource {
    fn discover(os: OsFamily) -> Vec<Candidate> {
        let found = match os {
            OsFamily::MacOs => {
                let mut dirs = vec![PathBuf::from("/Applications")];
                if let Some(home) = dirs::home_dir() {
                    dirs.push(home.join("Applications"));
                }
                discover_app_bundles(&dirs)
            }
            OsFamily::Windows => discover_windows(),
            _ => discover_linux(),
        };
        dedup_candidates(found)
    }

    async fn version(&self, caps: &CapabilityProfile, candidate: &Candidate) -> Reading<String> {
        match self.os {
            OsFamily::MacOs => {
                let plist = candidate.path.join("Contents").join("Info.plist");
                let plist = plist.to_string_lossy().to_string();
                if let Ok(out) = self
                    .probe
                    .run(caps, Tool::Plutil, &["-extract", "CFBundleShortVersionString", "raw", "-o", "-", plist.as_str()])
                    .await
                {
                    if let Some(version) = first_line_truncated(&out) {
                        return Reading::Available(version);
                    }
                }
                let stem = candidate
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                let exe = candidate.path.join("Contents").join("MacOS").join(stem);
                self.version_flag(&exe, &["--version"]).await
            }
            OsFamily::Windows => {
                let script = format!(
                    "(Get-Item -LiteralPath '{}').VersionInfo.ProductVersion",
                    candidate.path.to_string_lossy().replace('\'', "''")
                );
                if let Ok(out) = self.probe.powershell(caps, &script).await {
                    if let Some(version) = first_line_truncated(&out) {
                        return Reading::Available(version);
                    }
                }
                self.version_flag(&candidate.path, &["--version"]).await
            }
            _ => match self.version_flag(&candidate.path, &["--version"]).await {
                Reading::Available(version) => Reading::Available(version),
                // Some builds only know the single-dash form
                Reading::Unavailable(_) => self.version_flag(&candidate.path, &["-version"]).await,
            },
        }
    }

    async fn version_flag(&self, exe: &Path, args: &[&str]) -> Reading<String> {
        match self.probe.run_program(exe, args).await {
            Ok(out) if out.success => {
                Reading::from_option(first_line_truncated(out.text()), UnavailableReason::QueryFailed)
            }
            Ok(_) => Reading::Unavailable(UnavailableReason::QueryFailed),
            Err(reason) => Reading::Unavailable(reason),
        }
    }
}

impl TelemetrySource for BrowserSource {
    type Output = Vec<BrowserReading>;

    fn domain(&self) -> Domain {
        Domain::Browsers
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<Vec<BrowserReading>>> {
        Box::pin(async move {
            let os = self.os;
            let candidates = match blocking(move || Self::discover(os)).await {
                Ok(candidates) => candidates,
                Err(reason) => return Reading::Unavailable(reason),
            };
            let versions = join_all(candidates.iter().map(|c| self.version(caps, c))).await;

            Reading::Available(
                candidates
                    .into_iter()
                    .zip(versions)
                    .map(|(candidate, version)| BrowserReading {
                        name: candidate.name,
                        version,
                        install_path: candidate.path.to_string_lossy().to_string(),
                    })
                    .collect(),
            )
        })
    }
}

/// Same browser at the same path is listed once, first occurrence wins.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert((c.name.clone(), c.path.clone())))
        .collect()
}

/// First non-empty line, cut to [`MAX_VERSION_LEN`] characters.
pub fn first_line_truncated(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(line.chars().take(MAX_VERSION_LEN).collect())
}

fn existing(name: &str, path: PathBuf) -> Option<Candidate> {
    path.exists().then(|| Candidate::new(name, path))
}

fn discover_linux() -> Vec<Candidate> {
    let mut found: Vec<Candidate> = LINUX_COMMANDS
        .iter()
        .filter_map(|(name, commands)| {
            commands
                .iter()
                .find_map(|cmd| which::which(cmd).ok())
                .map(|path| Candidate::new(name, path))
        })
        .collect();

    // Tor Browser is usually unpacked by hand
    if let Some(home) = dirs::home_dir() {
        let manual = [
            home.join("tor-browser").join("Browser").join("firefox"),
            home.join("tor-browser").join("firefox"),
            PathBuf::from("/opt/tor-browser/Browser/firefox"),
            home.join(".local/share/torbrowser/tbb/firefox"),
        ];
        if let Some(tor) = manual.into_iter().find_map(|p| existing("Tor Browser", p)) {
            found.push(tor);
        }
    }

    found.extend(SNAP_PATHS.iter().filter_map(|(name, path)| existing(name, PathBuf::from(path))));
    found.extend(
        FLATPAK_IDS
            .iter()
            .filter_map(|(name, id)| existing(name, Path::new(FLATPAK_EXPORTS).join(id))),
    );
    found
}

/// Known `.app` bundles in each directory, in directory order.
pub fn discover_app_bundles(dirs: &[PathBuf]) -> Vec<Candidate> {
    dirs.iter()
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| {
            MAC_BUNDLES
                .iter()
                .filter_map(move |(name, bundle)| existing(name, dir.join(bundle)))
        })
        .collect()
}

fn discover_windows() -> Vec<Candidate> {
    let env_dir = |key: &str, fallback: &str| {
        std::env::var_os(key)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(fallback))
    };
    let program_files = env_dir("ProgramFiles", "C:\\Program Files");
    let program_files_x86 = env_dir("ProgramFiles(x86)", "C:\\Program Files (x86)");
    let local_appdata = std::env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .or_else(dirs::data_local_dir)
        .unwrap_or_default();
    let desktop = dirs::desktop_dir().unwrap_or_default();

    let mut paths: Vec<(&str, PathBuf)> = Vec::new();
    for root in [&program_files, &program_files_x86] {
        paths.push(("Google Chrome", root.join("Google\\Chrome\\Application\\chrome.exe")));
        paths.push(("Mozilla Firefox", root.join("Mozilla Firefox\\firefox.exe")));
        paths.push(("Microsoft Edge", root.join("Microsoft\\Edge\\Application\\msedge.exe")));
        paths.push(("Floorp", root.join("Floorp\\floorp.exe")));
        paths.push(("Tor Browser", root.join("Tor Browser\\Browser\\firefox.exe")));
    }
    paths.push(("Brave", program_files.join("BraveSoftware\\Brave-Browser\\Application\\brave.exe")));
    paths.push(("Opera", program_files.join("Opera\\launcher.exe")));
    paths.push(("Vivaldi", program_files.join("Vivaldi\\Application\\vivaldi.exe")));
    paths.push(("Google Chrome", local_appdata.join("Google\\Chrome\\Application\\chrome.exe")));
    paths.push(("Floorp", local_appdata.join("floorp\\floorp.exe")));
    paths.push(("Tor Browser", local_appdata.join("Tor Browser\\Browser\\firefox.exe")));
    paths.push(("Tor Browser", desktop.join("Tor Browser\\Browser\\firefox.exe")));

    let mut found: Vec<Candidate> = paths
        .into_iter()
        .filter_map(|(name, path)| existing(name, path))
        .collect();
    found.extend(registry_app_paths());
    found
}

/// `App Paths` registry entries for the browsers that register one.
#[cfg(windows)]
fn registry_app_paths() -> Vec<Candidate> {
    use winreg::enums::*;
    use winreg::RegKey;

    const APP_PATHS: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\App Paths";
    const EXES: [(&str, &str); 4] = [
        ("Google Chrome", "chrome.exe"),
        ("Mozilla Firefox", "firefox.exe"),
        ("Microsoft Edge", "msedge.exe"),
        ("Brave", "brave.exe"),
    ];

    let mut found = Vec::new();
    for hive in [HKEY_LOCAL_MACHINE, HKEY_CURRENT_USER] {
        let root = RegKey::predef(hive);
        for (name, exe) in EXES {
            let Ok(key) = root.open_subkey(format!("{}\\{}", APP_PATHS, exe)) else { continue };
            let Ok(path) = key.get_value::<String, _>("") else { continue };
            if let Some(candidate) = existing(name, PathBuf::from(path.trim_matches('"'))) {
                found.push(candidate);
            }
        }
    }
    found
}

#[cfg(not(windows))]
fn registry_app_paths() -> Vec<Candidate> {
    Vec::new()
}
