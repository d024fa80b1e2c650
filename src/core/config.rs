//! Process-wide settings.
//!
//! Built once at startup from defaults, an optional JSON file and command
//! line overrides. Never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DashError, Result};

pub const DEFAULT_REFRESH_SECS: u64 = 45;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 45;
pub const DEFAULT_SOURCE_BUDGET_SECS: u64 = 15;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between two dashboard refreshes
    pub refresh_interval_secs: u64,
    /// Lifetime of cached network lookups, independent of the refresh interval
    pub cache_ttl_secs: u64,
    /// Deadline for one source invocation within a tick
    pub source_budget_secs: u64,
    /// Deadline for one external tool invocation
    pub tool_timeout_secs: u64,
    /// Deadline for one network endpoint
    pub lookup_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            source_budget_secs: DEFAULT_SOURCE_BUDGET_SECS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            lookup_timeout_secs: DEFAULT_LOOKUP_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults; a file that exists but cannot be
    /// parsed is an error so a typo is not silently ignored.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            log::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let data = fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Settings = serde_json::from_str(&data).map_err(|e| {
            DashError::config(format!("Invalid config file {:?}: {}", path, e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply command line overrides on top of the loaded values.
    pub fn with_overrides(mut self, interval: Option<u64>, cache_ttl: Option<u64>) -> Result<Self> {
        if let Some(secs) = interval {
            self.refresh_interval_secs = secs;
        }
        if let Some(secs) = cache_ttl {
            self.cache_ttl_secs = secs;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(DashError::config("refresh interval must be at least 1 second"));
        }
        if self.source_budget_secs == 0 || self.tool_timeout_secs == 0 || self.lookup_timeout_secs == 0 {
            return Err(DashError::config("timeouts must be at least 1 second"));
        }
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sysdash").join("config.json"))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn source_budget(&self) -> Duration {
        Duration::from_secs(self.source_budget_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}
