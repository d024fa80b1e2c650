use chrono::{DateTime, Local};
use humansize::{format_size as human_format_size, BINARY};

use crate::core::system_monitor::Reading;

/// Marker shown for a value that could not be read.
pub const NOT_AVAILABLE: &str = "N/A";

/// Format a size given in KB in human-readable form (KiB, MiB, GiB)
pub fn format_size(kb: u64) -> String {
    human_format_size(kb.saturating_mul(1024), BINARY)
}

/// Format a size given in KB as whole gigabytes, the way the tables show it
pub fn format_gb(kb: u64) -> String {
    format!("{} GB", kb / (1024 * 1024))
}

/// Format timestamp in human-readable format (YYYY-MM-DD HH:MM:SS)
pub fn format_time(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format uptime as "N days, N hours, N minutes, N seconds".
///
/// Zero days, hours and minutes are left out; seconds are always shown.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    let mut parts = Vec::new();
    for (value, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
        if value > 0 {
            parts.push(plural(value, unit));
        }
    }
    parts.push(plural(seconds, "second"));
    parts.join(", ")
}

fn plural(value: u64, unit: &str) -> String {
    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

/// Format a clock speed, switching to GHz from 1000 MHz up
pub fn format_freq(mhz: u64) -> String {
    if mhz >= 1000 {
        format!("{:.2} GHz", mhz as f64 / 1000.0)
    } else {
        format!("{} MHz", mhz)
    }
}

/// Twenty-cell load bar, one block per 5%
pub fn load_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0)) / 5.0) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(20 - filled))
}

/// Render a reading with `f`, or [`NOT_AVAILABLE`] when it is missing
pub fn or_na<T, F: FnOnce(&T) -> String>(reading: &Reading<T>, f: F) -> String {
    match reading {
        Reading::Available(value) => f(value),
        Reading::Unavailable(_) => NOT_AVAILABLE.to_string(),
    }
}

/// Like [`or_na`], but keeps the reason visible
pub fn or_reason<T, F: FnOnce(&T) -> String>(reading: &Reading<T>, f: F) -> String {
    match reading {
        Reading::Available(value) => f(value),
        Reading::Unavailable(reason) => format!("{} ({})", NOT_AVAILABLE, reason),
    }
}
