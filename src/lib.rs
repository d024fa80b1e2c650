// sysdash library - public API

// Re-export error types
pub mod error;
pub use error::{DashError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;
pub mod ui;

// Re-export commonly used types
pub use core::config::Settings;
pub use core::system_monitor::{evaluate, Collector, Reading, Snapshot, UnavailableReason, Warning};
pub use platform::CapabilityProfile;

/// Initialize logging.
///
/// Defaults to `warn` so log lines do not break up the redrawn dashboard;
/// `RUST_LOG` overrides it.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
}
