// Command handlers module
pub mod monitor;

// Re-export command handlers for convenience
pub use monitor::{run as monitor, MonitorOptions};
