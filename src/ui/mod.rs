// UI and formatting module

pub mod dashboard;
pub mod formatters;
pub mod table;

// Re-export commonly used items for cleaner imports
pub use dashboard::{render, RenderOptions};
pub use formatters::{format_freq, format_size, format_time, format_uptime};
pub use table::Table;
