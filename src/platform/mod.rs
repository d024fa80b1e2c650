// Platform-specific code module

pub mod capabilities;
pub mod elevation;
pub mod gpu;
pub mod probe;

// Re-exports for shorter import paths
pub use capabilities::{CapabilityProfile, OsFamily, Tool};
pub use elevation::is_elevated;
pub use probe::{blocking, ProgramOutput, Probe};
