//! GPU-specific platform code.
//!
//! Native vendor libraries live here; tool-based fallbacks live in the GPU
//! source.

mod nvidia;

pub use nvidia::read_nvml;
