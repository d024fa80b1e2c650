//! Raw source adapters, one module per telemetry domain.
//!
//! Each module exposes `for_platform`, which picks that domain's strategy for
//! an OS family. Pure output parsers are public so they can be tested
//! without the tools installed.

pub mod battery;
pub mod browsers;
pub mod cpu;
pub mod disks;
pub mod gpu;
pub mod memory;
pub mod network;
pub mod peripherals;
pub mod ports;
pub mod sensors;
pub mod system;
