//! Flow-meter computer firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod correlator;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod fixed;
pub mod flow_status;
pub mod persistence;
pub mod presets;
pub mod scheduler;
pub mod totalizer;
pub mod units;

pub mod pins;

// Platform glue; the ESP-IDF implementations are guarded by cfg
// attributes inside, with host stand-ins alongside.
pub mod adapters;
pub mod drivers;
