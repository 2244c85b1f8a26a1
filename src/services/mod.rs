//! Service layer for GPU tuning operations
//!
//! Services hold the logic between the CLI and the NVML layer: validated
//! tunable changes and the telemetry poll loop.

pub mod monitor;
pub mod tuning_service;

pub use monitor::{Monitor, MonitorConfig};
pub use tuning_service::{Action, Change, TuningService};
