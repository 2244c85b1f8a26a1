//! nvtune - NVML-based GPU telemetry and tuning library
//!
//! Loads NVIDIA's NVML at runtime, reads per-device telemetry with fallbacks
//! across driver generations, and adjusts the power limit, core and memory
//! clock offsets, and the core clock lock.
//!
//! # Modules
//!
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration and the tuning store
//! - [`domain`]: Domain models with validation
//! - [`error`]: Error types
//! - [`nvml`]: NVML abstraction layer
//! - [`services`]: Tuning and polling services

pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod nvml;
pub mod services;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{AppError, Result};
