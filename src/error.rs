//! Unified error types for nvtune
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from NVML operations
    #[error("NVML error: {0}")]
    Nvml(#[from] NvmlError),

    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from domain type validation
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// GPU not found by index or UUID
    #[error("GPU not found: {0}")]
    GpuNotFound(String),

    /// No GPUs detected in the system
    #[error("No NVIDIA GPUs detected")]
    NoGpusFound,

    /// Some per-device operations failed; details were already reported
    #[error("{0} operation(s) failed")]
    OperationsFailed(usize),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the NVML layer
///
/// Messages are already translated through the library's own error strings,
/// so callers never see raw return codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NvmlError {
    /// The NVML shared library could not be loaded
    #[error("NVML library not found ({0}). Is the NVIDIA driver installed?")]
    LibraryNotFound(String),

    /// Failed to initialize NVML
    #[error("Failed to initialize NVML: {0}")]
    InitializationFailed(String),

    /// A required entry point is not exported by the installed driver
    #[error("Required NVML entry point missing: {0}")]
    MissingSymbol(&'static str),

    /// Entry point unbound or the driver reports the operation unsupported
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Insufficient permissions
    #[error("Insufficient permissions: {0}. Try running with sudo.")]
    InsufficientPermissions(String),

    /// GPU is lost (fallen off bus, etc.)
    #[error("GPU is lost or has become inaccessible")]
    GpuLost,

    /// Invalid argument passed to NVML
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The setting is locked by firmware/vbios
    #[error("{0} is controlled by firmware")]
    HardwareLocked(String),

    /// A supported-clocks table came back empty
    #[error("Supported {0} clock table is empty")]
    EmptyClockTable(&'static str),

    /// Any other driver failure
    #[error("{0}")]
    Driver(String),
}

impl NvmlError {
    /// Whether this error means "try another entry point"
    pub fn is_not_supported(&self) -> bool {
        matches!(self, NvmlError::NotSupported(_))
    }
}

/// Errors from domain type validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Requested tunable value outside the legal range
    #[error("Invalid {tunable}: {value} (valid range: {min} to {max})")]
    OutOfRange {
        tunable: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Malformed user input
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Unknown tunable identifier
    #[error("Unknown tunable: {0}")]
    UnknownTunable(String),
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Failed to read or write the tuning store
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors from service operations
#[derive(Error, Debug)]
pub enum ServiceError {
    /// NVML operation failed
    #[error("NVML operation failed: {0}")]
    Nvml(#[from] NvmlError),

    /// Domain validation failed
    #[error("Validation failed: {0}")]
    Domain(#[from] DomainError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Nvml(e) => AppError::Nvml(e),
            ServiceError::Domain(e) => AppError::Domain(e),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_display() {
        let err = DomainError::OutOfRange {
            tunable: "power limit",
            value: 500_000,
            min: 100_000,
            max: 400_000,
        };
        assert_eq!(
            err.to_string(),
            "Invalid power limit: 500000 (valid range: 100000 to 400000)"
        );
    }

    #[test]
    fn test_nvml_error_display() {
        let err = NvmlError::LibraryNotFound("libnvidia-ml.so.1".to_string());
        assert!(err.to_string().contains("NVIDIA driver"));

        let err = NvmlError::HardwareLocked("Power limit".to_string());
        assert_eq!(err.to_string(), "Power limit is controlled by firmware");
    }

    #[test]
    fn test_not_supported_predicate() {
        assert!(NvmlError::NotSupported("x".into()).is_not_supported());
        assert!(!NvmlError::GpuLost.is_not_supported());
    }

    #[test]
    fn test_error_conversion() {
        let domain_err = DomainError::InvalidValue("abc".to_string());
        let app_err: AppError = domain_err.into();
        assert!(matches!(app_err, AppError::Domain(_)));

        let svc_err = ServiceError::Nvml(NvmlError::GpuLost);
        let app_err: AppError = svc_err.into();
        assert!(matches!(app_err, AppError::Nvml(NvmlError::GpuLost)));
    }
}
