//! GPU information domain type

use serde::{Deserialize, Serialize};
use std::fmt;

/// GPU identity as cached at enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
    /// NVML device index
    pub index: u32,
    /// GPU name (e.g., "NVIDIA GeForce RTX 4090")
    pub name: String,
    /// Unique GPU UUID
    pub uuid: String,
}

impl GpuInfo {
    /// Create new GPU info
    pub fn new(index: u32, name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            uuid: uuid.into(),
        }
    }
}

impl fmt::Display for GpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.name)
    }
}
