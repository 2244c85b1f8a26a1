//! Fan reading domain type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fan speed as a (percent, RPM) pair
///
/// `rpm` is 0 when the driver cannot report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FanReading {
    /// Target speed as a percentage of maximum (may exceed 100 on some boards)
    pub percent: u32,
    /// Measured speed in revolutions per minute
    pub rpm: u32,
}

impl FanReading {
    pub fn new(percent: u32, rpm: u32) -> Self {
        Self { percent, rpm }
    }

    pub fn has_rpm(&self) -> bool {
        self.rpm > 0
    }
}

impl fmt::Display for FanReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_rpm() {
            write!(f, "{}% ({} RPM)", self.percent, self.rpm)
        } else {
            write!(f, "{}%", self.percent)
        }
    }
}
