//! Power domain types
//!
//! Power draw and power limits share one milliwatt-based type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Power in milliwatts (stored internally) but displayed as watts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Power(u32);

impl Power {
    /// Create a power value from watts
    pub const fn from_watts(watts: u32) -> Self {
        Self(watts.saturating_mul(1000))
    }

    /// Create a power value from milliwatts
    pub const fn from_milliwatts(mw: u32) -> Self {
        Self(mw)
    }

    /// Get the power in whole watts (truncated)
    #[inline]
    pub const fn as_watts(&self) -> u32 {
        self.0 / 1000
    }

    /// Get the power in milliwatts
    #[inline]
    pub const fn as_milliwatts(&self) -> u32 {
        self.0
    }

    /// Get the power in watts with the milliwatt fraction
    pub fn as_watts_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}W", self.as_watts())
        } else {
            write!(f, "{:.1}W", self.as_watts_f64())
        }
    }
}

impl From<Power> for i64 {
    fn from(power: Power) -> Self {
        power.0 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_from_watts() {
        let p = Power::from_watts(300);
        assert_eq!(p.as_watts(), 300);
        assert_eq!(p.as_milliwatts(), 300_000);
    }

    #[test]
    fn test_power_display() {
        assert_eq!(Power::from_watts(350).to_string(), "350W");
        assert_eq!(Power::from_milliwatts(150_300).to_string(), "150.3W");
    }

    #[test]
    fn test_power_ordering() {
        assert!(Power::from_watts(100) < Power::from_milliwatts(100_001));
    }
}
