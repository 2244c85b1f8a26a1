//! Thermal domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Temperature in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Temperature(i32);

impl Temperature {
    /// Create a new Temperature
    pub const fn new(celsius: i32) -> Self {
        Self(celsius)
    }

    /// Get the temperature in Celsius
    #[inline]
    pub const fn as_celsius(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°C", self.0)
    }
}

impl From<u32> for Temperature {
    fn from(value: u32) -> Self {
        Self::new(value.min(i32::MAX as u32) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_display() {
        assert_eq!(Temperature::new(65).to_string(), "65°C");
    }

    #[test]
    fn test_temperature_from_u32() {
        let temp: Temperature = 65u32.into();
        assert_eq!(temp.as_celsius(), 65);

        let saturated: Temperature = u32::MAX.into();
        assert_eq!(saturated.as_celsius(), i32::MAX);
    }
}
