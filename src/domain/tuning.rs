//! Tunable catalogue and legal ranges
//!
//! Values cross the device interface in device units: milliwatts for the
//! power limit, MHz for everything else. Users type power in watts; the
//! conversion happens here and nowhere else.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four adjustable GPU parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tunable {
    #[serde(rename = "pl")]
    PowerLimit,
    #[serde(rename = "gpu_co")]
    CoreOffset,
    #[serde(rename = "mem_co")]
    MemoryOffset,
    #[serde(rename = "gpu_cl")]
    CoreClockLock,
}

impl Tunable {
    pub const ALL: [Tunable; 4] = [
        Tunable::PowerLimit,
        Tunable::CoreOffset,
        Tunable::MemoryOffset,
        Tunable::CoreClockLock,
    ];

    /// Short identifier, also the tuning-store key
    pub fn id(&self) -> &'static str {
        match self {
            Tunable::PowerLimit => "pl",
            Tunable::CoreOffset => "gpu_co",
            Tunable::MemoryOffset => "mem_co",
            Tunable::CoreClockLock => "gpu_cl",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tunable::PowerLimit => "power limit",
            Tunable::CoreOffset => "core clock offset",
            Tunable::MemoryOffset => "memory clock offset",
            Tunable::CoreClockLock => "core clock lock",
        }
    }

    /// Unit the user types and sees
    pub fn unit(&self) -> &'static str {
        match self {
            Tunable::PowerLimit => "W",
            _ => "MHz",
        }
    }

    /// Whether values are signed deltas
    pub fn is_offset(&self) -> bool {
        matches!(self, Tunable::CoreOffset | Tunable::MemoryOffset)
    }

    /// Parse a user-typed value into device units
    ///
    /// # Errors
    /// Returns `DomainError::InvalidValue` for malformed or negative power input
    pub fn parse_value(&self, text: &str) -> Result<i64, DomainError> {
        let text = text.trim();
        let text = text
            .strip_suffix(self.unit())
            .or_else(|| text.strip_suffix(&self.unit().to_lowercase()))
            .unwrap_or(text)
            .trim();

        match self {
            Tunable::PowerLimit => {
                let watts: f64 = text.parse().map_err(|_| {
                    DomainError::InvalidValue(format!("'{}' is not a power in watts", text))
                })?;
                if !watts.is_finite() || watts < 0.0 {
                    return Err(DomainError::InvalidValue(format!(
                        "'{}' is not a valid power limit",
                        text
                    )));
                }
                Ok((watts * 1000.0).round() as i64)
            }
            _ => text.parse::<i64>().map_err(|_| {
                DomainError::InvalidValue(format!("'{}' is not a whole number of MHz", text))
            }),
        }
    }

    /// Convert a device-unit value into the unit shown to users
    pub fn to_user_units(&self, value: i64) -> i64 {
        match self {
            Tunable::PowerLimit => value / 1000,
            _ => value,
        }
    }

    /// Convert a user-unit value into device units
    pub fn from_user_units(&self, value: i64) -> i64 {
        match self {
            Tunable::PowerLimit => value.saturating_mul(1000),
            _ => value,
        }
    }

    /// Render a device-unit value for display
    pub fn format_value(&self, value: i64) -> String {
        match self {
            Tunable::PowerLimit => format!("{}W", self.to_user_units(value)),
            Tunable::CoreOffset | Tunable::MemoryOffset => format!("{:+} MHz", value),
            Tunable::CoreClockLock => format!("{} MHz", value),
        }
    }
}

impl fmt::Display for Tunable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tunable {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pl" | "power" | "power-limit" => Ok(Tunable::PowerLimit),
            "gpu_co" | "core-offset" | "gpu-offset" => Ok(Tunable::CoreOffset),
            "mem_co" | "mem-offset" | "memory-offset" => Ok(Tunable::MemoryOffset),
            "gpu_cl" | "clock-lock" | "lock" => Ok(Tunable::CoreClockLock),
            other => Err(DomainError::UnknownTunable(other.to_string())),
        }
    }
}

/// Legal `[min, max]` range of a tunable, in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunableRange {
    pub min: i64,
    pub max: i64,
    /// Derived from a cheaper estimate rather than the driver's tables
    pub approximate: bool,
}

impl TunableRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self {
            min,
            max,
            approximate: false,
        }
    }

    pub fn approximate(min: i64, max: i64) -> Self {
        Self {
            min,
            max,
            approximate: true,
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Reject a value outside the range, reporting in user units
    pub fn validate(&self, tunable: Tunable, value: i64) -> Result<(), DomainError> {
        if self.contains(value) {
            return Ok(());
        }
        Err(DomainError::OutOfRange {
            tunable: tunable.label(),
            value: tunable.to_user_units(value),
            min: tunable.to_user_units(self.min),
            max: tunable.to_user_units(self.max),
        })
    }
}

impl fmt::Display for TunableRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.approximate {
            write!(f, "~{}..{}", self.min, self.max)
        } else {
            write!(f, "{}..{}", self.min, self.max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunable_ids_round_trip() {
        for tunable in Tunable::ALL {
            assert_eq!(tunable.id().parse::<Tunable>().unwrap(), tunable);
        }
        assert_eq!("power".parse::<Tunable>().unwrap(), Tunable::PowerLimit);
        assert!(matches!(
            "voltage".parse::<Tunable>(),
            Err(DomainError::UnknownTunable(_))
        ));
    }

    #[test]
    fn test_parse_power_in_watts() {
        let pl = Tunable::PowerLimit;
        assert_eq!(pl.parse_value("250").unwrap(), 250_000);
        assert_eq!(pl.parse_value("250W").unwrap(), 250_000);
        assert_eq!(pl.parse_value(" 187.5 ").unwrap(), 187_500);
        assert!(pl.parse_value("-5").is_err());
        assert!(pl.parse_value("lots").is_err());
    }

    #[test]
    fn test_parse_offsets() {
        assert_eq!(Tunable::CoreOffset.parse_value("+150").unwrap(), 150);
        assert_eq!(Tunable::MemoryOffset.parse_value("-500 MHz").unwrap(), -500);
        assert_eq!(Tunable::CoreClockLock.parse_value("2400mhz").unwrap(), 2400);
        assert!(Tunable::CoreOffset.parse_value("1.5").is_err());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(Tunable::PowerLimit.format_value(320_000), "320W");
        assert_eq!(Tunable::CoreOffset.format_value(150), "+150 MHz");
        assert_eq!(Tunable::MemoryOffset.format_value(-200), "-200 MHz");
        assert_eq!(Tunable::CoreClockLock.format_value(2520), "2520 MHz");
    }

    #[test]
    fn test_range_validate_reports_user_units() {
        let range = TunableRange::new(100_000, 400_000);
        assert!(range.validate(Tunable::PowerLimit, 250_000).is_ok());

        let err = range.validate(Tunable::PowerLimit, 500_000).unwrap_err();
        assert_eq!(
            err,
            DomainError::OutOfRange {
                tunable: "power limit",
                value: 500,
                min: 100,
                max: 400,
            }
        );
    }

    #[test]
    fn test_range_display() {
        assert_eq!(TunableRange::new(139, 2520).to_string(), "139..2520");
        assert_eq!(TunableRange::approximate(0, 2400).to_string(), "~0..2400");
    }
}
