//! Performance and utilization domain types
//!
//! Types for GPU clocks, utilization rates, VRAM usage and clock-event
//! (throttle) reasons.

use serde::{Deserialize, Serialize};

/// GPU clock speed in MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ClockSpeed(u32);

impl ClockSpeed {
    /// Create a new clock speed value
    pub const fn new(mhz: u32) -> Self {
        Self(mhz)
    }

    /// Get clock speed in MHz
    pub const fn as_mhz(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ClockSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} MHz", self.0)
    }
}

/// Graphics and memory clocks read in one poll
///
/// The two clocks come from independent calls; a failed memory read leaves
/// `memory` empty without discarding the graphics clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockReading {
    pub graphics: ClockSpeed,
    pub memory: Option<ClockSpeed>,
}

/// GPU and memory utilization rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Utilization {
    /// GPU compute utilization (0-100%)
    pub gpu: u8,
    /// Memory bandwidth utilization (0-100%)
    pub memory: u8,
}

impl Utilization {
    /// Create a new utilization value
    pub fn new(gpu: u32, memory: u32) -> Self {
        Self {
            gpu: gpu.min(100) as u8,
            memory: memory.min(100) as u8,
        }
    }
}

/// VRAM/Memory information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Total memory in bytes
    pub total: u64,
    /// Used memory in bytes
    pub used: u64,
    /// Free memory in bytes
    pub free: u64,
}

impl MemoryInfo {
    /// Create a new memory info value
    pub fn new(total: u64, used: u64, free: u64) -> Self {
        Self { total, used, free }
    }

    /// Get total memory in MB
    pub fn total_mb(&self) -> u64 {
        self.total / (1024 * 1024)
    }

    /// Get used memory in MB
    pub fn used_mb(&self) -> u64 {
        self.used / (1024 * 1024)
    }

    /// Share of total memory in use, 0-100
    pub fn usage_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.used.saturating_mul(100) / self.total).min(100) as u8
    }
}

/// Reasons why the GPU clocks are being held down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThrottleReasons {
    /// GPU is idle
    pub idle: bool,
    /// Application clocks setting
    pub applications_clocks: bool,
    /// Software power cap
    pub sw_power_cap: bool,
    /// Hardware slowdown (temperature/power)
    pub hw_slowdown: bool,
    /// Sync boost
    pub sync_boost: bool,
    /// Software thermal slowdown
    pub sw_thermal: bool,
    /// Hardware thermal slowdown
    pub hw_thermal: bool,
    /// Hardware power brake
    pub hw_power_brake: bool,
    /// Display clock setting
    pub display_clocks: bool,
}

impl ThrottleReasons {
    pub const GPU_IDLE: u64 = 0x1;
    pub const APPLICATIONS_CLOCKS_SETTING: u64 = 0x2;
    pub const SW_POWER_CAP: u64 = 0x4;
    pub const HW_SLOWDOWN: u64 = 0x8;
    pub const SYNC_BOOST: u64 = 0x10;
    pub const SW_THERMAL_SLOWDOWN: u64 = 0x20;
    pub const HW_THERMAL_SLOWDOWN: u64 = 0x40;
    pub const HW_POWER_BRAKE_SLOWDOWN: u64 = 0x80;
    pub const DISPLAY_CLOCK_SETTING: u64 = 0x100;

    /// Decode the nvmlClocksEventReasons bitmask
    pub fn from_bits(bits: u64) -> Self {
        Self {
            idle: bits & Self::GPU_IDLE != 0,
            applications_clocks: bits & Self::APPLICATIONS_CLOCKS_SETTING != 0,
            sw_power_cap: bits & Self::SW_POWER_CAP != 0,
            hw_slowdown: bits & Self::HW_SLOWDOWN != 0,
            sync_boost: bits & Self::SYNC_BOOST != 0,
            sw_thermal: bits & Self::SW_THERMAL_SLOWDOWN != 0,
            hw_thermal: bits & Self::HW_THERMAL_SLOWDOWN != 0,
            hw_power_brake: bits & Self::HW_POWER_BRAKE_SLOWDOWN != 0,
            display_clocks: bits & Self::DISPLAY_CLOCK_SETTING != 0,
        }
    }

    /// Check if any throttling is active
    pub fn is_throttling(&self) -> bool {
        self.sw_power_cap
            || self.hw_slowdown
            || self.sw_thermal
            || self.hw_thermal
            || self.hw_power_brake
    }

    /// Get a list of active throttle reasons
    pub fn active_reasons(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.idle {
            reasons.push("Idle");
        }
        if self.applications_clocks {
            reasons.push("App Clocks");
        }
        if self.sw_power_cap {
            reasons.push("Power Cap");
        }
        if self.hw_slowdown {
            reasons.push("HW Slowdown");
        }
        if self.sw_thermal {
            reasons.push("SW Thermal");
        }
        if self.hw_thermal {
            reasons.push("HW Thermal");
        }
        if self.hw_power_brake {
            reasons.push("Power Brake");
        }
        if self.sync_boost {
            reasons.push("Sync Boost");
        }
        if self.display_clocks {
            reasons.push("Display Clocks");
        }
        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_speed() {
        let clock = ClockSpeed::new(2100);
        assert_eq!(clock.as_mhz(), 2100);
        assert!(clock > ClockSpeed::new(1800));
        assert_eq!(clock.to_string(), "2100 MHz");
    }

    #[test]
    fn test_utilization_clamp() {
        let util = Utilization::new(150, 200);
        assert_eq!(util.gpu, 100);
        assert_eq!(util.memory, 100);
        assert_eq!(Utilization::new(35, 20).gpu, 35);
    }

    #[test]
    fn test_memory_info() {
        // 8 GB total, 2 GB used
        let mem = MemoryInfo::new(
            8 * 1024 * 1024 * 1024,
            2 * 1024 * 1024 * 1024,
            6 * 1024 * 1024 * 1024,
        );
        assert_eq!(mem.total_mb(), 8192);
        assert_eq!(mem.used_mb(), 2048);
        assert_eq!(mem.usage_percent(), 25);
        assert_eq!(MemoryInfo::default().usage_percent(), 0);
    }

    #[test]
    fn test_throttle_reasons_from_bits() {
        let reasons = ThrottleReasons::from_bits(0x0);
        assert!(!reasons.is_throttling());
        assert!(reasons.active_reasons().is_empty());

        let reasons = ThrottleReasons::from_bits(
            ThrottleReasons::SW_POWER_CAP | ThrottleReasons::HW_THERMAL_SLOWDOWN,
        );
        assert!(reasons.is_throttling());
        assert_eq!(reasons.active_reasons(), vec!["Power Cap", "HW Thermal"]);

        let idle = ThrottleReasons::from_bits(ThrottleReasons::GPU_IDLE);
        assert!(idle.idle);
        assert!(!idle.is_throttling());
    }
}
