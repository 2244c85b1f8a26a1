//! Per-poll device snapshot
//!
//! Every field is read independently. A failed read leaves its field empty
//! and is logged; it never discards the rest of the snapshot.

use crate::domain::{
    ClockReading, ClockSpeed, FanReading, GpuInfo, MemoryInfo, Power, Temperature,
    ThrottleReasons, Tunable, TunableRange, Utilization,
};
use crate::error::NvmlError;
use crate::nvml::{GpuDevice, GpuManager};
use serde::Serialize;

const UNKNOWN: &str = "Unknown";

/// Manager-level facts captured once per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerInfo {
    pub name: String,
    pub version: String,
    pub driver_version: String,
    pub cuda_version: String,
}

impl ManagerInfo {
    pub fn capture<M: GpuManager>(manager: &M) -> Self {
        Self {
            name: manager.name().to_string(),
            version: manager.version().unwrap_or_else(|_| UNKNOWN.to_string()),
            driver_version: manager
                .driver_version()
                .unwrap_or_else(|_| UNKNOWN.to_string()),
            cuda_version: manager
                .cuda_driver_version()
                .map(|(major, minor)| format!("{}.{}", major, minor))
                .unwrap_or_else(|_| UNKNOWN.to_string()),
        }
    }
}

/// Current value and legal range of one tunable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TunableReading {
    pub value: Option<i64>,
    pub range: Option<TunableRange>,
    /// The value was derived from an estimated range, not read back
    pub approximate: bool,
}

impl TunableReading {
    /// Core clock lock reading from one discovery of the lockable range
    ///
    /// Without an explicit lock the value is the range maximum, and it is
    /// only as exact as the range.
    pub fn clock_lock(explicit: Option<ClockSpeed>, range: Option<TunableRange>) -> Self {
        match explicit {
            Some(lock) => Self {
                value: Some(i64::from(lock.as_mhz())),
                range,
                approximate: false,
            },
            None => Self {
                value: range.map(|r| r.max),
                range,
                approximate: range.is_some_and(|r| r.approximate),
            },
        }
    }
}

/// Telemetry and tunable state of one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub gpu: GpuInfo,
    pub utilization: Option<Utilization>,
    pub clocks: Option<ClockReading>,
    pub temperature: Option<Temperature>,
    pub fan: Option<FanReading>,
    pub memory: Option<MemoryInfo>,
    pub power_draw: Option<Power>,
    pub throttle_reasons: Option<ThrottleReasons>,
    pub power_limit: TunableReading,
    pub core_offset: TunableReading,
    pub memory_offset: TunableReading,
    pub locked_clock: TunableReading,
    /// Lock applied explicitly in this session
    pub explicit_lock: Option<ClockSpeed>,
    pub power_settable: bool,
}

impl DeviceSnapshot {
    /// Read every field of `device`
    pub fn capture<D: GpuDevice>(device: &D) -> Self {
        let index = device.index();
        let tunable = |t: Tunable| TunableReading {
            value: field(index, t.label(), device.tunable(t)),
            range: field(index, t.label(), device.tunable_range(t)),
            approximate: false,
        };
        let explicit_lock = device.explicit_locked_clock();
        let lock_range = field(
            index,
            Tunable::CoreClockLock.label(),
            device.tunable_range(Tunable::CoreClockLock),
        );

        Self {
            gpu: device.info(),
            utilization: field(index, "utilization", device.utilization()),
            clocks: field(index, "clocks", device.clocks()),
            temperature: field(index, "temperature", device.temperature()),
            fan: field(index, "fan", device.fan()),
            memory: field(index, "memory", device.memory_info()),
            power_draw: field(index, "power draw", device.power_usage()),
            throttle_reasons: field(index, "throttle reasons", device.throttle_reasons()),
            power_limit: tunable(Tunable::PowerLimit),
            core_offset: tunable(Tunable::CoreOffset),
            memory_offset: tunable(Tunable::MemoryOffset),
            locked_clock: TunableReading::clock_lock(explicit_lock, lock_range),
            explicit_lock,
            power_settable: device.can_set_power_limit(),
        }
    }

    pub fn tunable(&self, tunable: Tunable) -> &TunableReading {
        match tunable {
            Tunable::PowerLimit => &self.power_limit,
            Tunable::CoreOffset => &self.core_offset,
            Tunable::MemoryOffset => &self.memory_offset,
            Tunable::CoreClockLock => &self.locked_clock,
        }
    }
}

fn field<T>(index: u32, what: &str, result: Result<T, NvmlError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("GPU {}: {} unavailable: {}", index, what, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSymbols;
    use crate::nvml::{Entry, NvmlManager, ReturnCode};

    #[test]
    fn test_capture_full() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let devices = manager.devices().unwrap();
        let snap = DeviceSnapshot::capture(&devices[0]);

        assert_eq!(snap.gpu.index, 0);
        assert_eq!(snap.temperature, Some(Temperature::new(65)));
        assert_eq!(snap.power_draw, Some(Power::from_watts(250)));
        assert_eq!(snap.power_limit.value, Some(450_000));
        assert_eq!(snap.locked_clock.value, Some(3105));
        assert_eq!(snap.explicit_lock, None);
        assert!(snap.power_settable);
    }

    #[test]
    fn test_capture_partial() {
        let symbols = MockSymbols::new()
            .without(Entry::DeviceGetFanSpeed)
            .failing(Entry::DeviceGetUtilizationRates, ReturnCode::GPU_IS_LOST);
        let manager = NvmlManager::init_with(symbols).unwrap();
        let devices = manager.devices().unwrap();
        let snap = DeviceSnapshot::capture(&devices[0]);

        assert_eq!(snap.fan, None);
        assert_eq!(snap.utilization, None);
        assert!(snap.temperature.is_some());
        assert!(snap.memory.is_some());
    }

    #[test]
    fn test_capture_discovers_lock_range_once() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let devices = manager.devices().unwrap();
        manager.symbols().clear_calls();

        let snap = DeviceSnapshot::capture(&devices[0]);
        assert_eq!(snap.locked_clock.value, Some(3105));
        assert_eq!(
            manager
                .symbols()
                .call_count(Entry::DeviceGetSupportedMemoryClocks),
            2
        );
    }

    #[test]
    fn test_capture_estimated_lock_is_approximate() {
        let symbols = MockSymbols::new().without(Entry::DeviceGetSupportedGraphicsClocks);
        let manager = NvmlManager::init_with(symbols).unwrap();
        let mut devices = manager.devices().unwrap();

        let snap = DeviceSnapshot::capture(&devices[0]);
        assert_eq!(snap.locked_clock.value, Some(3105));
        assert!(snap.locked_clock.approximate);
        assert!(snap.locked_clock.range.unwrap().approximate);

        devices[0].set_locked_clock(2400).unwrap();
        let snap = DeviceSnapshot::capture(&devices[0]);
        assert_eq!(snap.locked_clock.value, Some(2400));
        assert!(!snap.locked_clock.approximate);
        assert!(!snap.core_offset.approximate);
    }

    #[test]
    fn test_manager_info_unknown_versions() {
        let symbols = MockSymbols::new()
            .without_all(&[Entry::SystemGetNvmlVersion, Entry::SystemGetCudaDriverVersion]);
        let manager = NvmlManager::init_with(symbols).unwrap();
        let info = ManagerInfo::capture(&manager);
        assert_eq!(info.name, "NVML");
        assert_eq!(info.version, "Unknown");
        assert_eq!(info.driver_version, "565.57.01");
        assert_eq!(info.cuda_version, "Unknown");
    }
}
