//! NVML device implementation
//!
//! `NvmlDevice` implements [`GpuDevice`] over a borrowed symbol table. The
//! borrow ties every device to the live session that produced its handle.

use crate::domain::{
    ClockReading, ClockSpeed, FanReading, MemoryInfo, Power, Temperature, ThrottleReasons,
    TunableRange, Utilization,
};
use crate::error::NvmlError;
use crate::nvml::clocks;
use crate::nvml::ffi::{
    ClockDomain, DeviceHandle, RawFanSpeedInfo, RawMemory, RawSample, RawTemperature,
    RawUtilization, SampleValue, DEVICE_NAME_BUFFER_SIZE, DEVICE_UUID_BUFFER_SIZE,
    FAN_SPEED_INFO_VERSION, TEMPERATURE_GPU, TEMPERATURE_VERSION, TOTAL_POWER_SAMPLES,
};
use crate::nvml::offsets::{self, OffsetDomain};
use crate::nvml::status::{self, wants_fallback, ReturnCode};
use crate::nvml::symbols::{Entry, NvmlSymbols};
use crate::nvml::traits::GpuDevice;

use std::collections::BTreeMap;
use std::os::raw::c_int;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const UNKNOWN_NAME: &str = "Unknown Nvidia GPU";
pub const UNKNOWN_UUID: &str = "Unknown UUID";

/// Core clock locks applied during a session, keyed by device index
///
/// Owned by the manager so that every enumeration of a device sees the
/// lock applied through an earlier one.
#[derive(Debug, Default)]
pub struct ClockLocks(Mutex<BTreeMap<u32, u32>>);

impl ClockLocks {
    pub const fn new() -> Self {
        Self(Mutex::new(BTreeMap::new()))
    }

    /// Lock applied to device `index`, if any
    pub fn get(&self, index: u32) -> Option<u32> {
        self.entries().get(&index).copied()
    }

    fn set(&self, index: u32, mhz: Option<u32>) {
        let mut entries = self.entries();
        match mhz {
            Some(mhz) => entries.insert(index, mhz),
            None => entries.remove(&index),
        };
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<u32, u32>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// NVML device wrapper implementing GpuDevice trait
pub struct NvmlDevice<'a, S: NvmlSymbols + ?Sized> {
    symbols: &'a S,
    locks: &'a ClockLocks,
    handle: DeviceHandle,
    index: u32,
    name: String,
    uuid: String,
}

impl<'a, S: NvmlSymbols + ?Sized> NvmlDevice<'a, S> {
    /// Wrap a handle, fetching and caching its identity
    ///
    /// Identity failures substitute placeholders instead of failing.
    pub fn new(
        symbols: &'a S,
        locks: &'a ClockLocks,
        handle: DeviceHandle,
        index: u32,
    ) -> Self {
        let name = read_identity(symbols, Entry::DeviceGetName, DEVICE_NAME_BUFFER_SIZE, |buf| {
            symbols.device_get_name(handle, buf)
        })
        .unwrap_or_else(|e| {
            log::warn!("GPU {}: could not read name: {}", index, e);
            UNKNOWN_NAME.to_string()
        });

        let uuid = read_identity(symbols, Entry::DeviceGetUuid, DEVICE_UUID_BUFFER_SIZE, |buf| {
            symbols.device_get_uuid(handle, buf)
        })
        .unwrap_or_else(|e| {
            log::warn!("GPU {}: could not read UUID: {}", index, e);
            UNKNOWN_UUID.to_string()
        });

        Self {
            symbols,
            locks,
            handle,
            index,
            name,
            uuid,
        }
    }

    /// Raw NVML handle
    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    fn check(&self, entry: Entry, ret: Option<ReturnCode>) -> Result<(), NvmlError> {
        status::check(self.symbols, entry, ret)
    }

    fn clock(&self, domain: ClockDomain) -> Result<ClockSpeed, NvmlError> {
        let mut mhz = 0;
        let ret = self
            .symbols
            .device_get_clock_info(self.handle, domain as c_int, &mut mhz);
        self.check(Entry::DeviceGetClockInfo, ret)?;
        Ok(ClockSpeed::new(mhz))
    }

    /// Most recent total-power sample from the sampling buffer
    fn sampled_power(&self) -> Result<Power, NvmlError> {
        let mut value_type: c_int = 0;
        let mut count = 0;
        let ret = self.symbols.device_get_samples(
            self.handle,
            TOTAL_POWER_SAMPLES,
            0,
            &mut value_type,
            &mut count,
            None,
        );
        self.check(Entry::DeviceGetSamples, ret)?;
        if count == 0 {
            return Err(NvmlError::NotSupported("No power samples available".to_string()));
        }

        let mut samples = vec![RawSample::default(); count as usize];
        let ret = self.symbols.device_get_samples(
            self.handle,
            TOTAL_POWER_SAMPLES,
            0,
            &mut value_type,
            &mut count,
            Some(samples.as_mut_slice()),
        );
        self.check(Entry::DeviceGetSamples, ret)?;
        samples.truncate(count as usize);

        let latest = samples
            .iter()
            .max_by_key(|s| s.timestamp)
            .ok_or_else(|| NvmlError::NotSupported("No power samples available".to_string()))?;
        let mw = SampleValue::decode(value_type, latest.value).as_u64();
        Ok(Power::from_milliwatts(mw.min(u32::MAX as u64) as u32))
    }

    fn apply_power_limit(&self, milliwatts: u32) -> Result<(), NvmlError> {
        let ret = self
            .symbols
            .device_set_power_management_limit(self.handle, milliwatts);
        self.check(Entry::DeviceSetPowerManagementLimit, ret)?;
        log::info!(
            "GPU {}: power limit set to {}",
            self.index,
            Power::from_milliwatts(milliwatts)
        );
        Ok(())
    }

    fn ensure_power_settable(&self) -> Result<(), NvmlError> {
        if self.can_set_power_limit() {
            Ok(())
        } else {
            Err(NvmlError::HardwareLocked("Power limit".to_string()))
        }
    }

    fn offset_range(&self, domain: OffsetDomain) -> Result<TunableRange, NvmlError> {
        let bounds = offsets::range(self.symbols, self.handle, domain)?;
        Ok(TunableRange::new(bounds.min as i64, bounds.max as i64))
    }

    fn set_offset(&self, domain: OffsetDomain, mhz: i32) -> Result<(), NvmlError> {
        let api = offsets::set(self.symbols, self.handle, domain, mhz)?;
        log::info!(
            "GPU {}: {} clock offset set to {:+} MHz ({:?} API)",
            self.index,
            domain,
            mhz,
            api
        );
        Ok(())
    }
}

/// Fetch a NUL-padded identity string
fn read_identity<S, F>(symbols: &S, entry: Entry, size: usize, call: F) -> Result<String, NvmlError>
where
    S: NvmlSymbols + ?Sized,
    F: FnOnce(&mut [u8]) -> Option<ReturnCode>,
{
    let mut buf = vec![0u8; size];
    status::check(symbols, entry, call(buf.as_mut_slice()))?;
    Ok(trim_nul(&buf))
}

/// Text up to the first NUL
pub(crate) fn trim_nul(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

impl<S: NvmlSymbols + ?Sized> GpuDevice for NvmlDevice<'_, S> {
    fn index(&self) -> u32 {
        self.index
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn utilization(&self) -> Result<Utilization, NvmlError> {
        let mut raw = RawUtilization::default();
        let ret = self.symbols.device_get_utilization_rates(self.handle, &mut raw);
        self.check(Entry::DeviceGetUtilizationRates, ret)?;
        Ok(Utilization::new(raw.gpu, raw.memory))
    }

    fn clocks(&self) -> Result<ClockReading, NvmlError> {
        let graphics = self.clock(ClockDomain::Graphics)?;
        let memory = match self.clock(ClockDomain::Memory) {
            Ok(clock) => Some(clock),
            Err(e) => {
                log::debug!("GPU {}: memory clock unavailable: {}", self.index, e);
                None
            }
        };
        Ok(ClockReading { graphics, memory })
    }

    fn memory_info(&self) -> Result<MemoryInfo, NvmlError> {
        let mut raw = RawMemory::default();
        let ret = self.symbols.device_get_memory_info(self.handle, &mut raw);
        self.check(Entry::DeviceGetMemoryInfo, ret)?;
        Ok(MemoryInfo::new(raw.total, raw.used, raw.free))
    }

    fn temperature(&self) -> Result<Temperature, NvmlError> {
        let mut info = RawTemperature {
            version: TEMPERATURE_VERSION,
            sensor_type: TEMPERATURE_GPU,
            temperature: 0,
        };
        let ret = self.symbols.device_get_temperature_v(self.handle, &mut info);
        if !wants_fallback(ret) {
            self.check(Entry::DeviceGetTemperatureV, ret)?;
            return Ok(Temperature::new(info.temperature));
        }

        log::debug!("GPU {}: using legacy temperature query", self.index);
        let mut celsius = 0;
        let ret = self
            .symbols
            .device_get_temperature(self.handle, TEMPERATURE_GPU, &mut celsius);
        self.check(Entry::DeviceGetTemperature, ret)?;
        Ok(Temperature::from(celsius))
    }

    fn fan(&self) -> Result<FanReading, NvmlError> {
        let mut percent = 0;
        let ret = self.symbols.device_get_fan_speed(self.handle, &mut percent);
        self.check(Entry::DeviceGetFanSpeed, ret)?;

        let mut info = RawFanSpeedInfo {
            version: FAN_SPEED_INFO_VERSION,
            fan: 0,
            speed: 0,
        };
        let ret = self.symbols.device_get_fan_speed_rpm(self.handle, &mut info);
        let rpm = match self.check(Entry::DeviceGetFanSpeedRpm, ret) {
            Ok(()) => info.speed,
            Err(e) => {
                log::debug!("GPU {}: fan RPM unavailable: {}", self.index, e);
                0
            }
        };

        Ok(FanReading::new(percent, rpm))
    }

    fn power_usage(&self) -> Result<Power, NvmlError> {
        let mut mw = 0;
        let ret = self.symbols.device_get_power_usage(self.handle, &mut mw);
        if !wants_fallback(ret) {
            self.check(Entry::DeviceGetPowerUsage, ret)?;
            return Ok(Power::from_milliwatts(mw));
        }

        log::debug!("GPU {}: power counter unsupported, reading samples", self.index);
        self.sampled_power()
    }

    fn throttle_reasons(&self) -> Result<ThrottleReasons, NvmlError> {
        let mut bits = 0;
        let ret = self
            .symbols
            .device_get_current_clocks_event_reasons(self.handle, &mut bits);
        self.check(Entry::DeviceGetCurrentClocksEventReasons, ret)?;
        Ok(ThrottleReasons::from_bits(bits))
    }

    fn power_limit(&self) -> Result<Power, NvmlError> {
        let mut mw = 0;
        let ret = self.symbols.device_get_enforced_power_limit(self.handle, &mut mw);
        self.check(Entry::DeviceGetEnforcedPowerLimit, ret)?;
        Ok(Power::from_milliwatts(mw))
    }

    fn power_limit_range(&self) -> Result<TunableRange, NvmlError> {
        let (mut min, mut max) = (0, 0);
        let ret = self.symbols.device_get_power_management_limit_constraints(
            self.handle,
            &mut min,
            &mut max,
        );
        self.check(Entry::DeviceGetPowerManagementLimitConstraints, ret)?;
        Ok(TunableRange::new(min as i64, max as i64))
    }

    fn can_set_power_limit(&self) -> bool {
        if !self.symbols.is_bound(Entry::DeviceSetPowerManagementLimit) {
            return false;
        }
        let mut mw = 0;
        let ret = self
            .symbols
            .device_get_power_management_limit(self.handle, &mut mw);
        matches!(ret, Some(code) if code.is_success())
    }

    fn set_power_limit(&mut self, limit: Power) -> Result<(), NvmlError> {
        self.ensure_power_settable()?;
        self.apply_power_limit(limit.as_milliwatts())
    }

    fn reset_power_limit(&mut self) -> Result<(), NvmlError> {
        self.ensure_power_settable()?;
        let mut mw = 0;
        let ret = self
            .symbols
            .device_get_power_management_default_limit(self.handle, &mut mw);
        self.check(Entry::DeviceGetPowerManagementDefaultLimit, ret)?;
        self.apply_power_limit(mw)
    }

    fn core_offset(&self) -> Result<i32, NvmlError> {
        offsets::get(self.symbols, self.handle, OffsetDomain::Core).map(|(mhz, _)| mhz)
    }

    fn core_offset_range(&self) -> Result<TunableRange, NvmlError> {
        self.offset_range(OffsetDomain::Core)
    }

    fn set_core_offset(&mut self, mhz: i32) -> Result<(), NvmlError> {
        self.set_offset(OffsetDomain::Core, mhz)
    }

    fn memory_offset(&self) -> Result<i32, NvmlError> {
        offsets::get(self.symbols, self.handle, OffsetDomain::Memory).map(|(mhz, _)| mhz)
    }

    fn memory_offset_range(&self) -> Result<TunableRange, NvmlError> {
        self.offset_range(OffsetDomain::Memory)
    }

    fn set_memory_offset(&mut self, mhz: i32) -> Result<(), NvmlError> {
        self.set_offset(OffsetDomain::Memory, mhz)
    }

    fn clock_limits(&self) -> Result<TunableRange, NvmlError> {
        clocks::discover(self.symbols, self.handle)
    }

    fn locked_clock(&self) -> Result<ClockSpeed, NvmlError> {
        match self.locks.get(self.index) {
            Some(mhz) => Ok(ClockSpeed::new(mhz)),
            None => {
                let max = self.clock_limits()?.max;
                Ok(ClockSpeed::new(max.clamp(0, u32::MAX as i64) as u32))
            }
        }
    }

    fn explicit_locked_clock(&self) -> Option<ClockSpeed> {
        self.locks.get(self.index).map(ClockSpeed::new)
    }

    fn set_locked_clock(&mut self, mhz: u32) -> Result<(), NvmlError> {
        let ret = self.symbols.device_set_gpu_locked_clocks(self.handle, 0, mhz);
        self.check(Entry::DeviceSetGpuLockedClocks, ret)?;
        self.locks.set(self.index, Some(mhz));
        log::info!("GPU {}: core clock locked to {} MHz", self.index, mhz);
        Ok(())
    }

    fn reset_locked_clock(&mut self) -> Result<(), NvmlError> {
        let ret = self.symbols.device_reset_gpu_locked_clocks(self.handle);
        self.check(Entry::DeviceResetGpuLockedClocks, ret)?;
        self.locks.set(self.index, None);
        log::info!("GPU {}: core clock lock removed", self.index);
        Ok(())
    }
}
