//! Trait definitions for GPU operations
//!
//! These traits are the capability interface consumed by the services and
//! the CLI. `NvmlManager`/`NvmlDevice` implement them over any symbol table,
//! so tests drive the same code with an in-memory one.

use crate::domain::{
    ClockReading, ClockSpeed, FanReading, GpuInfo, MemoryInfo, Power, Temperature, ThrottleReasons,
    Tunable, TunableRange, Utilization,
};
use crate::error::NvmlError;

/// Trait for GPU device operations
///
/// Every getter returns a value or a typed failure. Setters take `&mut self`
/// because the device caches the last explicitly applied clock lock.
pub trait GpuDevice: Send + Sync {
    /// NVML device index
    fn index(&self) -> u32;

    /// GPU name, cached at enumeration
    fn name(&self) -> &str;

    /// GPU UUID, cached at enumeration
    fn uuid(&self) -> &str;

    /// Get GPU identity
    fn info(&self) -> GpuInfo {
        GpuInfo::new(self.index(), self.name(), self.uuid())
    }

    // Telemetry
    /// GPU and memory-controller utilization
    fn utilization(&self) -> Result<Utilization, NvmlError>;

    /// Current graphics clock, plus the memory clock when readable
    fn clocks(&self) -> Result<ClockReading, NvmlError>;

    /// VRAM totals in bytes
    fn memory_info(&self) -> Result<MemoryInfo, NvmlError>;

    /// Core temperature
    fn temperature(&self) -> Result<Temperature, NvmlError>;

    /// Fan percentage; RPM is 0 when unavailable
    fn fan(&self) -> Result<FanReading, NvmlError>;

    /// Instantaneous board power draw
    fn power_usage(&self) -> Result<Power, NvmlError>;

    /// Active clock-event reasons
    fn throttle_reasons(&self) -> Result<ThrottleReasons, NvmlError>;

    // Power limit
    /// Limit currently enforced by the driver
    fn power_limit(&self) -> Result<Power, NvmlError>;

    /// Settable power limit range in milliwatts
    fn power_limit_range(&self) -> Result<TunableRange, NvmlError>;

    /// Whether the power limit can actually be changed
    ///
    /// False on boards where firmware owns the limit.
    fn can_set_power_limit(&self) -> bool;

    /// Set the power limit
    ///
    /// Fails with `NvmlError::HardwareLocked` when [`can_set_power_limit`]
    /// is false.
    ///
    /// [`can_set_power_limit`]: GpuDevice::can_set_power_limit
    fn set_power_limit(&mut self, limit: Power) -> Result<(), NvmlError>;

    /// Restore the default power limit
    fn reset_power_limit(&mut self) -> Result<(), NvmlError>;

    // Clock offsets
    fn core_offset(&self) -> Result<i32, NvmlError>;
    fn core_offset_range(&self) -> Result<TunableRange, NvmlError>;
    fn set_core_offset(&mut self, mhz: i32) -> Result<(), NvmlError>;

    fn reset_core_offset(&mut self) -> Result<(), NvmlError> {
        self.set_core_offset(0)
    }

    fn memory_offset(&self) -> Result<i32, NvmlError>;
    fn memory_offset_range(&self) -> Result<TunableRange, NvmlError>;
    fn set_memory_offset(&mut self, mhz: i32) -> Result<(), NvmlError>;

    fn reset_memory_offset(&mut self) -> Result<(), NvmlError> {
        self.set_memory_offset(0)
    }

    // Core clock lock
    /// Lockable core clock range
    fn clock_limits(&self) -> Result<TunableRange, NvmlError>;

    /// The applied lock, or the lockable maximum when none was applied
    fn locked_clock(&self) -> Result<ClockSpeed, NvmlError>;

    /// The lock applied through this device, if any
    fn explicit_locked_clock(&self) -> Option<ClockSpeed>;

    /// Lock the core clock to at most `mhz`
    fn set_locked_clock(&mut self, mhz: u32) -> Result<(), NvmlError>;

    /// Remove the core clock lock
    fn reset_locked_clock(&mut self) -> Result<(), NvmlError>;

    // Uniform access by tunable, values in device units
    fn tunable(&self, tunable: Tunable) -> Result<i64, NvmlError> {
        match tunable {
            Tunable::PowerLimit => self.power_limit().map(i64::from),
            Tunable::CoreOffset => self.core_offset().map(i64::from),
            Tunable::MemoryOffset => self.memory_offset().map(i64::from),
            Tunable::CoreClockLock => self.locked_clock().map(|c| c.as_mhz() as i64),
        }
    }

    fn tunable_range(&self, tunable: Tunable) -> Result<TunableRange, NvmlError> {
        match tunable {
            Tunable::PowerLimit => self.power_limit_range(),
            Tunable::CoreOffset => self.core_offset_range(),
            Tunable::MemoryOffset => self.memory_offset_range(),
            Tunable::CoreClockLock => self.clock_limits(),
        }
    }

    fn set_tunable(&mut self, tunable: Tunable, value: i64) -> Result<(), NvmlError> {
        let out_of_range =
            || NvmlError::InvalidArgument(format!("{} cannot be {}", tunable.label(), value));
        match tunable {
            Tunable::PowerLimit => {
                let mw = u32::try_from(value).map_err(|_| out_of_range())?;
                self.set_power_limit(Power::from_milliwatts(mw))
            }
            Tunable::CoreOffset => {
                let mhz = i32::try_from(value).map_err(|_| out_of_range())?;
                self.set_core_offset(mhz)
            }
            Tunable::MemoryOffset => {
                let mhz = i32::try_from(value).map_err(|_| out_of_range())?;
                self.set_memory_offset(mhz)
            }
            Tunable::CoreClockLock => {
                let mhz = u32::try_from(value).map_err(|_| out_of_range())?;
                self.set_locked_clock(mhz)
            }
        }
    }

    fn reset_tunable(&mut self, tunable: Tunable) -> Result<(), NvmlError> {
        match tunable {
            Tunable::PowerLimit => self.reset_power_limit(),
            Tunable::CoreOffset => self.reset_core_offset(),
            Tunable::MemoryOffset => self.reset_memory_offset(),
            Tunable::CoreClockLock => self.reset_locked_clock(),
        }
    }
}

/// Trait for GPU manager operations
///
/// The manager owns the library session. Devices borrow it, so none can
/// outlive [`GpuManager::shutdown`].
pub trait GpuManager {
    /// The device type this manager produces
    type Device<'a>: GpuDevice
    where
        Self: 'a;

    /// Backend name
    fn name(&self) -> &'static str;

    /// Management library version
    fn version(&self) -> Result<String, NvmlError>;

    /// Kernel driver version
    fn driver_version(&self) -> Result<String, NvmlError>;

    /// CUDA driver API version as (major, minor)
    fn cuda_driver_version(&self) -> Result<(u32, u32), NvmlError>;

    /// Enumerate visible devices, skipping any whose handle cannot be fetched
    fn devices(&self) -> Result<Vec<Self::Device<'_>>, NvmlError>;

    /// Get a device by its NVML index
    fn device_by_index(&self, index: u32) -> Result<Option<Self::Device<'_>>, NvmlError> {
        Ok(self.devices()?.into_iter().find(|d| d.index() == index))
    }

    /// Get a device by UUID
    fn device_by_uuid(&self, uuid: &str) -> Result<Option<Self::Device<'_>>, NvmlError> {
        Ok(self.devices()?.into_iter().find(|d| d.uuid() == uuid))
    }

    /// End the session
    fn shutdown(self) -> Result<(), NvmlError>
    where
        Self: Sized;
}
