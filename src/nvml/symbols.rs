//! NVML symbol table
//!
//! The driver's management library is loaded at runtime and every entry
//! point is bound by name. Entry points the installed driver does not export
//! stay unbound; calling one through [`NvmlSymbols`] yields `None` instead of
//! a return code, and callers treat that exactly like "not supported".

use crate::error::NvmlError;
use crate::nvml::ffi::{
    DeviceHandle, RawClockOffset, RawFanSpeedInfo, RawMemory, RawSample, RawTemperature,
    RawUtilization,
};
use crate::nvml::status::ReturnCode;

use libloading::{Library, Symbol};
use nvml_wrapper_sys::bindings::{nvmlDevice_t, nvmlReturn_enum};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uint, c_ulonglong};

/// Every NVML entry point the device layer may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entry {
    Init,
    Shutdown,
    ErrorString,
    SystemGetDriverVersion,
    SystemGetNvmlVersion,
    SystemGetCudaDriverVersion,
    DeviceGetCount,
    DeviceGetHandleByIndex,
    DeviceGetName,
    DeviceGetUuid,
    DeviceGetUtilizationRates,
    DeviceGetMemoryInfo,
    DeviceGetClockInfo,
    DeviceGetMaxClockInfo,
    DeviceGetPowerUsage,
    DeviceGetSamples,
    DeviceGetTemperature,
    DeviceGetTemperatureV,
    DeviceGetFanSpeed,
    DeviceGetFanSpeedRpm,
    DeviceGetCurrentClocksEventReasons,
    DeviceGetPowerManagementLimitConstraints,
    DeviceGetPowerManagementDefaultLimit,
    DeviceGetPowerManagementLimit,
    DeviceGetEnforcedPowerLimit,
    DeviceSetPowerManagementLimit,
    DeviceGetClockOffsets,
    DeviceSetClockOffsets,
    DeviceGetGpcClkVfOffset,
    DeviceSetGpcClkVfOffset,
    DeviceGetGpcClkMinMaxVfOffset,
    DeviceGetMemClkVfOffset,
    DeviceSetMemClkVfOffset,
    DeviceGetMemClkMinMaxVfOffset,
    DeviceSetGpuLockedClocks,
    DeviceResetGpuLockedClocks,
    DeviceGetSupportedMemoryClocks,
    DeviceGetSupportedGraphicsClocks,
}

impl Entry {
    pub const ALL: [Entry; 38] = [
        Entry::Init,
        Entry::Shutdown,
        Entry::ErrorString,
        Entry::SystemGetDriverVersion,
        Entry::SystemGetNvmlVersion,
        Entry::SystemGetCudaDriverVersion,
        Entry::DeviceGetCount,
        Entry::DeviceGetHandleByIndex,
        Entry::DeviceGetName,
        Entry::DeviceGetUuid,
        Entry::DeviceGetUtilizationRates,
        Entry::DeviceGetMemoryInfo,
        Entry::DeviceGetClockInfo,
        Entry::DeviceGetMaxClockInfo,
        Entry::DeviceGetPowerUsage,
        Entry::DeviceGetSamples,
        Entry::DeviceGetTemperature,
        Entry::DeviceGetTemperatureV,
        Entry::DeviceGetFanSpeed,
        Entry::DeviceGetFanSpeedRpm,
        Entry::DeviceGetCurrentClocksEventReasons,
        Entry::DeviceGetPowerManagementLimitConstraints,
        Entry::DeviceGetPowerManagementDefaultLimit,
        Entry::DeviceGetPowerManagementLimit,
        Entry::DeviceGetEnforcedPowerLimit,
        Entry::DeviceSetPowerManagementLimit,
        Entry::DeviceGetClockOffsets,
        Entry::DeviceSetClockOffsets,
        Entry::DeviceGetGpcClkVfOffset,
        Entry::DeviceSetGpcClkVfOffset,
        Entry::DeviceGetGpcClkMinMaxVfOffset,
        Entry::DeviceGetMemClkVfOffset,
        Entry::DeviceSetMemClkVfOffset,
        Entry::DeviceGetMemClkMinMaxVfOffset,
        Entry::DeviceSetGpuLockedClocks,
        Entry::DeviceResetGpuLockedClocks,
        Entry::DeviceGetSupportedMemoryClocks,
        Entry::DeviceGetSupportedGraphicsClocks,
    ];

    /// Exported symbol name
    pub fn symbol(self) -> &'static str {
        match self {
            Entry::Init => "nvmlInit_v2",
            Entry::Shutdown => "nvmlShutdown",
            Entry::ErrorString => "nvmlErrorString",
            Entry::SystemGetDriverVersion => "nvmlSystemGetDriverVersion",
            Entry::SystemGetNvmlVersion => "nvmlSystemGetNVMLVersion",
            Entry::SystemGetCudaDriverVersion => "nvmlSystemGetCudaDriverVersion",
            Entry::DeviceGetCount => "nvmlDeviceGetCount_v2",
            Entry::DeviceGetHandleByIndex => "nvmlDeviceGetHandleByIndex_v2",
            Entry::DeviceGetName => "nvmlDeviceGetName",
            Entry::DeviceGetUuid => "nvmlDeviceGetUUID",
            Entry::DeviceGetUtilizationRates => "nvmlDeviceGetUtilizationRates",
            Entry::DeviceGetMemoryInfo => "nvmlDeviceGetMemoryInfo",
            Entry::DeviceGetClockInfo => "nvmlDeviceGetClockInfo",
            Entry::DeviceGetMaxClockInfo => "nvmlDeviceGetMaxClockInfo",
            Entry::DeviceGetPowerUsage => "nvmlDeviceGetPowerUsage",
            Entry::DeviceGetSamples => "nvmlDeviceGetSamples",
            Entry::DeviceGetTemperature => "nvmlDeviceGetTemperature",
            Entry::DeviceGetTemperatureV => "nvmlDeviceGetTemperatureV",
            Entry::DeviceGetFanSpeed => "nvmlDeviceGetFanSpeed",
            Entry::DeviceGetFanSpeedRpm => "nvmlDeviceGetFanSpeedRPM",
            Entry::DeviceGetCurrentClocksEventReasons => "nvmlDeviceGetCurrentClocksEventReasons",
            Entry::DeviceGetPowerManagementLimitConstraints => {
                "nvmlDeviceGetPowerManagementLimitConstraints"
            }
            Entry::DeviceGetPowerManagementDefaultLimit => {
                "nvmlDeviceGetPowerManagementDefaultLimit"
            }
            Entry::DeviceGetPowerManagementLimit => "nvmlDeviceGetPowerManagementLimit",
            Entry::DeviceGetEnforcedPowerLimit => "nvmlDeviceGetEnforcedPowerLimit",
            Entry::DeviceSetPowerManagementLimit => "nvmlDeviceSetPowerManagementLimit",
            Entry::DeviceGetClockOffsets => "nvmlDeviceGetClockOffsets",
            Entry::DeviceSetClockOffsets => "nvmlDeviceSetClockOffsets",
            Entry::DeviceGetGpcClkVfOffset => "nvmlDeviceGetGpcClkVfOffset",
            Entry::DeviceSetGpcClkVfOffset => "nvmlDeviceSetGpcClkVfOffset",
            Entry::DeviceGetGpcClkMinMaxVfOffset => "nvmlDeviceGetGpcClkMinMaxVfOffset",
            Entry::DeviceGetMemClkVfOffset => "nvmlDeviceGetMemClkVfOffset",
            Entry::DeviceSetMemClkVfOffset => "nvmlDeviceSetMemClkVfOffset",
            Entry::DeviceGetMemClkMinMaxVfOffset => "nvmlDeviceGetMemClkMinMaxVfOffset",
            Entry::DeviceSetGpuLockedClocks => "nvmlDeviceSetGpuLockedClocks",
            Entry::DeviceResetGpuLockedClocks => "nvmlDeviceResetGpuLockedClocks",
            Entry::DeviceGetSupportedMemoryClocks => "nvmlDeviceGetSupportedMemoryClocks",
            Entry::DeviceGetSupportedGraphicsClocks => "nvmlDeviceGetSupportedGraphicsClocks",
        }
    }

    /// Entry points without which a session cannot start
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Entry::Init
                | Entry::Shutdown
                | Entry::DeviceGetCount
                | Entry::DeviceGetHandleByIndex
                | Entry::DeviceGetName
                | Entry::DeviceGetUuid
        )
    }
}

/// Typed access to the NVML entry points
///
/// Every call returns `None` when the entry point is unbound, otherwise the
/// raw status. Out-parameters follow the C API. Implemented by
/// [`RawSymbols`] for the real library and by `MockSymbols` in tests.
pub trait NvmlSymbols: Send + Sync {
    /// Whether the driver exports this entry point
    fn is_bound(&self, entry: Entry) -> bool;

    fn init(&self) -> Option<ReturnCode>;
    fn shutdown(&self) -> Option<ReturnCode>;

    /// `nvmlErrorString`; an empty string stands for a null result
    fn error_string(&self, code: ReturnCode) -> Option<String>;

    fn system_get_driver_version(&self, buf: &mut [u8]) -> Option<ReturnCode>;
    fn system_get_nvml_version(&self, buf: &mut [u8]) -> Option<ReturnCode>;
    fn system_get_cuda_driver_version(&self, version: &mut i32) -> Option<ReturnCode>;

    fn device_get_count(&self, count: &mut u32) -> Option<ReturnCode>;
    fn device_get_handle_by_index(&self, index: u32, device: &mut DeviceHandle)
        -> Option<ReturnCode>;
    fn device_get_name(&self, device: DeviceHandle, buf: &mut [u8]) -> Option<ReturnCode>;
    fn device_get_uuid(&self, device: DeviceHandle, buf: &mut [u8]) -> Option<ReturnCode>;

    fn device_get_utilization_rates(
        &self,
        device: DeviceHandle,
        util: &mut RawUtilization,
    ) -> Option<ReturnCode>;
    fn device_get_memory_info(&self, device: DeviceHandle, memory: &mut RawMemory)
        -> Option<ReturnCode>;
    fn device_get_clock_info(
        &self,
        device: DeviceHandle,
        clock_type: c_int,
        mhz: &mut u32,
    ) -> Option<ReturnCode>;
    fn device_get_max_clock_info(
        &self,
        device: DeviceHandle,
        clock_type: c_int,
        mhz: &mut u32,
    ) -> Option<ReturnCode>;
    fn device_get_power_usage(&self, device: DeviceHandle, milliwatts: &mut u32)
        -> Option<ReturnCode>;

    /// `nvmlDeviceGetSamples`; `samples = None` asks for the required count
    fn device_get_samples(
        &self,
        device: DeviceHandle,
        sampling_type: c_int,
        last_seen: u64,
        value_type: &mut c_int,
        count: &mut u32,
        samples: Option<&mut [RawSample]>,
    ) -> Option<ReturnCode>;

    fn device_get_temperature(
        &self,
        device: DeviceHandle,
        sensor: c_int,
        celsius: &mut u32,
    ) -> Option<ReturnCode>;
    fn device_get_temperature_v(
        &self,
        device: DeviceHandle,
        info: &mut RawTemperature,
    ) -> Option<ReturnCode>;
    fn device_get_fan_speed(&self, device: DeviceHandle, percent: &mut u32) -> Option<ReturnCode>;
    fn device_get_fan_speed_rpm(
        &self,
        device: DeviceHandle,
        info: &mut RawFanSpeedInfo,
    ) -> Option<ReturnCode>;
    fn device_get_current_clocks_event_reasons(
        &self,
        device: DeviceHandle,
        reasons: &mut u64,
    ) -> Option<ReturnCode>;

    fn device_get_power_management_limit_constraints(
        &self,
        device: DeviceHandle,
        min: &mut u32,
        max: &mut u32,
    ) -> Option<ReturnCode>;
    fn device_get_power_management_default_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode>;
    fn device_get_power_management_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode>;
    fn device_get_enforced_power_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode>;
    fn device_set_power_management_limit(
        &self,
        device: DeviceHandle,
        milliwatts: u32,
    ) -> Option<ReturnCode>;

    fn device_get_clock_offsets(
        &self,
        device: DeviceHandle,
        info: &mut RawClockOffset,
    ) -> Option<ReturnCode>;
    fn device_set_clock_offsets(
        &self,
        device: DeviceHandle,
        info: &mut RawClockOffset,
    ) -> Option<ReturnCode>;
    fn device_get_gpc_clk_vf_offset(&self, device: DeviceHandle, offset: &mut i32)
        -> Option<ReturnCode>;
    fn device_set_gpc_clk_vf_offset(&self, device: DeviceHandle, offset: i32)
        -> Option<ReturnCode>;
    fn device_get_gpc_clk_min_max_vf_offset(
        &self,
        device: DeviceHandle,
        min: &mut i32,
        max: &mut i32,
    ) -> Option<ReturnCode>;
    fn device_get_mem_clk_vf_offset(&self, device: DeviceHandle, offset: &mut i32)
        -> Option<ReturnCode>;
    fn device_set_mem_clk_vf_offset(&self, device: DeviceHandle, offset: i32)
        -> Option<ReturnCode>;
    fn device_get_mem_clk_min_max_vf_offset(
        &self,
        device: DeviceHandle,
        min: &mut i32,
        max: &mut i32,
    ) -> Option<ReturnCode>;

    fn device_set_gpu_locked_clocks(
        &self,
        device: DeviceHandle,
        min_mhz: u32,
        max_mhz: u32,
    ) -> Option<ReturnCode>;
    fn device_reset_gpu_locked_clocks(&self, device: DeviceHandle) -> Option<ReturnCode>;

    /// `clocks = None` asks for the required count
    fn device_get_supported_memory_clocks(
        &self,
        device: DeviceHandle,
        count: &mut u32,
        clocks: Option<&mut [u32]>,
    ) -> Option<ReturnCode>;
    fn device_get_supported_graphics_clocks(
        &self,
        device: DeviceHandle,
        memory_mhz: u32,
        count: &mut u32,
        clocks: Option<&mut [u32]>,
    ) -> Option<ReturnCode>;
}

type VoidFn = unsafe extern "C" fn() -> nvmlReturn_enum;
type ErrorStringFn = unsafe extern "C" fn(nvmlReturn_enum) -> *const c_char;
type SystemBufferFn = unsafe extern "C" fn(*mut c_char, c_uint) -> nvmlReturn_enum;
type SystemIntFn = unsafe extern "C" fn(*mut c_int) -> nvmlReturn_enum;
type CountFn = unsafe extern "C" fn(*mut c_uint) -> nvmlReturn_enum;
type HandleByIndexFn = unsafe extern "C" fn(c_uint, *mut nvmlDevice_t) -> nvmlReturn_enum;
type DeviceFn = unsafe extern "C" fn(nvmlDevice_t) -> nvmlReturn_enum;
type DeviceBufferFn = unsafe extern "C" fn(nvmlDevice_t, *mut c_char, c_uint) -> nvmlReturn_enum;
type DeviceUintFn = unsafe extern "C" fn(nvmlDevice_t, *mut c_uint) -> nvmlReturn_enum;
type DeviceUlonglongFn = unsafe extern "C" fn(nvmlDevice_t, *mut c_ulonglong) -> nvmlReturn_enum;
type DeviceIntFn = unsafe extern "C" fn(nvmlDevice_t, *mut c_int) -> nvmlReturn_enum;
type DeviceUintPairFn =
    unsafe extern "C" fn(nvmlDevice_t, *mut c_uint, *mut c_uint) -> nvmlReturn_enum;
type DeviceIntPairFn = unsafe extern "C" fn(nvmlDevice_t, *mut c_int, *mut c_int) -> nvmlReturn_enum;
type DeviceSetUintFn = unsafe extern "C" fn(nvmlDevice_t, c_uint) -> nvmlReturn_enum;
type DeviceSetIntFn = unsafe extern "C" fn(nvmlDevice_t, c_int) -> nvmlReturn_enum;
type DeviceSetUintPairFn = unsafe extern "C" fn(nvmlDevice_t, c_uint, c_uint) -> nvmlReturn_enum;
type DeviceTypedUintFn = unsafe extern "C" fn(nvmlDevice_t, c_int, *mut c_uint) -> nvmlReturn_enum;
type UtilizationFn = unsafe extern "C" fn(nvmlDevice_t, *mut RawUtilization) -> nvmlReturn_enum;
type MemoryFn = unsafe extern "C" fn(nvmlDevice_t, *mut RawMemory) -> nvmlReturn_enum;
type TemperatureVFn = unsafe extern "C" fn(nvmlDevice_t, *mut RawTemperature) -> nvmlReturn_enum;
type FanSpeedRpmFn = unsafe extern "C" fn(nvmlDevice_t, *mut RawFanSpeedInfo) -> nvmlReturn_enum;
type ClockOffsetsFn = unsafe extern "C" fn(nvmlDevice_t, *mut RawClockOffset) -> nvmlReturn_enum;
type SamplesFn = unsafe extern "C" fn(
    nvmlDevice_t,
    c_int,
    c_ulonglong,
    *mut c_int,
    *mut c_uint,
    *mut RawSample,
) -> nvmlReturn_enum;
type SupportedGraphicsClocksFn =
    unsafe extern "C" fn(nvmlDevice_t, c_uint, *mut c_uint, *mut c_uint) -> nvmlReturn_enum;

/// Platform names tried in order when loading the library
#[cfg(target_os = "windows")]
const LIBRARY_NAMES: &[&str] = &["nvml.dll"];

#[cfg(not(target_os = "windows"))]
const LIBRARY_NAMES: &[&str] = &["libnvidia-ml.so.1", "libnvidia-ml.so"];

/// Symbol table backed by the dynamically loaded NVML library
pub struct RawSymbols {
    init: Option<VoidFn>,
    shutdown: Option<VoidFn>,
    error_string: Option<ErrorStringFn>,
    system_get_driver_version: Option<SystemBufferFn>,
    system_get_nvml_version: Option<SystemBufferFn>,
    system_get_cuda_driver_version: Option<SystemIntFn>,
    device_get_count: Option<CountFn>,
    device_get_handle_by_index: Option<HandleByIndexFn>,
    device_get_name: Option<DeviceBufferFn>,
    device_get_uuid: Option<DeviceBufferFn>,
    device_get_utilization_rates: Option<UtilizationFn>,
    device_get_memory_info: Option<MemoryFn>,
    device_get_clock_info: Option<DeviceTypedUintFn>,
    device_get_max_clock_info: Option<DeviceTypedUintFn>,
    device_get_power_usage: Option<DeviceUintFn>,
    device_get_samples: Option<SamplesFn>,
    device_get_temperature: Option<DeviceTypedUintFn>,
    device_get_temperature_v: Option<TemperatureVFn>,
    device_get_fan_speed: Option<DeviceUintFn>,
    device_get_fan_speed_rpm: Option<FanSpeedRpmFn>,
    device_get_current_clocks_event_reasons: Option<DeviceUlonglongFn>,
    device_get_power_management_limit_constraints: Option<DeviceUintPairFn>,
    device_get_power_management_default_limit: Option<DeviceUintFn>,
    device_get_power_management_limit: Option<DeviceUintFn>,
    device_get_enforced_power_limit: Option<DeviceUintFn>,
    device_set_power_management_limit: Option<DeviceSetUintFn>,
    device_get_clock_offsets: Option<ClockOffsetsFn>,
    device_set_clock_offsets: Option<ClockOffsetsFn>,
    device_get_gpc_clk_vf_offset: Option<DeviceIntFn>,
    device_set_gpc_clk_vf_offset: Option<DeviceSetIntFn>,
    device_get_gpc_clk_min_max_vf_offset: Option<DeviceIntPairFn>,
    device_get_mem_clk_vf_offset: Option<DeviceIntFn>,
    device_set_mem_clk_vf_offset: Option<DeviceSetIntFn>,
    device_get_mem_clk_min_max_vf_offset: Option<DeviceIntPairFn>,
    device_set_gpu_locked_clocks: Option<DeviceSetUintPairFn>,
    device_reset_gpu_locked_clocks: Option<DeviceFn>,
    device_get_supported_memory_clocks: Option<DeviceUintPairFn>,
    device_get_supported_graphics_clocks: Option<SupportedGraphicsClocksFn>,
    // Keeps the bound function pointers valid.
    _lib: Library,
}

impl RawSymbols {
    /// Load the platform NVML library and bind every known entry point
    pub fn load() -> Result<Self, NvmlError> {
        let lib = Self::load_library()?;

        // SAFETY: each binding's type matches the prototype in nvml.h for
        // the symbol named by its Entry.
        let symbols = unsafe {
            Self {
                init: bind(&lib, Entry::Init),
                shutdown: bind(&lib, Entry::Shutdown),
                error_string: bind(&lib, Entry::ErrorString),
                system_get_driver_version: bind(&lib, Entry::SystemGetDriverVersion),
                system_get_nvml_version: bind(&lib, Entry::SystemGetNvmlVersion),
                system_get_cuda_driver_version: bind(&lib, Entry::SystemGetCudaDriverVersion),
                device_get_count: bind(&lib, Entry::DeviceGetCount),
                device_get_handle_by_index: bind(&lib, Entry::DeviceGetHandleByIndex),
                device_get_name: bind(&lib, Entry::DeviceGetName),
                device_get_uuid: bind(&lib, Entry::DeviceGetUuid),
                device_get_utilization_rates: bind(&lib, Entry::DeviceGetUtilizationRates),
                device_get_memory_info: bind(&lib, Entry::DeviceGetMemoryInfo),
                device_get_clock_info: bind(&lib, Entry::DeviceGetClockInfo),
                device_get_max_clock_info: bind(&lib, Entry::DeviceGetMaxClockInfo),
                device_get_power_usage: bind(&lib, Entry::DeviceGetPowerUsage),
                device_get_samples: bind(&lib, Entry::DeviceGetSamples),
                device_get_temperature: bind(&lib, Entry::DeviceGetTemperature),
                device_get_temperature_v: bind(&lib, Entry::DeviceGetTemperatureV),
                device_get_fan_speed: bind(&lib, Entry::DeviceGetFanSpeed),
                device_get_fan_speed_rpm: bind(&lib, Entry::DeviceGetFanSpeedRpm),
                device_get_current_clocks_event_reasons: bind(
                    &lib,
                    Entry::DeviceGetCurrentClocksEventReasons,
                ),
                device_get_power_management_limit_constraints: bind(
                    &lib,
                    Entry::DeviceGetPowerManagementLimitConstraints,
                ),
                device_get_power_management_default_limit: bind(
                    &lib,
                    Entry::DeviceGetPowerManagementDefaultLimit,
                ),
                device_get_power_management_limit: bind(&lib, Entry::DeviceGetPowerManagementLimit),
                device_get_enforced_power_limit: bind(&lib, Entry::DeviceGetEnforcedPowerLimit),
                device_set_power_management_limit: bind(&lib, Entry::DeviceSetPowerManagementLimit),
                device_get_clock_offsets: bind(&lib, Entry::DeviceGetClockOffsets),
                device_set_clock_offsets: bind(&lib, Entry::DeviceSetClockOffsets),
                device_get_gpc_clk_vf_offset: bind(&lib, Entry::DeviceGetGpcClkVfOffset),
                device_set_gpc_clk_vf_offset: bind(&lib, Entry::DeviceSetGpcClkVfOffset),
                device_get_gpc_clk_min_max_vf_offset: bind(
                    &lib,
                    Entry::DeviceGetGpcClkMinMaxVfOffset,
                ),
                device_get_mem_clk_vf_offset: bind(&lib, Entry::DeviceGetMemClkVfOffset),
                device_set_mem_clk_vf_offset: bind(&lib, Entry::DeviceSetMemClkVfOffset),
                device_get_mem_clk_min_max_vf_offset: bind(
                    &lib,
                    Entry::DeviceGetMemClkMinMaxVfOffset,
                ),
                device_set_gpu_locked_clocks: bind(&lib, Entry::DeviceSetGpuLockedClocks),
                device_reset_gpu_locked_clocks: bind(&lib, Entry::DeviceResetGpuLockedClocks),
                device_get_supported_memory_clocks: bind(
                    &lib,
                    Entry::DeviceGetSupportedMemoryClocks,
                ),
                device_get_supported_graphics_clocks: bind(
                    &lib,
                    Entry::DeviceGetSupportedGraphicsClocks,
                ),
                _lib: lib,
            }
        };

        let unbound = Entry::ALL
            .iter()
            .filter(|e| !symbols.is_bound(**e))
            .count();
        log::debug!(
            "Bound {} of {} NVML entry points",
            Entry::ALL.len() - unbound,
            Entry::ALL.len()
        );

        Ok(symbols)
    }

    fn load_library() -> Result<Library, NvmlError> {
        let mut last_err = String::new();
        for name in LIBRARY_NAMES {
            // SAFETY: loading NVML runs its library constructors only.
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    log::info!("Loaded NVML from {}", name);
                    return Ok(lib);
                }
                Err(e) => {
                    log::debug!("Failed to load {}: {}", name, e);
                    last_err = format!("{}: {}", name, e);
                }
            }
        }
        Err(NvmlError::LibraryNotFound(last_err))
    }
}

/// Bind one entry point, leaving it unbound if the driver lacks it
///
/// # Safety
/// `F` must be the function pointer type of the named symbol.
unsafe fn bind<F: Copy>(lib: &Library, entry: Entry) -> Option<F> {
    match lib.get::<F>(entry.symbol().as_bytes()) {
        Ok(symbol) => {
            let symbol: Symbol<F> = symbol;
            Some(*symbol)
        }
        Err(_) => {
            log::debug!("{} not exported by this driver", entry.symbol());
            None
        }
    }
}

fn buffer_ptr(buf: &mut [u8]) -> (*mut c_char, c_uint) {
    (buf.as_mut_ptr() as *mut c_char, buf.len() as c_uint)
}

fn slice_ptr<T>(slice: Option<&mut [T]>) -> *mut T {
    slice.map_or(std::ptr::null_mut(), |s| s.as_mut_ptr())
}

// SAFETY (all calls below): pointers come from live Rust references or
// slices whose lengths are passed alongside, and device handles were
// produced by this library.
impl NvmlSymbols for RawSymbols {
    fn is_bound(&self, entry: Entry) -> bool {
        match entry {
            Entry::Init => self.init.is_some(),
            Entry::Shutdown => self.shutdown.is_some(),
            Entry::ErrorString => self.error_string.is_some(),
            Entry::SystemGetDriverVersion => self.system_get_driver_version.is_some(),
            Entry::SystemGetNvmlVersion => self.system_get_nvml_version.is_some(),
            Entry::SystemGetCudaDriverVersion => self.system_get_cuda_driver_version.is_some(),
            Entry::DeviceGetCount => self.device_get_count.is_some(),
            Entry::DeviceGetHandleByIndex => self.device_get_handle_by_index.is_some(),
            Entry::DeviceGetName => self.device_get_name.is_some(),
            Entry::DeviceGetUuid => self.device_get_uuid.is_some(),
            Entry::DeviceGetUtilizationRates => self.device_get_utilization_rates.is_some(),
            Entry::DeviceGetMemoryInfo => self.device_get_memory_info.is_some(),
            Entry::DeviceGetClockInfo => self.device_get_clock_info.is_some(),
            Entry::DeviceGetMaxClockInfo => self.device_get_max_clock_info.is_some(),
            Entry::DeviceGetPowerUsage => self.device_get_power_usage.is_some(),
            Entry::DeviceGetSamples => self.device_get_samples.is_some(),
            Entry::DeviceGetTemperature => self.device_get_temperature.is_some(),
            Entry::DeviceGetTemperatureV => self.device_get_temperature_v.is_some(),
            Entry::DeviceGetFanSpeed => self.device_get_fan_speed.is_some(),
            Entry::DeviceGetFanSpeedRpm => self.device_get_fan_speed_rpm.is_some(),
            Entry::DeviceGetCurrentClocksEventReasons => {
                self.device_get_current_clocks_event_reasons.is_some()
            }
            Entry::DeviceGetPowerManagementLimitConstraints => {
                self.device_get_power_management_limit_constraints.is_some()
            }
            Entry::DeviceGetPowerManagementDefaultLimit => {
                self.device_get_power_management_default_limit.is_some()
            }
            Entry::DeviceGetPowerManagementLimit => {
                self.device_get_power_management_limit.is_some()
            }
            Entry::DeviceGetEnforcedPowerLimit => self.device_get_enforced_power_limit.is_some(),
            Entry::DeviceSetPowerManagementLimit => {
                self.device_set_power_management_limit.is_some()
            }
            Entry::DeviceGetClockOffsets => self.device_get_clock_offsets.is_some(),
            Entry::DeviceSetClockOffsets => self.device_set_clock_offsets.is_some(),
            Entry::DeviceGetGpcClkVfOffset => self.device_get_gpc_clk_vf_offset.is_some(),
            Entry::DeviceSetGpcClkVfOffset => self.device_set_gpc_clk_vf_offset.is_some(),
            Entry::DeviceGetGpcClkMinMaxVfOffset => {
                self.device_get_gpc_clk_min_max_vf_offset.is_some()
            }
            Entry::DeviceGetMemClkVfOffset => self.device_get_mem_clk_vf_offset.is_some(),
            Entry::DeviceSetMemClkVfOffset => self.device_set_mem_clk_vf_offset.is_some(),
            Entry::DeviceGetMemClkMinMaxVfOffset => {
                self.device_get_mem_clk_min_max_vf_offset.is_some()
            }
            Entry::DeviceSetGpuLockedClocks => self.device_set_gpu_locked_clocks.is_some(),
            Entry::DeviceResetGpuLockedClocks => self.device_reset_gpu_locked_clocks.is_some(),
            Entry::DeviceGetSupportedMemoryClocks => {
                self.device_get_supported_memory_clocks.is_some()
            }
            Entry::DeviceGetSupportedGraphicsClocks => {
                self.device_get_supported_graphics_clocks.is_some()
            }
        }
    }

    fn init(&self) -> Option<ReturnCode> {
        let f = self.init?;
        Some(ReturnCode(unsafe { f() }))
    }

    fn shutdown(&self) -> Option<ReturnCode> {
        let f = self.shutdown?;
        Some(ReturnCode(unsafe { f() }))
    }

    fn error_string(&self, code: ReturnCode) -> Option<String> {
        let f = self.error_string?;
        let ptr = unsafe { f(code.0) };
        if ptr.is_null() {
            return Some(String::new());
        }
        // SAFETY: nvmlErrorString returns a static NUL-terminated string.
        let text = unsafe { CStr::from_ptr(ptr) };
        Some(text.to_string_lossy().into_owned())
    }

    fn system_get_driver_version(&self, buf: &mut [u8]) -> Option<ReturnCode> {
        let f = self.system_get_driver_version?;
        let (ptr, len) = buffer_ptr(buf);
        Some(ReturnCode(unsafe { f(ptr, len) }))
    }

    fn system_get_nvml_version(&self, buf: &mut [u8]) -> Option<ReturnCode> {
        let f = self.system_get_nvml_version?;
        let (ptr, len) = buffer_ptr(buf);
        Some(ReturnCode(unsafe { f(ptr, len) }))
    }

    fn system_get_cuda_driver_version(&self, version: &mut i32) -> Option<ReturnCode> {
        let f = self.system_get_cuda_driver_version?;
        Some(ReturnCode(unsafe { f(version) }))
    }

    fn device_get_count(&self, count: &mut u32) -> Option<ReturnCode> {
        let f = self.device_get_count?;
        Some(ReturnCode(unsafe { f(count) }))
    }

    fn device_get_handle_by_index(
        &self,
        index: u32,
        device: &mut DeviceHandle,
    ) -> Option<ReturnCode> {
        let f = self.device_get_handle_by_index?;
        let mut raw: nvmlDevice_t = std::ptr::null_mut();
        let ret = ReturnCode(unsafe { f(index, &mut raw) });
        *device = DeviceHandle::from_raw(raw);
        Some(ret)
    }

    fn device_get_name(&self, device: DeviceHandle, buf: &mut [u8]) -> Option<ReturnCode> {
        let f = self.device_get_name?;
        let (ptr, len) = buffer_ptr(buf);
        Some(ReturnCode(unsafe { f(device.as_raw(), ptr, len) }))
    }

    fn device_get_uuid(&self, device: DeviceHandle, buf: &mut [u8]) -> Option<ReturnCode> {
        let f = self.device_get_uuid?;
        let (ptr, len) = buffer_ptr(buf);
        Some(ReturnCode(unsafe { f(device.as_raw(), ptr, len) }))
    }

    fn device_get_utilization_rates(
        &self,
        device: DeviceHandle,
        util: &mut RawUtilization,
    ) -> Option<ReturnCode> {
        let f = self.device_get_utilization_rates?;
        Some(ReturnCode(unsafe { f(device.as_raw(), util) }))
    }

    fn device_get_memory_info(
        &self,
        device: DeviceHandle,
        memory: &mut RawMemory,
    ) -> Option<ReturnCode> {
        let f = self.device_get_memory_info?;
        Some(ReturnCode(unsafe { f(device.as_raw(), memory) }))
    }

    fn device_get_clock_info(
        &self,
        device: DeviceHandle,
        clock_type: c_int,
        mhz: &mut u32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_clock_info?;
        Some(ReturnCode(unsafe { f(device.as_raw(), clock_type, mhz) }))
    }

    fn device_get_max_clock_info(
        &self,
        device: DeviceHandle,
        clock_type: c_int,
        mhz: &mut u32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_max_clock_info?;
        Some(ReturnCode(unsafe { f(device.as_raw(), clock_type, mhz) }))
    }

    fn device_get_power_usage(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_power_usage?;
        Some(ReturnCode(unsafe { f(device.as_raw(), milliwatts) }))
    }

    fn device_get_samples(
        &self,
        device: DeviceHandle,
        sampling_type: c_int,
        last_seen: u64,
        value_type: &mut c_int,
        count: &mut u32,
        samples: Option<&mut [RawSample]>,
    ) -> Option<ReturnCode> {
        let f = self.device_get_samples?;
        if let Some(buf) = samples.as_deref() {
            *count = (*count).min(buf.len() as u32);
        }
        let ptr = slice_ptr(samples);
        Some(ReturnCode(unsafe {
            f(device.as_raw(), sampling_type, last_seen, value_type, count, ptr)
        }))
    }

    fn device_get_temperature(
        &self,
        device: DeviceHandle,
        sensor: c_int,
        celsius: &mut u32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_temperature?;
        Some(ReturnCode(unsafe { f(device.as_raw(), sensor, celsius) }))
    }

    fn device_get_temperature_v(
        &self,
        device: DeviceHandle,
        info: &mut RawTemperature,
    ) -> Option<ReturnCode> {
        let f = self.device_get_temperature_v?;
        Some(ReturnCode(unsafe { f(device.as_raw(), info) }))
    }

    fn device_get_fan_speed(&self, device: DeviceHandle, percent: &mut u32) -> Option<ReturnCode> {
        let f = self.device_get_fan_speed?;
        Some(ReturnCode(unsafe { f(device.as_raw(), percent) }))
    }

    fn device_get_fan_speed_rpm(
        &self,
        device: DeviceHandle,
        info: &mut RawFanSpeedInfo,
    ) -> Option<ReturnCode> {
        let f = self.device_get_fan_speed_rpm?;
        Some(ReturnCode(unsafe { f(device.as_raw(), info) }))
    }

    fn device_get_current_clocks_event_reasons(
        &self,
        device: DeviceHandle,
        reasons: &mut u64,
    ) -> Option<ReturnCode> {
        let f = self.device_get_current_clocks_event_reasons?;
        Some(ReturnCode(unsafe { f(device.as_raw(), reasons) }))
    }

    fn device_get_power_management_limit_constraints(
        &self,
        device: DeviceHandle,
        min: &mut u32,
        max: &mut u32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_power_management_limit_constraints?;
        Some(ReturnCode(unsafe { f(device.as_raw(), min, max) }))
    }

    fn device_get_power_management_default_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_power_management_default_limit?;
        Some(ReturnCode(unsafe { f(device.as_raw(), milliwatts) }))
    }

    fn device_get_power_management_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_power_management_limit?;
        Some(ReturnCode(unsafe { f(device.as_raw(), milliwatts) }))
    }

    fn device_get_enforced_power_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_enforced_power_limit?;
        Some(ReturnCode(unsafe { f(device.as_raw(), milliwatts) }))
    }

    fn device_set_power_management_limit(
        &self,
        device: DeviceHandle,
        milliwatts: u32,
    ) -> Option<ReturnCode> {
        let f = self.device_set_power_management_limit?;
        Some(ReturnCode(unsafe { f(device.as_raw(), milliwatts) }))
    }

    fn device_get_clock_offsets(
        &self,
        device: DeviceHandle,
        info: &mut RawClockOffset,
    ) -> Option<ReturnCode> {
        let f = self.device_get_clock_offsets?;
        Some(ReturnCode(unsafe { f(device.as_raw(), info) }))
    }

    fn device_set_clock_offsets(
        &self,
        device: DeviceHandle,
        info: &mut RawClockOffset,
    ) -> Option<ReturnCode> {
        let f = self.device_set_clock_offsets?;
        Some(ReturnCode(unsafe { f(device.as_raw(), info) }))
    }

    fn device_get_gpc_clk_vf_offset(
        &self,
        device: DeviceHandle,
        offset: &mut i32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_gpc_clk_vf_offset?;
        Some(ReturnCode(unsafe { f(device.as_raw(), offset) }))
    }

    fn device_set_gpc_clk_vf_offset(&self, device: DeviceHandle, offset: i32) -> Option<ReturnCode> {
        let f = self.device_set_gpc_clk_vf_offset?;
        Some(ReturnCode(unsafe { f(device.as_raw(), offset) }))
    }

    fn device_get_gpc_clk_min_max_vf_offset(
        &self,
        device: DeviceHandle,
        min: &mut i32,
        max: &mut i32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_gpc_clk_min_max_vf_offset?;
        Some(ReturnCode(unsafe { f(device.as_raw(), min, max) }))
    }

    fn device_get_mem_clk_vf_offset(
        &self,
        device: DeviceHandle,
        offset: &mut i32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_mem_clk_vf_offset?;
        Some(ReturnCode(unsafe { f(device.as_raw(), offset) }))
    }

    fn device_set_mem_clk_vf_offset(&self, device: DeviceHandle, offset: i32) -> Option<ReturnCode> {
        let f = self.device_set_mem_clk_vf_offset?;
        Some(ReturnCode(unsafe { f(device.as_raw(), offset) }))
    }

    fn device_get_mem_clk_min_max_vf_offset(
        &self,
        device: DeviceHandle,
        min: &mut i32,
        max: &mut i32,
    ) -> Option<ReturnCode> {
        let f = self.device_get_mem_clk_min_max_vf_offset?;
        Some(ReturnCode(unsafe { f(device.as_raw(), min, max) }))
    }

    fn device_set_gpu_locked_clocks(
        &self,
        device: DeviceHandle,
        min_mhz: u32,
        max_mhz: u32,
    ) -> Option<ReturnCode> {
        let f = self.device_set_gpu_locked_clocks?;
        Some(ReturnCode(unsafe { f(device.as_raw(), min_mhz, max_mhz) }))
    }

    fn device_reset_gpu_locked_clocks(&self, device: DeviceHandle) -> Option<ReturnCode> {
        let f = self.device_reset_gpu_locked_clocks?;
        Some(ReturnCode(unsafe { f(device.as_raw()) }))
    }

    fn device_get_supported_memory_clocks(
        &self,
        device: DeviceHandle,
        count: &mut u32,
        clocks: Option<&mut [u32]>,
    ) -> Option<ReturnCode> {
        let f = self.device_get_supported_memory_clocks?;
        if let Some(buf) = clocks.as_deref() {
            *count = (*count).min(buf.len() as u32);
        }
        let ptr = slice_ptr(clocks);
        Some(ReturnCode(unsafe { f(device.as_raw(), count, ptr) }))
    }

    fn device_get_supported_graphics_clocks(
        &self,
        device: DeviceHandle,
        memory_mhz: u32,
        count: &mut u32,
        clocks: Option<&mut [u32]>,
    ) -> Option<ReturnCode> {
        let f = self.device_get_supported_graphics_clocks?;
        if let Some(buf) = clocks.as_deref() {
            *count = (*count).min(buf.len() as u32);
        }
        let ptr = slice_ptr(clocks);
        Some(ReturnCode(unsafe { f(device.as_raw(), memory_mhz, count, ptr) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_symbol_names_are_unique() {
        let names: HashSet<_> = Entry::ALL.iter().map(|e| e.symbol()).collect();
        assert_eq!(names.len(), Entry::ALL.len());
        assert!(names.iter().all(|n| n.starts_with("nvml")));
    }

    #[test]
    fn test_required_entries() {
        let required: Vec<_> = Entry::ALL.iter().filter(|e| e.is_required()).collect();
        assert_eq!(required.len(), 6);
        assert!(Entry::DeviceGetName.is_required());
        assert!(!Entry::DeviceGetClockOffsets.is_required());
    }

    #[test]
    #[ignore = "Requires NVIDIA GPU"]
    fn test_load_real_library() {
        let symbols = RawSymbols::load().unwrap();
        for entry in Entry::ALL.iter().filter(|e| e.is_required()) {
            assert!(symbols.is_bound(*entry), "{} unbound", entry.symbol());
        }
    }
}
