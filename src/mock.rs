//! In-memory NVML symbol table for testing
//!
//! `MockSymbols` implements [`NvmlSymbols`] over simulated GPUs so the device
//! layer, the manager and the services can be exercised without a driver.
//! Entry points can be unbound or forced to fail, and every call that reaches
//! a bound entry point is recorded.

use crate::nvml::ffi::{
    value_type, ClockDomain, DeviceHandle, RawClockOffset, RawFanSpeedInfo, RawMemory, RawSample,
    RawTemperature, RawUtilization, CLOCK_OFFSET_VERSION, FAN_SPEED_INFO_VERSION, PSTATE_0,
    TEMPERATURE_GPU, TEMPERATURE_VERSION, TOTAL_POWER_SAMPLES,
};
use crate::nvml::status::ReturnCode;
use crate::nvml::symbols::{Entry, NvmlSymbols};

use nvml_wrapper_sys::bindings::nvmlDevice_t;
use std::collections::{HashMap, HashSet};
use std::os::raw::c_int;
use std::sync::{Mutex, MutexGuard};

/// Simulated state of one GPU
#[derive(Debug, Clone)]
pub struct MockGpu {
    pub name: String,
    pub uuid: String,
    pub utilization: RawUtilization,
    pub memory: RawMemory,
    pub graphics_clock: u32,
    /// `None` makes memory clock reads unsupported
    pub memory_clock: Option<u32>,
    pub max_graphics_clock: u32,
    pub max_memory_clock: u32,
    pub power_usage_mw: u32,
    pub power_sample_type: c_int,
    pub power_samples: Vec<RawSample>,
    pub temperature: u32,
    pub fan_percent: u32,
    pub fan_rpm: u32,
    pub throttle_reasons: u64,
    pub power_constraints: (u32, u32),
    pub default_power_limit: u32,
    pub power_limit: u32,
    pub core_offset: i32,
    pub core_offset_range: (i32, i32),
    pub mem_offset: i32,
    pub mem_offset_range: (i32, i32),
    pub locked_clocks: Option<(u32, u32)>,
    pub memory_clocks: Vec<u32>,
    pub graphics_clocks: HashMap<u32, Vec<u32>>,
}

impl MockGpu {
    /// A high-end desktop card
    pub fn new(index: usize) -> Self {
        let memory_clocks = vec![10501, 5001, 810, 405];
        let graphics_clocks = memory_clocks
            .iter()
            .map(|&mem| {
                let top = if mem >= 5001 { 3105 } else { 2100 };
                (mem, (210..=top).rev().step_by(15).collect())
            })
            .collect();

        Self {
            name: "NVIDIA GeForce RTX 4090".to_string(),
            uuid: format!("GPU-a1b2c3d4-0000-4000-8000-{:012x}", index),
            utilization: RawUtilization { gpu: 35, memory: 20 },
            memory: RawMemory {
                total: 24 * 1024 * 1024 * 1024,
                free: 20 * 1024 * 1024 * 1024,
                used: 4 * 1024 * 1024 * 1024,
            },
            graphics_clock: 1800,
            memory_clock: Some(10501),
            max_graphics_clock: 3105,
            max_memory_clock: 10501,
            power_usage_mw: 250_000,
            power_sample_type: value_type::UNSIGNED_INT,
            power_samples: Vec::new(),
            temperature: 65,
            fan_percent: 45,
            fan_rpm: 1500,
            throttle_reasons: 0,
            power_constraints: (150_000, 600_000),
            default_power_limit: 450_000,
            power_limit: 450_000,
            core_offset: 0,
            core_offset_range: (-1000, 1000),
            mem_offset: 0,
            mem_offset_range: (-2000, 3000),
            locked_clocks: None,
            memory_clocks,
            graphics_clocks,
        }
    }
}

#[derive(Debug)]
struct MockState {
    gpus: Vec<MockGpu>,
    unbound: HashSet<Entry>,
    failures: HashMap<Entry, ReturnCode>,
    failing_handles: HashSet<u32>,
    calls: Vec<Entry>,
    initialized: bool,
    driver_version: String,
    nvml_version: String,
    cuda_version: i32,
}

/// Simulated NVML symbol table
#[derive(Debug)]
pub struct MockSymbols {
    state: Mutex<MockState>,
}

impl Default for MockSymbols {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSymbols {
    /// One GPU, every entry point bound
    pub fn new() -> Self {
        Self::with_gpus(1)
    }

    /// `count` GPUs, every entry point bound
    pub fn with_gpus(count: usize) -> Self {
        Self {
            state: Mutex::new(MockState {
                gpus: (0..count).map(MockGpu::new).collect(),
                unbound: HashSet::new(),
                failures: HashMap::new(),
                failing_handles: HashSet::new(),
                calls: Vec::new(),
                initialized: false,
                driver_version: "565.57.01".to_string(),
                nvml_version: "12.565.57.01".to_string(),
                cuda_version: 12070,
            }),
        }
    }

    /// Leave an entry point unbound
    pub fn without(self, entry: Entry) -> Self {
        self.lock().unbound.insert(entry);
        self
    }

    /// Leave several entry points unbound
    pub fn without_all(self, entries: &[Entry]) -> Self {
        self.lock().unbound.extend(entries.iter().copied());
        self
    }

    /// Make every call to an entry point return `code`
    pub fn failing(self, entry: Entry, code: ReturnCode) -> Self {
        self.set_failure(entry, code);
        self
    }

    /// Make the handle lookup for one index fail
    pub fn with_failing_handle(self, index: u32) -> Self {
        self.lock().failing_handles.insert(index);
        self
    }

    /// Adjust one simulated GPU
    pub fn configure(self, index: usize, f: impl FnOnce(&mut MockGpu)) -> Self {
        if let Some(gpu) = self.lock().gpus.get_mut(index) {
            f(gpu);
        }
        self
    }

    /// Replace the supported-clock tables of one GPU
    pub fn with_clock_tables(self, index: usize, tables: &[(u32, Vec<u32>)]) -> Self {
        self.configure(index, |gpu| {
            gpu.memory_clocks = tables.iter().map(|(mem, _)| *mem).collect();
            gpu.graphics_clocks = tables.iter().cloned().collect();
        })
    }

    /// Replace the power sample buffer of one GPU
    pub fn with_power_samples(self, index: usize, tag: c_int, samples: Vec<RawSample>) -> Self {
        self.configure(index, |gpu| {
            gpu.power_sample_type = tag;
            gpu.power_samples = samples;
        })
    }

    pub fn set_failure(&self, entry: Entry, code: ReturnCode) {
        self.lock().failures.insert(entry, code);
    }

    pub fn clear_failure(&self, entry: Entry) {
        self.lock().failures.remove(&entry);
    }

    /// Snapshot of one simulated GPU
    pub fn gpu(&self, index: usize) -> Option<MockGpu> {
        self.lock().gpus.get(index).cloned()
    }

    /// Every call that reached a bound entry point, in order
    pub fn calls(&self) -> Vec<Entry> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, entry: Entry) -> usize {
        self.lock().calls.iter().filter(|e| **e == entry).count()
    }

    pub fn called(&self, entry: Entry) -> bool {
        self.call_count(entry) > 0
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Synthetic handle for a GPU index
    pub fn handle(index: u32) -> DeviceHandle {
        DeviceHandle::from_raw((index as usize + 1) as nvmlDevice_t)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dispatch(
        &self,
        entry: Entry,
        f: impl FnOnce(&mut MockState) -> ReturnCode,
    ) -> Option<ReturnCode> {
        let mut state = self.lock();
        if state.unbound.contains(&entry) {
            return None;
        }
        state.calls.push(entry);
        if let Some(code) = state.failures.get(&entry) {
            return Some(*code);
        }
        Some(f(&mut state))
    }

    fn dispatch_device(
        &self,
        entry: Entry,
        device: DeviceHandle,
        f: impl FnOnce(&mut MockGpu) -> ReturnCode,
    ) -> Option<ReturnCode> {
        self.dispatch(entry, |state| {
            let index = (device.as_raw() as usize).wrapping_sub(1);
            match state.gpus.get_mut(index) {
                Some(gpu) => f(gpu),
                None => ReturnCode::INVALID_ARGUMENT,
            }
        })
    }
}

fn write_cstr(buf: &mut [u8], text: &str) -> ReturnCode {
    let bytes = text.as_bytes();
    if bytes.len() + 1 > buf.len() {
        return ReturnCode::INSUFFICIENT_SIZE;
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    buf[bytes.len()] = 0;
    ReturnCode::SUCCESS
}

/// Two-call table protocol: size query with no buffer, then fill
fn fill_table(table: &[u32], count: &mut u32, clocks: Option<&mut [u32]>) -> ReturnCode {
    let len = table.len() as u32;
    match clocks {
        None => {
            let sufficient = *count >= len;
            *count = len;
            if sufficient {
                ReturnCode::SUCCESS
            } else {
                ReturnCode::INSUFFICIENT_SIZE
            }
        }
        Some(buf) => {
            if (*count as usize).min(buf.len()) < table.len() {
                *count = len;
                return ReturnCode::INSUFFICIENT_SIZE;
            }
            buf[..table.len()].copy_from_slice(table);
            *count = len;
            ReturnCode::SUCCESS
        }
    }
}

fn offset_slot(gpu: &mut MockGpu, clock_type: c_int) -> Option<(&mut i32, (i32, i32))> {
    if clock_type == ClockDomain::Graphics as c_int {
        Some((&mut gpu.core_offset, gpu.core_offset_range))
    } else if clock_type == ClockDomain::Memory as c_int {
        Some((&mut gpu.mem_offset, gpu.mem_offset_range))
    } else {
        None
    }
}

fn set_in_range(slot: &mut i32, range: (i32, i32), value: i32) -> ReturnCode {
    if value < range.0 || value > range.1 {
        return ReturnCode::INVALID_ARGUMENT;
    }
    *slot = value;
    ReturnCode::SUCCESS
}

impl NvmlSymbols for MockSymbols {
    fn is_bound(&self, entry: Entry) -> bool {
        !self.lock().unbound.contains(&entry)
    }

    fn init(&self) -> Option<ReturnCode> {
        self.dispatch(Entry::Init, |state| {
            state.initialized = true;
            ReturnCode::SUCCESS
        })
    }

    fn shutdown(&self) -> Option<ReturnCode> {
        self.dispatch(Entry::Shutdown, |state| {
            if !state.initialized {
                return ReturnCode::UNINITIALIZED;
            }
            state.initialized = false;
            ReturnCode::SUCCESS
        })
    }

    fn error_string(&self, code: ReturnCode) -> Option<String> {
        if !self.is_bound(Entry::ErrorString) {
            return None;
        }
        Some(code.description().unwrap_or_default().to_string())
    }

    fn system_get_driver_version(&self, buf: &mut [u8]) -> Option<ReturnCode> {
        self.dispatch(Entry::SystemGetDriverVersion, |state| {
            write_cstr(buf, &state.driver_version)
        })
    }

    fn system_get_nvml_version(&self, buf: &mut [u8]) -> Option<ReturnCode> {
        self.dispatch(Entry::SystemGetNvmlVersion, |state| {
            write_cstr(buf, &state.nvml_version)
        })
    }

    fn system_get_cuda_driver_version(&self, version: &mut i32) -> Option<ReturnCode> {
        self.dispatch(Entry::SystemGetCudaDriverVersion, |state| {
            *version = state.cuda_version;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_count(&self, count: &mut u32) -> Option<ReturnCode> {
        self.dispatch(Entry::DeviceGetCount, |state| {
            if !state.initialized {
                return ReturnCode::UNINITIALIZED;
            }
            *count = state.gpus.len() as u32;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_handle_by_index(
        &self,
        index: u32,
        device: &mut DeviceHandle,
    ) -> Option<ReturnCode> {
        self.dispatch(Entry::DeviceGetHandleByIndex, |state| {
            if state.failing_handles.contains(&index) {
                return ReturnCode::NO_PERMISSION;
            }
            if index as usize >= state.gpus.len() {
                return ReturnCode::INVALID_ARGUMENT;
            }
            *device = MockSymbols::handle(index);
            ReturnCode::SUCCESS
        })
    }

    fn device_get_name(&self, device: DeviceHandle, buf: &mut [u8]) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetName, device, |gpu| write_cstr(buf, &gpu.name))
    }

    fn device_get_uuid(&self, device: DeviceHandle, buf: &mut [u8]) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetUuid, device, |gpu| write_cstr(buf, &gpu.uuid))
    }

    fn device_get_utilization_rates(
        &self,
        device: DeviceHandle,
        util: &mut RawUtilization,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetUtilizationRates, device, |gpu| {
            *util = gpu.utilization;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_memory_info(
        &self,
        device: DeviceHandle,
        memory: &mut RawMemory,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetMemoryInfo, device, |gpu| {
            *memory = gpu.memory;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_clock_info(
        &self,
        device: DeviceHandle,
        clock_type: c_int,
        mhz: &mut u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetClockInfo, device, |gpu| {
            *mhz = match clock_type {
                t if t == ClockDomain::Graphics as c_int || t == ClockDomain::Sm as c_int => {
                    gpu.graphics_clock
                }
                t if t == ClockDomain::Memory as c_int => match gpu.memory_clock {
                    Some(mhz) => mhz,
                    None => return ReturnCode::NOT_SUPPORTED,
                },
                _ => return ReturnCode::NOT_SUPPORTED,
            };
            ReturnCode::SUCCESS
        })
    }

    fn device_get_max_clock_info(
        &self,
        device: DeviceHandle,
        clock_type: c_int,
        mhz: &mut u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetMaxClockInfo, device, |gpu| {
            *mhz = match clock_type {
                t if t == ClockDomain::Graphics as c_int || t == ClockDomain::Sm as c_int => {
                    gpu.max_graphics_clock
                }
                t if t == ClockDomain::Memory as c_int => gpu.max_memory_clock,
                _ => return ReturnCode::NOT_SUPPORTED,
            };
            ReturnCode::SUCCESS
        })
    }

    fn device_get_power_usage(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetPowerUsage, device, |gpu| {
            *milliwatts = gpu.power_usage_mw;
            ReturnCode::SUCCESS
        })
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
        self.dispatch_device(Entry::DeviceGetSamples, device, |gpu| {
            if sampling_type != TOTAL_POWER_SAMPLES {
                return ReturnCode::NOT_SUPPORTED;
            }
            let pending: Vec<RawSample> = gpu
                .power_samples
                .iter()
                .filter(|s| s.timestamp > last_seen)
                .copied()
                .collect();
            if pending.is_empty() {
                *count = 0;
                return ReturnCode::NOT_FOUND;
            }
            *value_type = gpu.power_sample_type;
            match samples {
                None => {
                    *count = pending.len() as u32;
                }
                Some(buf) => {
                    let n = (*count as usize).min(buf.len()).min(pending.len());
                    buf[..n].copy_from_slice(&pending[..n]);
                    *count = n as u32;
                }
            }
            ReturnCode::SUCCESS
        })
    }

    fn device_get_temperature(
        &self,
        device: DeviceHandle,
        sensor: c_int,
        celsius: &mut u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetTemperature, device, |gpu| {
            if sensor != TEMPERATURE_GPU {
                return ReturnCode::INVALID_ARGUMENT;
            }
            *celsius = gpu.temperature;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_temperature_v(
        &self,
        device: DeviceHandle,
        info: &mut RawTemperature,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetTemperatureV, device, |gpu| {
            if info.version != TEMPERATURE_VERSION {
                return ReturnCode::ARGUMENT_VERSION_MISMATCH;
            }
            info.temperature = gpu.temperature as c_int;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_fan_speed(&self, device: DeviceHandle, percent: &mut u32) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetFanSpeed, device, |gpu| {
            *percent = gpu.fan_percent;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_fan_speed_rpm(
        &self,
        device: DeviceHandle,
        info: &mut RawFanSpeedInfo,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetFanSpeedRpm, device, |gpu| {
            if info.version != FAN_SPEED_INFO_VERSION {
                return ReturnCode::ARGUMENT_VERSION_MISMATCH;
            }
            info.speed = gpu.fan_rpm;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_current_clocks_event_reasons(
        &self,
        device: DeviceHandle,
        reasons: &mut u64,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetCurrentClocksEventReasons, device, |gpu| {
            *reasons = gpu.throttle_reasons;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_power_management_limit_constraints(
        &self,
        device: DeviceHandle,
        min: &mut u32,
        max: &mut u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetPowerManagementLimitConstraints, device, |gpu| {
            (*min, *max) = gpu.power_constraints;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_power_management_default_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetPowerManagementDefaultLimit, device, |gpu| {
            *milliwatts = gpu.default_power_limit;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_power_management_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetPowerManagementLimit, device, |gpu| {
            *milliwatts = gpu.power_limit;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_enforced_power_limit(
        &self,
        device: DeviceHandle,
        milliwatts: &mut u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetEnforcedPowerLimit, device, |gpu| {
            *milliwatts = gpu.power_limit;
            ReturnCode::SUCCESS
        })
    }

    fn device_set_power_management_limit(
        &self,
        device: DeviceHandle,
        milliwatts: u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceSetPowerManagementLimit, device, |gpu| {
            let (min, max) = gpu.power_constraints;
            if milliwatts < min || milliwatts > max {
                return ReturnCode::INVALID_ARGUMENT;
            }
            gpu.power_limit = milliwatts;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_clock_offsets(
        &self,
        device: DeviceHandle,
        info: &mut RawClockOffset,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetClockOffsets, device, |gpu| {
            if info.version != CLOCK_OFFSET_VERSION {
                return ReturnCode::ARGUMENT_VERSION_MISMATCH;
            }
            if info.pstate != PSTATE_0 {
                return ReturnCode::NOT_SUPPORTED;
            }
            match offset_slot(gpu, info.clock_type) {
                Some((value, (min, max))) => {
                    info.clock_offset_mhz = *value;
                    info.min_clock_offset_mhz = min;
                    info.max_clock_offset_mhz = max;
                    ReturnCode::SUCCESS
                }
                None => ReturnCode::INVALID_ARGUMENT,
            }
        })
    }

    fn device_set_clock_offsets(
        &self,
        device: DeviceHandle,
        info: &mut RawClockOffset,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceSetClockOffsets, device, |gpu| {
            if info.version != CLOCK_OFFSET_VERSION {
                return ReturnCode::ARGUMENT_VERSION_MISMATCH;
            }
            if info.pstate != PSTATE_0 {
                return ReturnCode::NOT_SUPPORTED;
            }
            match offset_slot(gpu, info.clock_type) {
                Some((value, range)) => set_in_range(value, range, info.clock_offset_mhz),
                None => ReturnCode::INVALID_ARGUMENT,
            }
        })
    }

    fn device_get_gpc_clk_vf_offset(
        &self,
        device: DeviceHandle,
        offset: &mut i32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetGpcClkVfOffset, device, |gpu| {
            *offset = gpu.core_offset;
            ReturnCode::SUCCESS
        })
    }

    fn device_set_gpc_clk_vf_offset(&self, device: DeviceHandle, offset: i32) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceSetGpcClkVfOffset, device, |gpu| {
            let range = gpu.core_offset_range;
            set_in_range(&mut gpu.core_offset, range, offset)
        })
    }

    fn device_get_gpc_clk_min_max_vf_offset(
        &self,
        device: DeviceHandle,
        min: &mut i32,
        max: &mut i32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetGpcClkMinMaxVfOffset, device, |gpu| {
            (*min, *max) = gpu.core_offset_range;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_mem_clk_vf_offset(
        &self,
        device: DeviceHandle,
        offset: &mut i32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetMemClkVfOffset, device, |gpu| {
            *offset = gpu.mem_offset;
            ReturnCode::SUCCESS
        })
    }

    fn device_set_mem_clk_vf_offset(&self, device: DeviceHandle, offset: i32) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceSetMemClkVfOffset, device, |gpu| {
            let range = gpu.mem_offset_range;
            set_in_range(&mut gpu.mem_offset, range, offset)
        })
    }

    fn device_get_mem_clk_min_max_vf_offset(
        &self,
        device: DeviceHandle,
        min: &mut i32,
        max: &mut i32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetMemClkMinMaxVfOffset, device, |gpu| {
            (*min, *max) = gpu.mem_offset_range;
            ReturnCode::SUCCESS
        })
    }

    fn device_set_gpu_locked_clocks(
        &self,
        device: DeviceHandle,
        min_mhz: u32,
        max_mhz: u32,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceSetGpuLockedClocks, device, |gpu| {
            if min_mhz > max_mhz {
                return ReturnCode::INVALID_ARGUMENT;
            }
            gpu.locked_clocks = Some((min_mhz, max_mhz));
            ReturnCode::SUCCESS
        })
    }

    fn device_reset_gpu_locked_clocks(&self, device: DeviceHandle) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceResetGpuLockedClocks, device, |gpu| {
            gpu.locked_clocks = None;
            ReturnCode::SUCCESS
        })
    }

    fn device_get_supported_memory_clocks(
        &self,
        device: DeviceHandle,
        count: &mut u32,
        clocks: Option<&mut [u32]>,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetSupportedMemoryClocks, device, |gpu| {
            fill_table(&gpu.memory_clocks, count, clocks)
        })
    }

    fn device_get_supported_graphics_clocks(
        &self,
        device: DeviceHandle,
        memory_mhz: u32,
        count: &mut u32,
        clocks: Option<&mut [u32]>,
    ) -> Option<ReturnCode> {
        self.dispatch_device(Entry::DeviceGetSupportedGraphicsClocks, device, |gpu| {
            match gpu.graphics_clocks.get(&memory_mhz) {
                Some(table) => fill_table(table, count, clocks),
                None => ReturnCode::INVALID_ARGUMENT,
            }
        })
    }
}
