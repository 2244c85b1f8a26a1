//! Lockable core-clock range discovery
//!
//! NVML has no query for the lockable range. The table scan reads the
//! supported memory clocks, then the supported graphics clocks at the lowest
//! and highest memory clock, and takes the outer extrema. When the table
//! entry points are missing, the range is estimated from the maximum
//! graphics clock minus the current core offset and flagged approximate.

use crate::domain::TunableRange;
use crate::error::NvmlError;
use crate::nvml::ffi::{ClockDomain, DeviceHandle};
use crate::nvml::offsets::{self, OffsetDomain};
use crate::nvml::status::{check, ReturnCode};
use crate::nvml::symbols::{Entry, NvmlSymbols};

use std::os::raw::c_int;

/// How the lockable range was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStrategy {
    /// Extrema of the supported-clock tables
    TableScan,
    /// Max graphics clock minus current core offset
    MaxClockEstimate,
}

impl LimitStrategy {
    /// Prefer the table scan; estimate only when the tables are unbound
    pub fn select<S: NvmlSymbols + ?Sized>(symbols: &S) -> Self {
        if symbols.is_bound(Entry::DeviceGetSupportedMemoryClocks)
            && symbols.is_bound(Entry::DeviceGetSupportedGraphicsClocks)
        {
            LimitStrategy::TableScan
        } else {
            LimitStrategy::MaxClockEstimate
        }
    }
}

/// Lockable core-clock range using the best available strategy
pub fn discover<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
) -> Result<TunableRange, NvmlError> {
    match LimitStrategy::select(symbols) {
        LimitStrategy::TableScan => scan_tables(symbols, device),
        LimitStrategy::MaxClockEstimate => {
            log::debug!("Supported-clock tables unavailable, estimating lock range");
            estimate_from_max_clock(symbols, device)
        }
    }
}

/// Table-scan strategy
pub fn scan_tables<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
) -> Result<TunableRange, NvmlError> {
    let memory = supported_memory_clocks(symbols, device)?;
    let (min_mem, max_mem) = match (memory.iter().min(), memory.iter().max()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => return Err(NvmlError::EmptyClockTable("memory")),
    };

    let low = supported_graphics_clocks(symbols, device, min_mem)?;
    let high = supported_graphics_clocks(symbols, device, max_mem)?;
    let min = low
        .iter()
        .min()
        .copied()
        .ok_or(NvmlError::EmptyClockTable("graphics"))?;
    let max = high
        .iter()
        .max()
        .copied()
        .ok_or(NvmlError::EmptyClockTable("graphics"))?;

    if min > max {
        return Err(NvmlError::Driver(format!(
            "Inconsistent clock tables: lowest core clock {} MHz exceeds highest {} MHz",
            min, max
        )));
    }

    log::debug!(
        "Lockable core range {}-{} MHz (memory clocks {}-{} MHz)",
        min,
        max,
        min_mem,
        max_mem
    );
    Ok(TunableRange::new(min as i64, max as i64))
}

/// Max-clock estimate strategy
///
/// A core offset the driver cannot report counts as zero.
pub fn estimate_from_max_clock<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
) -> Result<TunableRange, NvmlError> {
    let mut max_mhz = 0;
    let ret = symbols.device_get_max_clock_info(device, ClockDomain::Graphics as c_int, &mut max_mhz);
    check(symbols, Entry::DeviceGetMaxClockInfo, ret)?;

    let offset = match offsets::get(symbols, device, OffsetDomain::Core) {
        Ok((mhz, _)) => mhz,
        Err(e) if e.is_not_supported() => 0,
        Err(e) => return Err(e),
    };

    let ceiling = (max_mhz as i64 - offset as i64).max(0);
    Ok(TunableRange::approximate(0, ceiling))
}

/// Supported memory clocks in MHz
pub fn supported_memory_clocks<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
) -> Result<Vec<u32>, NvmlError> {
    read_table(symbols, Entry::DeviceGetSupportedMemoryClocks, |count, buf| {
        symbols.device_get_supported_memory_clocks(device, count, buf)
    })
}

/// Supported graphics clocks in MHz at one memory clock
pub fn supported_graphics_clocks<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
    memory_mhz: u32,
) -> Result<Vec<u32>, NvmlError> {
    read_table(symbols, Entry::DeviceGetSupportedGraphicsClocks, |count, buf| {
        symbols.device_get_supported_graphics_clocks(device, memory_mhz, count, buf)
    })
}

/// Size query with no buffer, then fill
fn read_table<S, F>(symbols: &S, entry: Entry, mut call: F) -> Result<Vec<u32>, NvmlError>
where
    S: NvmlSymbols + ?Sized,
    F: FnMut(&mut u32, Option<&mut [u32]>) -> Option<ReturnCode>,
{
    let mut count = 0;
    match call(&mut count, None) {
        Some(code) if code == ReturnCode::INSUFFICIENT_SIZE => {}
        other => check(symbols, entry, other)?,
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut table = vec![0u32; count as usize];
    let ret = call(&mut count, Some(table.as_mut_slice()));
    check(symbols, entry, ret)?;
    table.truncate(count as usize);
    Ok(table)
}
