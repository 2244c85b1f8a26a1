//! Clock offset access across API generations
//!
//! Newer drivers expose one structured call per direction
//! (`nvmlDeviceGet/SetClockOffsets`); older ones expose scalar calls per
//! clock domain. Get, set and range discovery each pick their path
//! independently on every call: the structured path when it is bound and
//! supported, the legacy path otherwise.

use crate::error::NvmlError;
use crate::nvml::ffi::{ClockDomain, DeviceHandle, RawClockOffset};
use crate::nvml::status::{check, wants_fallback, ReturnCode};
use crate::nvml::symbols::{Entry, NvmlSymbols};

use std::fmt;

/// Clock domain that accepts an offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetDomain {
    Core,
    Memory,
}

impl OffsetDomain {
    fn clock_domain(self) -> ClockDomain {
        match self {
            OffsetDomain::Core => ClockDomain::Graphics,
            OffsetDomain::Memory => ClockDomain::Memory,
        }
    }

    fn legacy_get(self) -> Entry {
        match self {
            OffsetDomain::Core => Entry::DeviceGetGpcClkVfOffset,
            OffsetDomain::Memory => Entry::DeviceGetMemClkVfOffset,
        }
    }

    fn legacy_set(self) -> Entry {
        match self {
            OffsetDomain::Core => Entry::DeviceSetGpcClkVfOffset,
            OffsetDomain::Memory => Entry::DeviceSetMemClkVfOffset,
        }
    }

    fn legacy_range(self) -> Entry {
        match self {
            OffsetDomain::Core => Entry::DeviceGetGpcClkMinMaxVfOffset,
            OffsetDomain::Memory => Entry::DeviceGetMemClkMinMaxVfOffset,
        }
    }
}

impl fmt::Display for OffsetDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetDomain::Core => f.write_str("core"),
            OffsetDomain::Memory => f.write_str("memory"),
        }
    }
}

/// Which API generation served a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetApi {
    /// `nvmlClockOffset_t` request, P0 scoped
    Structured,
    /// Per-domain scalar VF offset calls
    Legacy,
}

/// Offset bounds as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetBounds {
    pub min: i32,
    pub max: i32,
    pub api: OffsetApi,
}

fn structured_read<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
    domain: OffsetDomain,
) -> (Option<ReturnCode>, RawClockOffset) {
    let mut info = RawClockOffset::request(domain.clock_domain());
    let ret = symbols.device_get_clock_offsets(device, &mut info);
    (ret, info)
}

/// Current offset in MHz
pub fn get<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
    domain: OffsetDomain,
) -> Result<(i32, OffsetApi), NvmlError> {
    let (ret, info) = structured_read(symbols, device, domain);
    if !wants_fallback(ret) {
        check(symbols, Entry::DeviceGetClockOffsets, ret)?;
        return Ok((info.clock_offset_mhz, OffsetApi::Structured));
    }

    log::debug!("{} offset read: using legacy VF offset API", domain);
    let mut offset = 0;
    let ret = match domain {
        OffsetDomain::Core => symbols.device_get_gpc_clk_vf_offset(device, &mut offset),
        OffsetDomain::Memory => symbols.device_get_mem_clk_vf_offset(device, &mut offset),
    };
    check(symbols, domain.legacy_get(), ret)?;
    Ok((offset, OffsetApi::Legacy))
}

/// Apply an offset in MHz
pub fn set<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
    domain: OffsetDomain,
    mhz: i32,
) -> Result<OffsetApi, NvmlError> {
    let mut info = RawClockOffset::request(domain.clock_domain());
    info.clock_offset_mhz = mhz;
    let ret = symbols.device_set_clock_offsets(device, &mut info);
    if !wants_fallback(ret) {
        check(symbols, Entry::DeviceSetClockOffsets, ret)?;
        return Ok(OffsetApi::Structured);
    }

    log::debug!("{} offset write: using legacy VF offset API", domain);
    let ret = match domain {
        OffsetDomain::Core => symbols.device_set_gpc_clk_vf_offset(device, mhz),
        OffsetDomain::Memory => symbols.device_set_mem_clk_vf_offset(device, mhz),
    };
    check(symbols, domain.legacy_set(), ret)?;
    Ok(OffsetApi::Legacy)
}

/// Legal offset bounds in MHz
pub fn range<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    device: DeviceHandle,
    domain: OffsetDomain,
) -> Result<OffsetBounds, NvmlError> {
    let (ret, info) = structured_read(symbols, device, domain);
    if !wants_fallback(ret) {
        check(symbols, Entry::DeviceGetClockOffsets, ret)?;
        return Ok(OffsetBounds {
            min: info.min_clock_offset_mhz,
            max: info.max_clock_offset_mhz,
            api: OffsetApi::Structured,
        });
    }

    log::debug!("{} offset range: using legacy VF offset API", domain);
    let (mut min, mut max) = (0, 0);
    let ret = match domain {
        OffsetDomain::Core => symbols.device_get_gpc_clk_min_max_vf_offset(device, &mut min, &mut max),
        OffsetDomain::Memory => {
            symbols.device_get_mem_clk_min_max_vf_offset(device, &mut min, &mut max)
        }
    };
    check(symbols, domain.legacy_range(), ret)?;
    Ok(OffsetBounds {
        min,
        max,
        api: OffsetApi::Legacy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSymbols;

    const STRUCTURED: [Entry; 2] = [Entry::DeviceGetClockOffsets, Entry::DeviceSetClockOffsets];

    fn handle() -> DeviceHandle {
        MockSymbols::handle(0)
    }

    #[test]
    fn test_structured_path_preferred() {
        let symbols = MockSymbols::new();
        set(&symbols, handle(), OffsetDomain::Core, 120).unwrap();
        assert_eq!(
            get(&symbols, handle(), OffsetDomain::Core).unwrap(),
            (120, OffsetApi::Structured)
        );
        assert!(!symbols.called(Entry::DeviceSetGpcClkVfOffset));
        assert!(!symbols.called(Entry::DeviceGetGpcClkVfOffset));
    }

    #[test]
    fn test_legacy_only_never_touches_structured() {
        let symbols = MockSymbols::new().without_all(&STRUCTURED);

        assert_eq!(
            set(&symbols, handle(), OffsetDomain::Core, 150).unwrap(),
            OffsetApi::Legacy
        );
        assert_eq!(
            get(&symbols, handle(), OffsetDomain::Core).unwrap(),
            (150, OffsetApi::Legacy)
        );
        let bounds = range(&symbols, handle(), OffsetDomain::Core).unwrap();
        assert_eq!((bounds.min, bounds.max, bounds.api), (-1000, 1000, OffsetApi::Legacy));

        let calls = symbols.calls();
        assert!(calls.iter().all(|e| !STRUCTURED.contains(e)));
        assert!(calls.contains(&Entry::DeviceSetGpcClkVfOffset));
        assert!(calls.contains(&Entry::DeviceGetGpcClkMinMaxVfOffset));
    }

    #[test]
    fn test_fallback_on_not_supported_is_per_call() {
        // Structured get works but the structured setter is refused
        let symbols = MockSymbols::new()
            .failing(Entry::DeviceSetClockOffsets, ReturnCode::NOT_SUPPORTED);

        assert_eq!(
            set(&symbols, handle(), OffsetDomain::Memory, 800).unwrap(),
            OffsetApi::Legacy
        );
        assert_eq!(
            get(&symbols, handle(), OffsetDomain::Memory).unwrap(),
            (800, OffsetApi::Structured)
        );
    }

    #[test]
    fn test_structured_error_does_not_fall_back() {
        let symbols = MockSymbols::new()
            .failing(Entry::DeviceGetClockOffsets, ReturnCode::NO_PERMISSION);
        let err = get(&symbols, handle(), OffsetDomain::Core).unwrap_err();
        assert!(matches!(err, NvmlError::InsufficientPermissions(_)));
        assert!(!symbols.called(Entry::DeviceGetGpcClkVfOffset));
    }

    #[test]
    fn test_memory_range_structured() {
        let symbols = MockSymbols::new();
        let bounds = range(&symbols, handle(), OffsetDomain::Memory).unwrap();
        assert_eq!((bounds.min, bounds.max), (-2000, 3000));
        assert_eq!(bounds.api, OffsetApi::Structured);
    }

    #[test]
    fn test_no_path_bound() {
        let symbols = MockSymbols::new().without_all(&[
            Entry::DeviceGetClockOffsets,
            Entry::DeviceGetGpcClkVfOffset,
        ]);
        let err = get(&symbols, handle(), OffsetDomain::Core).unwrap_err();
        assert!(err.is_not_supported());
    }
}
