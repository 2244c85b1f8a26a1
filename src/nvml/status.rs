//! NVML return codes and their translation
//!
//! Every failing library call goes through [`check`], which turns the raw
//! status into an [`NvmlError`] carrying the library's own description.

use crate::error::NvmlError;
use crate::nvml::symbols::{Entry, NvmlSymbols};

use nvml_wrapper_sys::bindings::{nvmlReturn_enum, nvmlReturn_enum_NVML_SUCCESS};
use std::fmt;

/// Raw nvmlReturn_t value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub nvmlReturn_enum);

impl ReturnCode {
    pub const SUCCESS: Self = Self(nvmlReturn_enum_NVML_SUCCESS);
    pub const UNINITIALIZED: Self = Self(1);
    pub const INVALID_ARGUMENT: Self = Self(2);
    pub const NOT_SUPPORTED: Self = Self(3);
    pub const NO_PERMISSION: Self = Self(4);
    pub const ALREADY_INITIALIZED: Self = Self(5);
    pub const NOT_FOUND: Self = Self(6);
    pub const INSUFFICIENT_SIZE: Self = Self(7);
    pub const INSUFFICIENT_POWER: Self = Self(8);
    pub const DRIVER_NOT_LOADED: Self = Self(9);
    pub const TIMEOUT: Self = Self(10);
    pub const IRQ_ISSUE: Self = Self(11);
    pub const LIBRARY_NOT_FOUND: Self = Self(12);
    pub const FUNCTION_NOT_FOUND: Self = Self(13);
    pub const CORRUPTED_INFOROM: Self = Self(14);
    pub const GPU_IS_LOST: Self = Self(15);
    pub const RESET_REQUIRED: Self = Self(16);
    pub const OPERATING_SYSTEM: Self = Self(17);
    pub const LIB_RM_VERSION_MISMATCH: Self = Self(18);
    pub const IN_USE: Self = Self(19);
    pub const MEMORY: Self = Self(20);
    pub const NO_DATA: Self = Self(21);
    pub const VGPU_ECC_NOT_SUPPORTED: Self = Self(22);
    pub const INSUFFICIENT_RESOURCES: Self = Self(23);
    pub const FREQ_NOT_SUPPORTED: Self = Self(24);
    pub const ARGUMENT_VERSION_MISMATCH: Self = Self(25);
    pub const DEPRECATED: Self = Self(26);
    pub const NOT_READY: Self = Self(27);
    pub const GPU_NOT_FOUND: Self = Self(28);
    pub const INVALID_STATE: Self = Self(29);
    pub const RESET_TYPE_NOT_SUPPORTED: Self = Self(30);
    pub const UNKNOWN: Self = Self(999);

    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// The driver does not implement this call for this GPU
    #[inline]
    pub fn is_unsupported(self) -> bool {
        self == Self::NOT_SUPPORTED || self == Self::FUNCTION_NOT_FOUND
    }

    /// Text matching what `nvmlErrorString` returns for known codes
    pub fn description(self) -> Option<&'static str> {
        let text = match self.0 {
            0 => "Success",
            1 => "Uninitialized",
            2 => "Invalid Argument",
            3 => "Not Supported",
            4 => "Insufficient Permissions",
            5 => "Already Initialized",
            6 => "Not Found",
            7 => "Insufficient Size",
            8 => "Insufficient External Power",
            9 => "Driver Not Loaded",
            10 => "Timeout",
            11 => "Interrupt Request Issue",
            12 => "NVML Shared Library Not Found",
            13 => "Function Not Found",
            14 => "Corrupted infoROM",
            15 => "GPU is lost",
            16 => "GPU requires restart",
            17 => "The operating system has blocked the request.",
            18 => "RM has detected an NVML/RM version mismatch.",
            19 => "In use by another client",
            20 => "Insufficient Memory",
            21 => "No data",
            22 => "The requested vgpu operation is not available on target device, because ECC is enabled",
            23 => "Ran out of critical resources, other than memory",
            24 => "The requested frequency is not supported",
            25 => "The provided version is invalid/unsupported",
            26 => "The requested functionality has been deprecated",
            27 => "The system is not ready for the request",
            28 => "No GPUs were found",
            29 => "Resource not in correct state to perform requested operation",
            30 => "Reset type not supported",
            999 => "Unknown Error",
            _ => return None,
        };
        Some(text)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable text for a return code
///
/// Uses `nvmlErrorString` when the driver exports it, otherwise formats the
/// raw number.
pub fn describe<S: NvmlSymbols + ?Sized>(symbols: &S, code: ReturnCode) -> String {
    match symbols.error_string(code) {
        Some(text) if !text.is_empty() => text,
        Some(_) => "Unknown NVML Error".to_string(),
        None => format!("NVML Error {}", code),
    }
}

/// Translate a failing code into the error taxonomy
pub fn translate<S: NvmlSymbols + ?Sized>(symbols: &S, code: ReturnCode) -> NvmlError {
    let message = describe(symbols, code);
    match code {
        c if c.is_unsupported() => NvmlError::NotSupported(message),
        ReturnCode::NO_PERMISSION => NvmlError::InsufficientPermissions(message),
        ReturnCode::GPU_IS_LOST => NvmlError::GpuLost,
        ReturnCode::INVALID_ARGUMENT => NvmlError::InvalidArgument(message),
        _ => NvmlError::Driver(message),
    }
}

/// Turn the outcome of a symbol-table call into a `Result`
///
/// `None` means the entry point is not bound in this driver.
pub fn check<S: NvmlSymbols + ?Sized>(
    symbols: &S,
    entry: Entry,
    ret: Option<ReturnCode>,
) -> Result<(), NvmlError> {
    match ret {
        None => Err(unbound(entry)),
        Some(code) if code.is_success() => Ok(()),
        Some(code) => Err(translate(symbols, code)),
    }
}

/// Error for an entry point the installed driver does not export
pub fn unbound(entry: Entry) -> NvmlError {
    NvmlError::NotSupported(format!("{} is not available in this driver", entry.symbol()))
}

/// Whether a call outcome should trigger a fallback path
pub fn wants_fallback(ret: Option<ReturnCode>) -> bool {
    ret.map_or(true, ReturnCode::is_unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSymbols;

    #[test]
    fn test_describe_uses_library_string() {
        let symbols = MockSymbols::new();
        assert_eq!(describe(&symbols, ReturnCode::NOT_SUPPORTED), "Not Supported");
        assert_eq!(describe(&symbols, ReturnCode::GPU_IS_LOST), "GPU is lost");
    }

    #[test]
    fn test_describe_without_error_string() {
        let symbols = MockSymbols::new().without(Entry::ErrorString);
        assert_eq!(describe(&symbols, ReturnCode::NO_PERMISSION), "NVML Error 4");
    }

    #[test]
    fn test_every_known_code_has_description() {
        for code in (0..=30).chain(std::iter::once(999)) {
            assert!(ReturnCode(code).description().is_some(), "code {}", code);
        }
        assert!(ReturnCode(31).description().is_none());
    }

    #[test]
    fn test_translate_taxonomy() {
        let symbols = MockSymbols::new();
        assert!(matches!(
            translate(&symbols, ReturnCode::NOT_SUPPORTED),
            NvmlError::NotSupported(_)
        ));
        assert!(matches!(
            translate(&symbols, ReturnCode::FUNCTION_NOT_FOUND),
            NvmlError::NotSupported(_)
        ));
        assert!(matches!(
            translate(&symbols, ReturnCode::NO_PERMISSION),
            NvmlError::InsufficientPermissions(_)
        ));
        assert_eq!(translate(&symbols, ReturnCode::GPU_IS_LOST), NvmlError::GpuLost);
        assert_eq!(
            translate(&symbols, ReturnCode::TIMEOUT),
            NvmlError::Driver("Timeout".to_string())
        );
    }

    #[test]
    fn test_check_unbound_is_not_supported() {
        let symbols = MockSymbols::new();
        let err = check(&symbols, Entry::DeviceGetPowerUsage, None).unwrap_err();
        assert!(err.is_not_supported());
        assert!(err.to_string().contains("nvmlDeviceGetPowerUsage"));
        assert!(check(&symbols, Entry::DeviceGetPowerUsage, Some(ReturnCode::SUCCESS)).is_ok());
    }

    #[test]
    fn test_wants_fallback() {
        assert!(wants_fallback(None));
        assert!(wants_fallback(Some(ReturnCode::NOT_SUPPORTED)));
        assert!(!wants_fallback(Some(ReturnCode::SUCCESS)));
        assert!(!wants_fallback(Some(ReturnCode::NO_PERMISSION)));
    }
}
