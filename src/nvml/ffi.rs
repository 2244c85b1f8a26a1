//! C-layout NVML structures and constants
//!
//! Only what the symbol table passes across the FFI boundary lives here.
//! Structures follow `nvml.h`; versioned structures carry their
//! `NVML_STRUCT_VERSION` tag in the first field.

use nvml_wrapper_sys::bindings::nvmlDevice_t;
use std::os::raw::{c_int, c_uint, c_ulong, c_ulonglong};

pub const SYSTEM_DRIVER_VERSION_BUFFER_SIZE: usize = 80;
pub const SYSTEM_NVML_VERSION_BUFFER_SIZE: usize = 80;
pub const DEVICE_UUID_BUFFER_SIZE: usize = 80;
pub const DEVICE_NAME_BUFFER_SIZE: usize = 64;

/// NVML_STRUCT_VERSION(size, ver)
pub const fn struct_version(size: usize, version: u32) -> u32 {
    size as u32 | (version << 24)
}

/// Opaque device handle owned by the library
///
/// Only valid while the library handle that produced it is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle(nvmlDevice_t);

impl DeviceHandle {
    /// Wrap a raw handle
    pub fn from_raw(raw: nvmlDevice_t) -> Self {
        Self(raw)
    }

    /// A null handle, used as the out-parameter seed
    pub fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub fn as_raw(&self) -> nvmlDevice_t {
        self.0
    }
}

// SAFETY: NVML device handles are opaque tokens; the library serializes
// access to the underlying GPU and its API is documented as thread-safe.
unsafe impl Send for DeviceHandle {}
unsafe impl Sync for DeviceHandle {}

/// nvmlClockType_t
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ClockDomain {
    Graphics = 0,
    Sm = 1,
    Memory = 2,
    Video = 3,
}

/// nvmlSamplingType_t: NVML_TOTAL_POWER_SAMPLES
pub const TOTAL_POWER_SAMPLES: c_int = 0;

/// nvmlTemperatureSensors_t: NVML_TEMPERATURE_GPU
pub const TEMPERATURE_GPU: c_int = 0;

/// nvmlPstates_t: NVML_PSTATE_0
pub const PSTATE_0: c_int = 0;

/// nvmlUtilization_t
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawUtilization {
    pub gpu: c_uint,
    pub memory: c_uint,
}

/// nvmlMemory_t
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMemory {
    pub total: c_ulonglong,
    pub free: c_ulonglong,
    pub used: c_ulonglong,
}

/// nvmlClockOffset_v1_t
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawClockOffset {
    pub version: c_uint,
    pub clock_type: c_int,
    pub pstate: c_int,
    pub clock_offset_mhz: c_int,
    pub min_clock_offset_mhz: c_int,
    pub max_clock_offset_mhz: c_int,
}

pub const CLOCK_OFFSET_VERSION: u32 = struct_version(std::mem::size_of::<RawClockOffset>(), 1);

impl RawClockOffset {
    /// Request for the P0 offset of a clock domain
    pub fn request(domain: ClockDomain) -> Self {
        Self {
            version: CLOCK_OFFSET_VERSION,
            clock_type: domain as c_int,
            pstate: PSTATE_0,
            ..Self::default()
        }
    }
}

/// nvmlFanSpeedInfo_v1_t
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFanSpeedInfo {
    pub version: c_uint,
    pub fan: c_uint,
    pub speed: c_uint,
}

pub const FAN_SPEED_INFO_VERSION: u32 =
    struct_version(std::mem::size_of::<RawFanSpeedInfo>(), 1);

/// nvmlTemperature_v1_t
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawTemperature {
    pub version: c_uint,
    pub sensor_type: c_int,
    pub temperature: c_int,
}

pub const TEMPERATURE_VERSION: u32 = struct_version(std::mem::size_of::<RawTemperature>(), 1);

/// nvmlSample_t, with the nvmlValue_t union kept as raw bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub timestamp: c_ulonglong,
    pub value: [u8; 8],
}

/// nvmlValueType_t
pub mod value_type {
    use std::os::raw::c_int;

    pub const DOUBLE: c_int = 0;
    pub const UNSIGNED_INT: c_int = 1;
    pub const UNSIGNED_LONG: c_int = 2;
    pub const UNSIGNED_LONG_LONG: c_int = 3;
    pub const SIGNED_LONG_LONG: c_int = 4;
    pub const SIGNED_INT: c_int = 5;
    pub const UNSIGNED_SHORT: c_int = 6;
}

/// A decoded nvmlValue_t
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Double(f64),
    UnsignedInt(u32),
    UnsignedLong(u64),
    UnsignedLongLong(u64),
    SignedLongLong(i64),
    SignedInt(i32),
    UnsignedShort(u16),
}

impl SampleValue {
    /// Decode the union according to its reported tag
    ///
    /// Unrecognized tags are read as an unsigned 32-bit value.
    pub fn decode(tag: c_int, bytes: [u8; 8]) -> Self {
        let lo = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match tag {
            value_type::DOUBLE => Self::Double(f64::from_ne_bytes(bytes)),
            value_type::UNSIGNED_LONG => Self::UnsignedLong(read_ulong(bytes)),
            value_type::UNSIGNED_LONG_LONG => Self::UnsignedLongLong(u64::from_ne_bytes(bytes)),
            value_type::SIGNED_LONG_LONG => Self::SignedLongLong(i64::from_ne_bytes(bytes)),
            value_type::SIGNED_INT => Self::SignedInt(i32::from_ne_bytes(lo)),
            value_type::UNSIGNED_SHORT => Self::UnsignedShort(u16::from_ne_bytes([bytes[0], bytes[1]])),
            value_type::UNSIGNED_INT => Self::UnsignedInt(u32::from_ne_bytes(lo)),
            _ => Self::UnsignedInt(u32::from_ne_bytes(lo)),
        }
    }

    /// Numeric value, truncated toward zero and clamped at 0
    pub fn as_u64(&self) -> u64 {
        match *self {
            Self::Double(v) => {
                if v.is_finite() && v > 0.0 {
                    v as u64
                } else {
                    0
                }
            }
            Self::UnsignedInt(v) => v as u64,
            Self::UnsignedLong(v) | Self::UnsignedLongLong(v) => v,
            Self::SignedLongLong(v) => v.max(0) as u64,
            Self::SignedInt(v) => v.max(0) as u64,
            Self::UnsignedShort(v) => v as u64,
        }
    }
}

/// C `unsigned long` is 32 bits on Windows and 64 bits elsewhere
fn read_ulong(bytes: [u8; 8]) -> u64 {
    const WIDTH: usize = std::mem::size_of::<c_ulong>();
    let mut raw = [0u8; WIDTH];
    raw.copy_from_slice(&bytes[..WIDTH]);
    u64::from(c_ulong::from_ne_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_versions() {
        assert_eq!(std::mem::size_of::<RawClockOffset>(), 24);
        assert_eq!(CLOCK_OFFSET_VERSION, 24 | (1 << 24));
        assert_eq!(FAN_SPEED_INFO_VERSION, 12 | (1 << 24));
        assert_eq!(TEMPERATURE_VERSION, 12 | (1 << 24));
    }

    #[test]
    fn test_sample_layout() {
        assert_eq!(std::mem::size_of::<RawSample>(), 16);
    }

    #[test]
    fn test_decode_tagged_values() {
        let v = SampleValue::decode(value_type::UNSIGNED_INT, {
            let mut b = [0u8; 8];
            b[..4].copy_from_slice(&150_000u32.to_ne_bytes());
            b
        });
        assert_eq!(v, SampleValue::UnsignedInt(150_000));
        assert_eq!(v.as_u64(), 150_000);

        let v = SampleValue::decode(value_type::DOUBLE, 212_500.75f64.to_ne_bytes());
        assert_eq!(v.as_u64(), 212_500);

        let v = SampleValue::decode(value_type::SIGNED_LONG_LONG, (-5i64).to_ne_bytes());
        assert_eq!(v.as_u64(), 0);

        let v = SampleValue::decode(value_type::UNSIGNED_LONG_LONG, 9_000_000_000u64.to_ne_bytes());
        assert_eq!(v.as_u64(), 9_000_000_000);
    }

    #[test]
    fn test_decode_unsigned_long_uses_platform_width() {
        const WIDTH: usize = std::mem::size_of::<c_ulong>();
        let value: c_ulong = 123_456;
        let mut b = [0xffu8; 8];
        b[..WIDTH].copy_from_slice(&value.to_ne_bytes());
        assert_eq!(
            SampleValue::decode(value_type::UNSIGNED_LONG, b),
            SampleValue::UnsignedLong(123_456)
        );
    }

    #[test]
    fn test_decode_unknown_tag_reads_u32() {
        let mut b = [0xffu8; 8];
        b[..4].copy_from_slice(&42u32.to_ne_bytes());
        assert_eq!(SampleValue::decode(99, b), SampleValue::UnsignedInt(42));
    }
}
