//! NVML abstraction layer
//!
//! The library is loaded at runtime and every entry point is optional; the
//! device layer falls back across driver API generations where it can.

pub mod clocks;
pub mod device;
pub mod ffi;
pub mod manager;
pub mod offsets;
pub mod status;
pub mod symbols;
pub mod traits;

pub use clocks::LimitStrategy;
pub use device::{ClockLocks, NvmlDevice};
pub use manager::NvmlManager;
pub use offsets::{OffsetApi, OffsetDomain};
pub use status::ReturnCode;
pub use symbols::{Entry, NvmlSymbols, RawSymbols};
pub use traits::{GpuDevice, GpuManager};
