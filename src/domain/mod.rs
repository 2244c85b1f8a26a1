//! Domain models for nvtune
//!
//! Value types shared by the NVML layer, the services and the CLI.

pub mod fan;
pub mod gpu;
pub mod performance;
pub mod power;
pub mod snapshot;
pub mod thermal;
pub mod tuning;

pub use fan::FanReading;
pub use gpu::GpuInfo;
pub use performance::{ClockReading, ClockSpeed, MemoryInfo, ThrottleReasons, Utilization};
pub use power::Power;
pub use snapshot::{DeviceSnapshot, ManagerInfo, TunableReading};
pub use thermal::Temperature;
pub use tuning::{Tunable, TunableRange};
