//! List command implementation
//!
//! Lists all detected NVIDIA GPUs.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, GpuList, GpuListEntry};
use crate::domain::ManagerInfo;
use crate::error::Result;
use crate::nvml::{GpuDevice, GpuManager, NvmlManager};

/// Execute the list command
pub fn run_list(format: OutputFormat) -> Result<()> {
    let manager = NvmlManager::init()?;
    let gpu_list = list_gpus(&manager)?;
    print_output(&gpu_list, format)?;
    manager.shutdown()?;
    Ok(())
}

/// Every device the manager can enumerate
pub fn list_gpus<M: GpuManager>(manager: &M) -> Result<GpuList> {
    let gpus = manager
        .devices()?
        .iter()
        .map(|device| GpuListEntry::from(&device.info()))
        .collect();

    Ok(GpuList {
        manager: ManagerInfo::capture(manager),
        gpus,
    })
}
