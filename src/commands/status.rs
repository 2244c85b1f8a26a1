//! Status command implementation
//!
//! Prints telemetry and tunable state once, or keeps polling with `--watch`.

use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::output::{print_output, StatusReport};
use crate::commands::Selector;
use crate::config::Config;
use crate::domain::ManagerInfo;
use crate::error::Result;
use crate::nvml::{GpuManager, NvmlManager};
use crate::services::{Monitor, MonitorConfig};

use std::ops::ControlFlow;

/// Execute the status command
pub fn run_status(args: &StatusArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let manager = NvmlManager::init()?;
    let monitor = Monitor::new(MonitorConfig {
        interval: config.general.interval(),
        single_shot: !args.watch,
    });

    let info = ManagerInfo::capture(&manager);
    let selection = Selector::from_config(&config.gpu).indices(&manager)?;

    if monitor.config().single_shot {
        let report = status_report(&monitor, &manager, &info, &selection)?;
        print_output(&report, format)?;
    } else {
        monitor.run(
            &manager,
            &selection,
            |snapshots| {
                let report = StatusReport {
                    manager: info.clone(),
                    devices: snapshots.to_vec(),
                };
                print_output(&report, format)?;
                if format == OutputFormat::Table {
                    println!();
                }
                Ok(ControlFlow::Continue(()))
            },
            |e| {
                eprintln!("Poll failed: {}", e);
                ControlFlow::Continue(())
            },
        )?;
    }

    manager.shutdown()?;
    Ok(())
}

/// One poll of the selected devices
pub fn status_report<M: GpuManager>(
    monitor: &Monitor,
    manager: &M,
    info: &ManagerInfo,
    selection: &[u32],
) -> Result<StatusReport> {
    Ok(StatusReport {
        manager: info.clone(),
        devices: monitor.poll(manager, selection)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::TableDisplay;
    use crate::mock::MockSymbols;

    #[test]
    fn test_status_report() {
        let manager = NvmlManager::init_with(MockSymbols::with_gpus(2)).unwrap();
        let info = ManagerInfo::capture(&manager);
        let monitor = Monitor::new(MonitorConfig::default());

        let report = status_report(&monitor, &manager, &info, &[1]).unwrap();
        assert_eq!(report.devices.len(), 1);
        assert_eq!(report.devices[0].gpu.index, 1);

        let compact = report.to_compact();
        assert!(compact.starts_with("1["));
        assert_eq!(compact.lines().count(), 1);
    }
}
