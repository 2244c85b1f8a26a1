//! Telemetry poll loop
//!
//! Captures snapshots of the selected devices at a fixed interval. A failed
//! poll is reported and the next tick retries.

use crate::domain::DeviceSnapshot;
use crate::error::AppError;
use crate::nvml::{GpuDevice, GpuManager};

use std::ops::ControlFlow;
use std::time::Duration;

/// Configuration for the monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between polls
    pub interval: Duration,
    /// Whether to exit after one poll
    pub single_shot: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            single_shot: false,
        }
    }
}

/// Snapshot poller
pub struct Monitor {
    config: MonitorConfig,
}

impl Monitor {
    /// Create a new monitor with the given configuration
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// Capture one snapshot per selected device
    ///
    /// An empty selection means every device.
    pub fn poll<M: GpuManager>(
        &self,
        manager: &M,
        selection: &[u32],
    ) -> Result<Vec<DeviceSnapshot>, AppError> {
        let snapshots: Vec<DeviceSnapshot> = manager
            .devices()?
            .iter()
            .filter(|d| selection.is_empty() || selection.contains(&d.index()))
            .map(DeviceSnapshot::capture)
            .collect();

        if snapshots.is_empty() {
            return Err(AppError::NoGpusFound);
        }
        Ok(snapshots)
    }

    /// Poll until `on_poll` breaks, or once in single-shot mode
    ///
    /// Poll errors go to `on_error`; only a break from either callback ends
    /// the loop.
    pub fn run<M, F, E>(
        &self,
        manager: &M,
        selection: &[u32],
        mut on_poll: F,
        mut on_error: E,
    ) -> Result<(), AppError>
    where
        M: GpuManager,
        F: FnMut(&[DeviceSnapshot]) -> Result<ControlFlow<()>, AppError>,
        E: FnMut(&AppError) -> ControlFlow<()>,
    {
        loop {
            let flow = match self.poll(manager, selection) {
                Ok(snapshots) => on_poll(&snapshots)?,
                Err(e) => {
                    log::debug!("Poll failed: {}", e);
                    on_error(&e)
                }
            };

            if flow.is_break() || self.config.single_shot {
                break;
            }

            std::thread::sleep(self.config.interval);
        }

        Ok(())
    }

    /// Get the monitor configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSymbols;
    use crate::nvml::{Entry, NvmlManager, ReturnCode};

    fn fast(single_shot: bool) -> Monitor {
        Monitor::new(MonitorConfig {
            interval: Duration::from_millis(1),
            single_shot,
        })
    }

    #[test]
    fn test_monitor_config_default() {
        let config = MonitorConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1));
        assert!(!config.single_shot);
    }

    #[test]
    fn test_poll_selection() {
        let manager = NvmlManager::init_with(MockSymbols::with_gpus(3)).unwrap();
        let monitor = fast(true);

        assert_eq!(monitor.poll(&manager, &[]).unwrap().len(), 3);

        let picked = monitor.poll(&manager, &[2]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].gpu.index, 2);

        assert!(matches!(
            monitor.poll(&manager, &[7]),
            Err(AppError::NoGpusFound)
        ));
    }

    #[test]
    fn test_single_shot_polls_once() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let mut polls = 0;
        fast(true)
            .run(
                &manager,
                &[],
                |_| {
                    polls += 1;
                    Ok(ControlFlow::Continue(()))
                },
                |_| ControlFlow::Break(()),
            )
            .unwrap();
        assert_eq!(polls, 1);
    }

    #[test]
    fn test_run_until_break() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let mut polls = 0;
        fast(false)
            .run(
                &manager,
                &[],
                |_| {
                    polls += 1;
                    Ok(if polls == 3 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    })
                },
                |_| ControlFlow::Break(()),
            )
            .unwrap();
        assert_eq!(polls, 3);
    }

    #[test]
    fn test_failed_poll_is_retried() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        manager
            .symbols()
            .set_failure(Entry::DeviceGetCount, ReturnCode::GPU_IS_LOST);

        let mut errors = 0;
        let mut polls = 0;
        fast(false)
            .run(
                &manager,
                &[],
                |_| {
                    polls += 1;
                    Ok(ControlFlow::Break(()))
                },
                |_| {
                    errors += 1;
                    if errors == 2 {
                        manager.symbols().clear_failure(Entry::DeviceGetCount);
                    }
                    ControlFlow::Continue(())
                },
            )
            .unwrap();

        assert_eq!(errors, 2);
        assert_eq!(polls, 1);
    }
}
