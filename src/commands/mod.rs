//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command. The
//! `run_*` entry points own the NVML session; the work itself is generic
//! over [`GpuManager`].

pub mod list;
pub mod profile;
pub mod status;
pub mod tune;

pub use list::run_list;
pub use profile::{run_apply, run_save};
pub use status::run_status;
pub use tune::{run_reset, run_set};

use crate::cli::output::Report;
use crate::config::GpuConfig;
use crate::error::{AppError, Result};
use crate::nvml::{GpuDevice, GpuManager};

/// Which devices a command acts on
///
/// A UUID wins over an index; neither means every device.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub index: Option<u32>,
    pub uuid: Option<String>,
}

impl Selector {
    pub fn from_config(gpu: &GpuConfig) -> Self {
        Self {
            index: gpu.index,
            uuid: gpu.uuid.clone(),
        }
    }

    /// Resolve the selection against the manager's devices
    pub fn select<'m, M: GpuManager>(&self, manager: &'m M) -> Result<Vec<M::Device<'m>>> {
        let devices = manager.devices()?;
        if devices.is_empty() {
            return Err(AppError::NoGpusFound);
        }

        let selected: Vec<_> = match (&self.uuid, self.index) {
            (Some(uuid), _) => devices
                .into_iter()
                .filter(|d| d.uuid() == uuid.as_str())
                .collect(),
            (None, Some(index)) => devices.into_iter().filter(|d| d.index() == index).collect(),
            (None, None) => devices,
        };

        if selected.is_empty() {
            return Err(AppError::GpuNotFound(self.describe()));
        }
        Ok(selected)
    }

    /// Indices of the selected devices
    pub fn indices<M: GpuManager>(&self, manager: &M) -> Result<Vec<u32>> {
        Ok(self.select(manager)?.iter().map(|d| d.index()).collect())
    }

    fn describe(&self) -> String {
        match (&self.uuid, self.index) {
            (Some(uuid), _) => format!("UUID {}", uuid),
            (None, Some(index)) => format!("index {}", index),
            (None, None) => "any".to_string(),
        }
    }
}

/// Turn per-device failures into a non-zero exit
pub(crate) fn check_reports(reports: &[Report]) -> Result<()> {
    let failed = reports
        .iter()
        .flat_map(|r| &r.results)
        .filter(|m| !m.success)
        .count();
    if failed > 0 {
        return Err(AppError::OperationsFailed(failed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::Message;
    use crate::domain::GpuInfo;
    use crate::mock::MockSymbols;
    use crate::nvml::NvmlManager;

    #[test]
    fn test_select_all() {
        let manager = NvmlManager::init_with(MockSymbols::with_gpus(3)).unwrap();
        assert_eq!(Selector::default().indices(&manager).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_select_by_index_and_uuid() {
        let manager = NvmlManager::init_with(MockSymbols::with_gpus(3)).unwrap();

        let by_index = Selector {
            index: Some(1),
            uuid: None,
        };
        assert_eq!(by_index.indices(&manager).unwrap(), vec![1]);

        let by_uuid = Selector {
            index: Some(0),
            uuid: Some("GPU-a1b2c3d4-0000-4000-8000-000000000002".to_string()),
        };
        assert_eq!(by_uuid.indices(&manager).unwrap(), vec![2]);
    }

    #[test]
    fn test_select_missing() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let selector = Selector {
            index: Some(4),
            uuid: None,
        };
        match selector.select(&manager) {
            Err(AppError::GpuNotFound(what)) => assert_eq!(what, "index 4"),
            other => panic!("unexpected: {:?}", other.map(|d| d.len())),
        }

        let empty = NvmlManager::init_with(MockSymbols::with_gpus(0)).unwrap();
        assert!(matches!(
            Selector::default().select(&empty),
            Err(AppError::NoGpusFound)
        ));
    }

    #[test]
    fn test_check_reports() {
        let report = |ok: bool| Report {
            gpu: GpuInfo::new(0, "GPU", "GPU-0"),
            results: vec![if ok { Message::ok("x") } else { Message::failed("x") }],
        };
        assert!(check_reports(&[report(true)]).is_ok());
        assert!(matches!(
            check_reports(&[report(true), report(false)]),
            Err(AppError::OperationsFailed(1))
        ));
    }
}
