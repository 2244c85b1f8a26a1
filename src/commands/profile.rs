//! Save and apply command implementations
//!
//! Move tunable settings between the selected devices and the tuning store.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, Message, Report};
use crate::commands::{check_reports, Selector};
use crate::config::{Config, TuningStore};
use crate::domain::Tunable;
use crate::error::Result;
use crate::nvml::{GpuDevice, GpuManager, NvmlManager};
use crate::services::TuningService;

/// Execute the save command
pub fn run_save(config: &Config, format: OutputFormat) -> Result<()> {
    let mut store = TuningStore::load(config.general.store_path())?;
    let service = TuningService::new(config.general.dry_run);

    let manager = NvmlManager::init()?;
    let reports = save_settings(
        &manager,
        &Selector::from_config(&config.gpu),
        &service,
        &mut store,
    )?;
    for report in &reports {
        print_output(report, format)?;
    }
    manager.shutdown()?;

    if service.is_dry_run() {
        log::info!("DRY RUN: Would write {}", store.path().display());
    } else {
        store.save()?;
    }
    Ok(())
}

/// Execute the apply command
pub fn run_apply(config: &Config, format: OutputFormat) -> Result<()> {
    let store = TuningStore::load(config.general.store_path())?;
    let service = TuningService::new(config.general.dry_run);

    let manager = NvmlManager::init()?;
    let reports = apply_settings(
        &manager,
        &Selector::from_config(&config.gpu),
        &service,
        &store,
    )?;
    for report in &reports {
        print_output(report, format)?;
    }
    manager.shutdown()?;

    check_reports(&reports)
}

/// Capture each selected device's tunables into `store`
///
/// A stored clock lock survives when this session applied none, since a
/// lock set by an earlier invocation cannot be read back from the driver.
pub fn save_settings<M: GpuManager>(
    manager: &M,
    selector: &Selector,
    service: &TuningService,
    store: &mut TuningStore,
) -> Result<Vec<Report>> {
    let mut reports = Vec::new();

    for device in selector.select(manager)? {
        let mut settings = service.capture(&device);
        if settings.gpu_cl.is_none() {
            settings.gpu_cl = store.get(device.uuid()).and_then(|s| s.gpu_cl);
        }

        let results = Tunable::ALL
            .iter()
            .map(|&tunable| match settings.get(tunable) {
                Some(value) => Message::ok(format!(
                    "Saved {} = {}",
                    tunable,
                    tunable.format_value(tunable.from_user_units(value))
                )),
                None => Message::ok(format!("Skipped {} (not available)", tunable)),
            })
            .collect();

        store.set(device.uuid(), settings);
        reports.push(Report {
            gpu: device.info(),
            results,
        });
    }

    Ok(reports)
}

/// Apply stored settings to each selected device
///
/// Devices with no stored entry are left untouched.
pub fn apply_settings<M: GpuManager>(
    manager: &M,
    selector: &Selector,
    service: &TuningService,
    store: &TuningStore,
) -> Result<Vec<Report>> {
    let mut reports = Vec::new();

    for mut device in selector.select(manager)? {
        let results = match store.get(device.uuid()) {
            Some(settings) => service
                .apply_settings(&mut device, settings)
                .into_iter()
                .map(|(tunable, result)| match result {
                    Ok(change) => Message::ok(change.to_string()),
                    Err(e) => Message::failed(format!("{}: {}", tunable, e)),
                })
                .collect(),
            None => {
                log::info!("GPU {}: no saved settings", device.index());
                Vec::new()
            }
        };

        reports.push(Report {
            gpu: device.info(),
            results,
        });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpuSettings;
    use crate::mock::MockSymbols;
    use crate::nvml::{Entry, ReturnCode};

    const UUID0: &str = "GPU-a1b2c3d4-0000-4000-8000-000000000000";
    const UUID1: &str = "GPU-a1b2c3d4-0000-4000-8000-000000000001";

    fn store() -> (tempfile::TempDir, TuningStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TuningStore::new(dir.path().join("settings.json"));
        (dir, store)
    }

    #[test]
    fn test_save_captures_current_values() {
        let symbols = MockSymbols::new().configure(0, |gpu| {
            gpu.power_limit = 380_000;
            gpu.mem_offset = 1200;
        });
        let manager = NvmlManager::init_with(symbols).unwrap();
        let (_dir, mut store) = store();

        let reports = save_settings(
            &manager,
            &Selector::default(),
            &TuningService::new(false),
            &mut store,
        )
        .unwrap();

        assert!(reports[0].all_succeeded());
        let saved = store.get(UUID0).unwrap();
        assert_eq!(saved.pl, Some(380));
        assert_eq!(saved.gpu_co, Some(0));
        assert_eq!(saved.mem_co, Some(1200));
        assert_eq!(saved.gpu_cl, None);
    }

    #[test]
    fn test_save_keeps_stored_lock() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let (_dir, mut store) = store();
        store.set(
            UUID0,
            GpuSettings {
                gpu_cl: Some(2400),
                ..Default::default()
            },
        );

        save_settings(
            &manager,
            &Selector::default(),
            &TuningService::new(false),
            &mut store,
        )
        .unwrap();
        assert_eq!(store.get(UUID0).unwrap().gpu_cl, Some(2400));
        assert_eq!(store.get(UUID0).unwrap().pl, Some(450));
    }

    #[test]
    fn test_apply_by_uuid() {
        let manager = NvmlManager::init_with(MockSymbols::with_gpus(2)).unwrap();
        let (_dir, mut store) = store();
        store.set(
            UUID1,
            GpuSettings {
                pl: Some(300),
                gpu_co: Some(-100),
                mem_co: Some(500),
                gpu_cl: Some(2400),
            },
        );

        let reports = apply_settings(
            &manager,
            &Selector::default(),
            &TuningService::new(false),
            &store,
        )
        .unwrap();

        assert!(reports[0].results.is_empty());
        assert_eq!(reports[1].results.len(), 4);
        assert!(reports[1].all_succeeded());

        let symbols = manager.symbols();
        assert_eq!(symbols.gpu(0).unwrap().power_limit, 450_000);
        let gpu = symbols.gpu(1).unwrap();
        assert_eq!(gpu.power_limit, 300_000);
        assert_eq!(gpu.core_offset, -100);
        assert_eq!(gpu.mem_offset, 500);
        assert_eq!(gpu.locked_clocks, Some((0, 2400)));
    }

    #[test]
    fn test_apply_continues_after_failure() {
        let symbols =
            MockSymbols::new().failing(Entry::DeviceSetPowerManagementLimit, ReturnCode::NO_PERMISSION);
        let manager = NvmlManager::init_with(symbols).unwrap();
        let (_dir, mut store) = store();
        store.set(
            UUID0,
            GpuSettings {
                pl: Some(300),
                gpu_co: Some(50),
                ..Default::default()
            },
        );

        let reports = apply_settings(
            &manager,
            &Selector::default(),
            &TuningService::new(false),
            &store,
        )
        .unwrap();

        let results = &reports[0].results;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[0].message.starts_with("power limit:"));
        assert!(results[1].success);
        assert_eq!(manager.symbols().gpu(0).unwrap().core_offset, 50);
        assert!(check_reports(&reports).is_err());
    }

    #[test]
    fn test_apply_stored_zero_lock_unlocks() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let (_dir, mut store) = store();
        store.set(
            UUID0,
            GpuSettings {
                gpu_cl: Some(0),
                ..Default::default()
            },
        );

        let reports = apply_settings(
            &manager,
            &Selector::default(),
            &TuningService::new(false),
            &store,
        )
        .unwrap();
        assert_eq!(reports[0].results[0].message, "Reset core clock lock");
        assert!(manager
            .symbols()
            .called(Entry::DeviceResetGpuLockedClocks));
    }
}
