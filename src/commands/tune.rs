//! Set and reset command implementations

use crate::cli::args::{OutputFormat, ResetArgs, SetArgs};
use crate::cli::output::{print_output, Message, Report};
use crate::commands::{check_reports, Selector};
use crate::config::{Config, TuningStore};
use crate::domain::Tunable;
use crate::error::Result;
use crate::nvml::{GpuDevice, GpuManager, NvmlManager};
use crate::services::{Action, Change, TuningService};

/// What to change on each selected device
#[derive(Debug, Clone, Copy)]
pub enum Request {
    /// Value in device units
    Set(Tunable, i64),
    Reset(Tunable),
}

/// Execute the set command
pub fn run_set(args: &SetArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let value = args.tunable.parse_value(&args.value)?;
    run_request(Request::Set(args.tunable, value), args.save, config, format)
}

/// Execute the reset command
pub fn run_reset(args: &ResetArgs, config: &Config, format: OutputFormat) -> Result<()> {
    run_request(Request::Reset(args.tunable), args.save, config, format)
}

fn run_request(request: Request, save: bool, config: &Config, format: OutputFormat) -> Result<()> {
    let mut store = if save {
        Some(TuningStore::load(config.general.store_path())?)
    } else {
        None
    };

    let manager = NvmlManager::init()?;
    let service = TuningService::new(config.general.dry_run);
    let reports = apply_request(
        &manager,
        &Selector::from_config(&config.gpu),
        &service,
        request,
        store.as_mut(),
    )?;

    for report in &reports {
        print_output(report, format)?;
    }
    manager.shutdown()?;

    if let Some(store) = &store {
        if !service.is_dry_run() {
            store.save()?;
        }
    }

    check_reports(&reports)
}

/// Apply `request` to every selected device
///
/// Successful changes are recorded in `store` when one is given; the caller
/// decides whether to persist it.
pub fn apply_request<M: GpuManager>(
    manager: &M,
    selector: &Selector,
    service: &TuningService,
    request: Request,
    mut store: Option<&mut TuningStore>,
) -> Result<Vec<Report>> {
    let mut reports = Vec::new();

    for mut device in selector.select(manager)? {
        let result = match request {
            Request::Set(tunable, value) => service.apply(&mut device, tunable, value),
            Request::Reset(tunable) => service.reset(&mut device, tunable),
        };

        let message = match result {
            Ok(change) => {
                if let Some(store) = store.as_deref_mut() {
                    record(store, device.uuid(), &change);
                }
                Message::ok(change.to_string())
            }
            Err(e) => Message::failed(e.to_string()),
        };

        reports.push(Report {
            gpu: device.info(),
            results: vec![message],
        });
    }

    Ok(reports)
}

fn record(store: &mut TuningStore, uuid: &str, change: &Change) {
    let mut settings = store.get(uuid).copied().unwrap_or_default();
    let value = match change.action {
        Action::Set(value) => Some(change.tunable.to_user_units(value)),
        Action::Reset => None,
    };
    settings.set(change.tunable, value);
    store.set(uuid, settings);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSymbols;

    const UUID0: &str = "GPU-a1b2c3d4-0000-4000-8000-000000000000";

    #[test]
    fn test_set_all_devices() {
        let manager = NvmlManager::init_with(MockSymbols::with_gpus(2)).unwrap();
        let reports = apply_request(
            &manager,
            &Selector::default(),
            &TuningService::new(false),
            Request::Set(Tunable::CoreOffset, 120),
            None,
        )
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.all_succeeded()));
        assert_eq!(manager.symbols().gpu(1).unwrap().core_offset, 120);
    }

    #[test]
    fn test_failure_is_reported_per_device() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let reports = apply_request(
            &manager,
            &Selector::default(),
            &TuningService::new(false),
            Request::Set(Tunable::PowerLimit, 1_000_000),
            None,
        )
        .unwrap();

        assert!(!reports[0].all_succeeded());
        assert!(reports[0].results[0].message.contains("valid range: 150 to 600"));
        assert!(check_reports(&reports).is_err());
    }

    #[test]
    fn test_set_records_in_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TuningStore::new(dir.path().join("settings.json"));
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        let service = TuningService::new(false);
        let selector = Selector::default();

        apply_request(
            &manager,
            &selector,
            &service,
            Request::Set(Tunable::PowerLimit, 320_000),
            Some(&mut store),
        )
        .unwrap();
        apply_request(
            &manager,
            &selector,
            &service,
            Request::Set(Tunable::CoreClockLock, 2400),
            Some(&mut store),
        )
        .unwrap();
        assert_eq!(store.get(UUID0).unwrap().pl, Some(320));
        assert_eq!(store.get(UUID0).unwrap().gpu_cl, Some(2400));

        apply_request(
            &manager,
            &selector,
            &service,
            Request::Reset(Tunable::CoreClockLock),
            Some(&mut store),
        )
        .unwrap();
        assert_eq!(store.get(UUID0).unwrap().gpu_cl, None);
        assert_eq!(store.get(UUID0).unwrap().pl, Some(320));
    }

    #[test]
    fn test_failed_change_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TuningStore::new(dir.path().join("settings.json"));
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();

        apply_request(
            &manager,
            &Selector::default(),
            &TuningService::new(false),
            Request::Set(Tunable::MemoryOffset, 9000),
            Some(&mut store),
        )
        .unwrap();
        assert!(store.get(UUID0).is_none());
    }
}
