//! Tunable control service
//!
//! Validates requested values against the device's legal range before
//! touching the hardware, honours dry-run, and moves settings between the
//! device and the tuning store.

use crate::config::GpuSettings;
use crate::domain::Tunable;
use crate::error::ServiceError;
use crate::nvml::GpuDevice;
use serde::Serialize;
use std::fmt;

/// What a request resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Value in device units
    Set(i64),
    Reset,
}

/// A resolved request and whether it reached the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Change {
    pub tunable: Tunable,
    pub action: Action,
    pub dry_run: bool,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "Would " } else { "" };
        match self.action {
            Action::Set(value) => write!(
                f,
                "{}{} {} to {}",
                prefix,
                if self.dry_run { "set" } else { "Set" },
                self.tunable,
                self.tunable.format_value(value)
            ),
            Action::Reset => write!(
                f,
                "{}{} {}",
                prefix,
                if self.dry_run { "reset" } else { "Reset" },
                self.tunable
            ),
        }
    }
}

/// Outcome of applying one stored field
pub type FieldResult = (Tunable, Result<Change, ServiceError>);

/// Service for reading and changing tunables
pub struct TuningService {
    dry_run: bool,
}

impl TuningService {
    /// Create a new tuning service
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Check if in dry-run mode
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Resolve a request without applying it
    ///
    /// A clock lock at or below zero, or at or above the discovered maximum,
    /// resolves to a reset. Any other value must lie inside the range.
    pub fn plan<D: GpuDevice>(
        &self,
        device: &D,
        tunable: Tunable,
        value: i64,
    ) -> Result<Action, ServiceError> {
        let range = device.tunable_range(tunable)?;

        if tunable == Tunable::CoreClockLock && (value <= 0 || value >= range.max) {
            return Ok(Action::Reset);
        }

        range.validate(tunable, value)?;
        Ok(Action::Set(value))
    }

    /// Validate and apply `value` (device units)
    pub fn apply<D: GpuDevice>(
        &self,
        device: &mut D,
        tunable: Tunable,
        value: i64,
    ) -> Result<Change, ServiceError> {
        let action = self.plan(device, tunable, value)?;
        self.execute(device, tunable, action)
    }

    /// Restore a tunable to its default
    pub fn reset<D: GpuDevice>(
        &self,
        device: &mut D,
        tunable: Tunable,
    ) -> Result<Change, ServiceError> {
        self.execute(device, tunable, Action::Reset)
    }

    /// Apply every field present in `settings`
    ///
    /// Fields are independent: one failure does not stop the rest.
    pub fn apply_settings<D: GpuDevice>(
        &self,
        device: &mut D,
        settings: &GpuSettings,
    ) -> Vec<FieldResult> {
        Tunable::ALL
            .iter()
            .filter_map(|&tunable| {
                let stored = settings.get(tunable)?;
                let result = self.apply(device, tunable, tunable.from_user_units(stored));
                if let Err(e) = &result {
                    log::warn!("GPU {}: {} not applied: {}", device.index(), tunable, e);
                }
                Some((tunable, result))
            })
            .collect()
    }

    /// Read the device's current settings for saving
    ///
    /// Only an explicitly applied clock lock is captured, never the
    /// discovered ceiling.
    pub fn capture<D: GpuDevice>(&self, device: &D) -> GpuSettings {
        let mut settings = GpuSettings::default();

        for tunable in [Tunable::PowerLimit, Tunable::CoreOffset, Tunable::MemoryOffset] {
            match device.tunable(tunable) {
                Ok(value) => settings.set(tunable, Some(tunable.to_user_units(value))),
                Err(e) => log::debug!("GPU {}: {} not captured: {}", device.index(), tunable, e),
            }
        }

        settings.gpu_cl = device
            .explicit_locked_clock()
            .map(|clock| clock.as_mhz() as i64);
        settings
    }

    fn execute<D: GpuDevice>(
        &self,
        device: &mut D,
        tunable: Tunable,
        action: Action,
    ) -> Result<Change, ServiceError> {
        let change = Change {
            tunable,
            action,
            dry_run: self.dry_run,
        };

        if self.dry_run {
            log::info!("DRY RUN: GPU {}: {}", device.index(), change);
            return Ok(change);
        }

        match action {
            Action::Set(value) => device.set_tunable(tunable, value)?,
            Action::Reset => device.reset_tunable(tunable)?,
        }
        log::debug!("GPU {}: {}", device.index(), change);

        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainError, NvmlError};
    use crate::mock::MockSymbols;
    use crate::nvml::{ClockLocks, Entry, NvmlDevice, ReturnCode};

    fn device(symbols: &MockSymbols) -> NvmlDevice<'_, MockSymbols> {
        let locks: &'static ClockLocks = Box::leak(Box::default());
        NvmlDevice::new(symbols, locks, MockSymbols::handle(0), 0)
    }

    #[test]
    fn test_apply_power_limit() {
        let symbols = MockSymbols::new();
        let mut dev = device(&symbols);
        let service = TuningService::new(false);

        let change = service
            .apply(&mut dev, Tunable::PowerLimit, 350_000)
            .unwrap();
        assert_eq!(change.action, Action::Set(350_000));
        assert_eq!(change.to_string(), "Set power limit to 350W");
        assert_eq!(symbols.gpu(0).unwrap().power_limit, 350_000);
    }

    #[test]
    fn test_out_of_range_never_reaches_setter() {
        let symbols = MockSymbols::new();
        let mut dev = device(&symbols);
        let service = TuningService::new(false);

        let err = service
            .apply(&mut dev, Tunable::PowerLimit, 700_000)
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::OutOfRange {
                value: 700,
                min: 150,
                max: 600,
                ..
            })
        ));
        assert!(!symbols.called(Entry::DeviceSetPowerManagementLimit));

        assert!(service.apply(&mut dev, Tunable::CoreOffset, 1500).is_err());
        assert!(!symbols.called(Entry::DeviceSetClockOffsets));
        assert!(!symbols.called(Entry::DeviceSetGpcClkVfOffset));
    }

    #[test]
    fn test_dry_run_does_not_apply() {
        let symbols = MockSymbols::new();
        let mut dev = device(&symbols);
        let service = TuningService::new(true);

        let change = service.apply(&mut dev, Tunable::CoreOffset, 150).unwrap();
        assert!(change.dry_run);
        assert_eq!(change.to_string(), "Would set core clock offset to +150 MHz");
        assert_eq!(symbols.gpu(0).unwrap().core_offset, 0);

        let change = service.reset(&mut dev, Tunable::PowerLimit).unwrap();
        assert_eq!(change.to_string(), "Would reset power limit");
        assert!(!symbols.called(Entry::DeviceSetPowerManagementLimit));
    }

    #[test]
    fn test_dry_run_still_validates() {
        let symbols = MockSymbols::new();
        let dev = device(&symbols);
        let service = TuningService::new(true);
        assert!(service.plan(&dev, Tunable::MemoryOffset, -2500).is_err());
    }

    #[test]
    fn test_clock_lock_rule() {
        let symbols = MockSymbols::new();
        let dev = device(&symbols);
        let service = TuningService::new(false);

        assert_eq!(
            service.plan(&dev, Tunable::CoreClockLock, 2400).unwrap(),
            Action::Set(2400)
        );
        assert_eq!(
            service.plan(&dev, Tunable::CoreClockLock, 0).unwrap(),
            Action::Reset
        );
        assert_eq!(
            service.plan(&dev, Tunable::CoreClockLock, -5).unwrap(),
            Action::Reset
        );
        assert_eq!(
            service.plan(&dev, Tunable::CoreClockLock, 3105).unwrap(),
            Action::Reset
        );
        assert!(service.plan(&dev, Tunable::CoreClockLock, 100).is_err());
    }

    #[test]
    fn test_lock_at_max_resets() {
        let symbols = MockSymbols::new();
        let mut dev = device(&symbols);
        let service = TuningService::new(false);

        service.apply(&mut dev, Tunable::CoreClockLock, 2400).unwrap();
        assert_eq!(dev.explicit_locked_clock().map(|c| c.as_mhz()), Some(2400));

        let change = service
            .apply(&mut dev, Tunable::CoreClockLock, 5000)
            .unwrap();
        assert_eq!(change.action, Action::Reset);
        assert!(symbols.called(Entry::DeviceResetGpuLockedClocks));
        assert_eq!(dev.explicit_locked_clock(), None);
    }

    #[test]
    fn test_apply_settings_partial_success() {
        let symbols = MockSymbols::new()
            .failing(Entry::DeviceSetClockOffsets, ReturnCode::NO_PERMISSION);
        let mut dev = device(&symbols);
        let service = TuningService::new(false);

        let settings = GpuSettings {
            pl: Some(300),
            gpu_co: Some(100),
            mem_co: None,
            gpu_cl: Some(2400),
        };
        let results = service.apply_settings(&mut dev, &settings);

        let tunables: Vec<Tunable> = results.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            tunables,
            vec![
                Tunable::PowerLimit,
                Tunable::CoreOffset,
                Tunable::CoreClockLock
            ]
        );
        assert!(results[0].1.is_ok());
        assert!(matches!(
            results[1].1,
            Err(ServiceError::Nvml(NvmlError::InsufficientPermissions(_)))
        ));
        assert!(results[2].1.is_ok());

        let gpu = symbols.gpu(0).unwrap();
        assert_eq!(gpu.power_limit, 300_000);
        assert_eq!(gpu.core_offset, 0);
    }

    #[test]
    fn test_capture_settings() {
        let symbols = MockSymbols::new();
        let mut dev = device(&symbols);
        let service = TuningService::new(false);

        let settings = service.capture(&dev);
        assert_eq!(settings.pl, Some(450));
        assert_eq!(settings.gpu_co, Some(0));
        assert_eq!(settings.gpu_cl, None);

        service.apply(&mut dev, Tunable::MemoryOffset, 1000).unwrap();
        service.apply(&mut dev, Tunable::CoreClockLock, 2400).unwrap();
        let settings = service.capture(&dev);
        assert_eq!(settings.mem_co, Some(1000));
        assert_eq!(settings.gpu_cl, Some(2400));
    }

    #[test]
    fn test_capture_skips_unsupported() {
        let symbols = MockSymbols::new().without_all(&[
            Entry::DeviceGetClockOffsets,
            Entry::DeviceGetMemClkVfOffset,
        ]);
        let dev = device(&symbols);
        let settings = TuningService::new(false).capture(&dev);
        assert_eq!(settings.mem_co, None);
        assert_eq!(settings.gpu_co, Some(0));
    }
}
