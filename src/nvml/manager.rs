//! NVML manager implementation
//!
//! Owns the library session: binding, `nvmlInit_v2`, enumeration, version
//! queries and `nvmlShutdown`. Devices borrow the manager, and
//! [`GpuManager::shutdown`] consumes it, so no device call can follow
//! shutdown. The manager also keeps the core clock locks applied during the
//! session, so re-enumerated devices report them.

use crate::error::NvmlError;
use crate::nvml::device::{trim_nul, ClockLocks, NvmlDevice};
use crate::nvml::ffi::{
    DeviceHandle, SYSTEM_DRIVER_VERSION_BUFFER_SIZE, SYSTEM_NVML_VERSION_BUFFER_SIZE,
};
use crate::nvml::status::{self, describe, ReturnCode};
use crate::nvml::symbols::{Entry, NvmlSymbols, RawSymbols};
use crate::nvml::traits::GpuManager;

/// NVML manager for GPU discovery and management
pub struct NvmlManager<S: NvmlSymbols = RawSymbols> {
    symbols: S,
    locks: ClockLocks,
    active: bool,
}

impl NvmlManager<RawSymbols> {
    /// Load the system NVML library and initialize it
    pub fn init() -> Result<Self, NvmlError> {
        Self::init_with(RawSymbols::load()?)
    }
}

impl<S: NvmlSymbols> NvmlManager<S> {
    /// Initialize NVML through an already bound symbol table
    ///
    /// Fails without calling into the library if a required entry point is
    /// unbound.
    pub fn init_with(symbols: S) -> Result<Self, NvmlError> {
        if let Some(missing) = Entry::ALL
            .iter()
            .find(|e| e.is_required() && !symbols.is_bound(**e))
        {
            return Err(NvmlError::MissingSymbol(missing.symbol()));
        }

        match symbols.init() {
            Some(code) if code.is_success() => {}
            Some(code) => {
                return Err(NvmlError::InitializationFailed(describe(&symbols, code)));
            }
            None => return Err(NvmlError::MissingSymbol(Entry::Init.symbol())),
        }

        log::debug!("NVML initialized");
        Ok(Self {
            symbols,
            locks: ClockLocks::new(),
            active: true,
        })
    }

    /// The bound symbol table
    pub fn symbols(&self) -> &S {
        &self.symbols
    }

    /// Number of devices the driver reports
    pub fn device_count(&self) -> Result<u32, NvmlError> {
        let mut count = 0;
        let ret = self.symbols.device_get_count(&mut count);
        status::check(&self.symbols, Entry::DeviceGetCount, ret)?;
        Ok(count)
    }

    fn read_version<F>(&self, entry: Entry, size: usize, call: F) -> Result<String, NvmlError>
    where
        F: FnOnce(&S, &mut [u8]) -> Option<ReturnCode>,
    {
        let mut buf = vec![0u8; size];
        let ret = call(&self.symbols, buf.as_mut_slice());
        status::check(&self.symbols, entry, ret)?;
        Ok(trim_nul(&buf))
    }

    fn close(&mut self) -> Result<(), NvmlError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        match self.symbols.shutdown() {
            None => Ok(()),
            ret => {
                status::check(&self.symbols, Entry::Shutdown, ret)?;
                log::debug!("NVML shut down");
                Ok(())
            }
        }
    }
}

impl<S: NvmlSymbols> GpuManager for NvmlManager<S> {
    type Device<'a>
        = NvmlDevice<'a, S>
    where
        Self: 'a;

    fn name(&self) -> &'static str {
        "NVML"
    }

    fn version(&self) -> Result<String, NvmlError> {
        self.read_version(
            Entry::SystemGetNvmlVersion,
            SYSTEM_NVML_VERSION_BUFFER_SIZE,
            |s, buf| s.system_get_nvml_version(buf),
        )
    }

    fn driver_version(&self) -> Result<String, NvmlError> {
        self.read_version(
            Entry::SystemGetDriverVersion,
            SYSTEM_DRIVER_VERSION_BUFFER_SIZE,
            |s, buf| s.system_get_driver_version(buf),
        )
    }

    fn cuda_driver_version(&self) -> Result<(u32, u32), NvmlError> {
        let mut version = 0;
        let ret = self.symbols.system_get_cuda_driver_version(&mut version);
        status::check(&self.symbols, Entry::SystemGetCudaDriverVersion, ret)?;
        let version = version.max(0) as u32;
        Ok((version / 1000, (version % 1000) / 10))
    }

    fn devices(&self) -> Result<Vec<Self::Device<'_>>, NvmlError> {
        let count = self.device_count()?;
        let mut devices = Vec::with_capacity(count as usize);

        for index in 0..count {
            let mut handle = DeviceHandle::null();
            let ret = self.symbols.device_get_handle_by_index(index, &mut handle);
            match status::check(&self.symbols, Entry::DeviceGetHandleByIndex, ret) {
                Ok(()) => devices.push(NvmlDevice::new(&self.symbols, &self.locks, handle, index)),
                Err(e) => log::warn!("Skipping GPU {}: {}", index, e),
            }
        }

        log::debug!("Enumerated {} of {} GPUs", devices.len(), count);
        Ok(devices)
    }

    fn shutdown(mut self) -> Result<(), NvmlError> {
        self.close()
    }
}

impl<S: NvmlSymbols> Drop for NvmlManager<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("NVML shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClockSpeed;
    use crate::mock::MockSymbols;
    use crate::nvml::traits::GpuDevice;

    #[test]
    fn test_init_calls_library_init() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        assert!(manager.symbols().is_initialized());
        assert_eq!(manager.name(), "NVML");
    }

    #[test]
    fn test_init_requires_core_symbols() {
        let result = NvmlManager::init_with(MockSymbols::new().without(Entry::DeviceGetUuid));
        assert!(matches!(
            result,
            Err(NvmlError::MissingSymbol("nvmlDeviceGetUUID"))
        ));
    }

    #[test]
    fn test_init_failure_is_fatal() {
        let symbols = MockSymbols::new().failing(Entry::Init, ReturnCode::DRIVER_NOT_LOADED);
        let err = NvmlManager::init_with(symbols).err().unwrap();
        assert_eq!(
            err,
            NvmlError::InitializationFailed("Driver Not Loaded".to_string())
        );
    }

    #[test]
    fn test_optional_symbols_may_be_missing() {
        let symbols = MockSymbols::new()
            .without_all(&[Entry::ErrorString, Entry::DeviceGetClockOffsets]);
        assert!(NvmlManager::init_with(symbols).is_ok());
    }

    #[test]
    fn test_devices_skip_failing_handles() {
        let symbols = MockSymbols::with_gpus(4).with_failing_handle(2);
        let manager = NvmlManager::init_with(symbols).unwrap();
        let devices = manager.devices().unwrap();
        let indices: Vec<u32> = devices.iter().map(|d| d.index()).collect();
        assert_eq!(indices, vec![0, 1, 3]);
        assert_eq!(devices[2].uuid(), "GPU-a1b2c3d4-0000-4000-8000-000000000003");
    }

    #[test]
    fn test_device_lookup() {
        let manager = NvmlManager::init_with(MockSymbols::with_gpus(2)).unwrap();
        let dev = manager.device_by_index(1).unwrap().unwrap();
        let uuid = dev.uuid().to_string();
        assert_eq!(manager.device_by_uuid(&uuid).unwrap().unwrap().index(), 1);
        assert!(manager.device_by_index(5).unwrap().is_none());
    }

    #[test]
    fn test_lock_survives_enumeration() {
        let manager = NvmlManager::init_with(MockSymbols::with_gpus(2)).unwrap();
        manager.devices().unwrap()[0].set_locked_clock(2400).unwrap();

        let devices = manager.devices().unwrap();
        assert_eq!(devices[0].locked_clock().unwrap(), ClockSpeed::new(2400));
        assert_eq!(devices[0].explicit_locked_clock(), Some(ClockSpeed::new(2400)));
        assert_eq!(devices[1].explicit_locked_clock(), None);

        let mut dev = manager.device_by_index(0).unwrap().unwrap();
        assert_eq!(dev.locked_clock().unwrap(), ClockSpeed::new(2400));
        dev.reset_locked_clock().unwrap();
        drop(dev);

        let dev = manager.device_by_index(0).unwrap().unwrap();
        assert_eq!(dev.explicit_locked_clock(), None);
        assert_eq!(dev.locked_clock().unwrap(), ClockSpeed::new(3105));
    }

    #[test]
    fn test_versions() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        assert_eq!(manager.version().unwrap(), "12.565.57.01");
        assert_eq!(manager.driver_version().unwrap(), "565.57.01");
        assert_eq!(manager.cuda_driver_version().unwrap(), (12, 7));
    }

    #[test]
    fn test_version_unbound() {
        let symbols = MockSymbols::new().without(Entry::SystemGetDriverVersion);
        let manager = NvmlManager::init_with(symbols).unwrap();
        assert!(manager.driver_version().unwrap_err().is_not_supported());
    }

    #[test]
    fn test_shutdown() {
        let manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        assert!(manager.shutdown().is_ok());

        let symbols = MockSymbols::new().failing(Entry::Shutdown, ReturnCode::UNINITIALIZED);
        let manager = NvmlManager::init_with(symbols).unwrap();
        assert!(manager.shutdown().is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut manager = NvmlManager::init_with(MockSymbols::new()).unwrap();
        manager.close().unwrap();
        assert!(!manager.symbols().is_initialized());
        manager.close().unwrap();
        assert_eq!(manager.symbols().call_count(Entry::Shutdown), 1);
    }

    #[test]
    #[ignore = "Requires NVIDIA GPU"]
    fn test_nvml_init() {
        let manager = NvmlManager::init().unwrap();
        assert!(manager.device_count().unwrap() > 0);
    }
}
