//! Backend for platforms without HID support, and for builds with the
//! `disabled` feature.

use std::ops::ControlFlow;

use crate::{device::DisconnectNotifier, DeviceInfo, Error};

use super::{Backend, NativeDevice};

pub(crate) struct UnsupportedBackend;

impl UnsupportedBackend {
    pub(crate) fn new() -> UnsupportedBackend {
        UnsupportedBackend
    }
}

impl Backend for UnsupportedBackend {
    fn supported(&self) -> bool {
        false
    }

    fn enumerate(
        &self,
        _visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn open_needs_enumeration_lock(&self) -> bool {
        false
    }

    fn open(
        &self,
        _info: &DeviceInfo,
        _disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn NativeDevice>, Error> {
        Err(Error::unsupported_platform())
    }
}

pub(crate) fn format_os_error_code(f: &mut std::fmt::Formatter<'_>, code: u32) -> std::fmt::Result {
    write!(f, "error {code}")
}

#[cfg(test)]
mod tests {
    use crate::ErrorKind;

    #[test]
    fn test_public_api_without_backend() {
        assert!(!crate::supported());
        assert_eq!(crate::devices().count(), 0);
        assert!(crate::first_device().is_none());
        assert!(crate::all_devices().is_empty());
        assert_eq!(
            crate::by_path("anything").unwrap_err().kind(),
            ErrorKind::UnsupportedPlatform
        );
    }
}
