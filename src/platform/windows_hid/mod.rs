mod enumeration;

mod device;
use device::WindowsDevice;

mod setupapi;
mod util;

use std::{mem, num::NonZeroU32, ops::ControlFlow};

use windows_sys::{
    core::GUID,
    Win32::{
        Devices::HumanInterfaceDevice::HidD_GetHidGuid,
        Foundation::{
            ERROR_ACCESS_DENIED, ERROR_BAD_COMMAND, ERROR_BUSY, ERROR_DEVICE_NOT_CONNECTED,
            ERROR_DEV_NOT_EXIST, ERROR_FILE_NOT_FOUND, ERROR_GEN_FAILURE, ERROR_INVALID_FUNCTION,
            ERROR_INVALID_PARAMETER, ERROR_IO_DEVICE, ERROR_NOT_ENOUGH_MEMORY, ERROR_NOT_READY,
            ERROR_NOT_SUPPORTED, ERROR_NO_SYSTEM_RESOURCES, ERROR_OPERATION_ABORTED,
            ERROR_OUTOFMEMORY, ERROR_PATH_NOT_FOUND, ERROR_SEM_TIMEOUT, ERROR_SHARING_VIOLATION,
            ERROR_TIMEOUT, WIN32_ERROR,
        },
    },
};

use super::{Backend, NativeDevice};
use crate::{device::DisconnectNotifier, DeviceInfo, Error, ErrorKind};

/// The SetupAPI and `hid.dll` backend.
///
/// Windows has no per-handle removal notification without a window or a
/// service; a device that went away is noticed by the
/// `ERROR_DEVICE_NOT_CONNECTED` from the next transfer.
pub(crate) struct WindowsBackend {
    hid_guid: GUID,
}

impl WindowsBackend {
    pub(crate) fn new() -> WindowsBackend {
        let mut hid_guid: GUID = unsafe { mem::zeroed() };
        unsafe { HidD_GetHidGuid(&mut hid_guid) };
        WindowsBackend { hid_guid }
    }
}

impl Backend for WindowsBackend {
    fn supported(&self) -> bool {
        true
    }

    fn enumerate(
        &self,
        visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>,
    ) -> Result<(), Error> {
        enumeration::enumerate(self.hid_guid, visit)
    }

    fn open_needs_enumeration_lock(&self) -> bool {
        false
    }

    fn open(
        &self,
        info: &DeviceInfo,
        _disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn NativeDevice>, Error> {
        Ok(Box::new(WindowsDevice::open(info)?))
    }
}

pub fn format_os_error_code(f: &mut std::fmt::Formatter<'_>, code: u32) -> std::fmt::Result {
    write!(f, "error {}", code)
}

impl crate::error::Error {
    pub(crate) fn new_os(kind: ErrorKind, message: &'static str, code: WIN32_ERROR) -> Self {
        Self {
            kind,
            code: NonZeroU32::new(code),
            message,
        }
    }
}

/// Map a `GetLastError` value from a failed call.
pub(crate) fn win32_error(code: WIN32_ERROR) -> Error {
    let (kind, message) = match code {
        ERROR_ACCESS_DENIED => (ErrorKind::PermissionDenied, "access denied"),
        ERROR_SHARING_VIOLATION => (
            ErrorKind::ExclusiveAccess,
            "exclusive access and device already open",
        ),
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => {
            (ErrorKind::NotFound, "hid: device not found")
        }
        ERROR_DEVICE_NOT_CONNECTED | ERROR_DEV_NOT_EXIST => {
            (ErrorKind::NoDevice, "device not connected")
        }
        ERROR_SEM_TIMEOUT | ERROR_TIMEOUT => (ErrorKind::Timeout, "I/O Timeout"),
        ERROR_NOT_READY => (ErrorKind::NotReady, "device not ready"),
        ERROR_NOT_ENOUGH_MEMORY | ERROR_OUTOFMEMORY | ERROR_NO_SYSTEM_RESOURCES => {
            (ErrorKind::NoResources, "insufficient system resources")
        }
        ERROR_INVALID_PARAMETER => (ErrorKind::InvalidArgument, "invalid argument"),
        ERROR_INVALID_FUNCTION | ERROR_NOT_SUPPORTED | ERROR_BAD_COMMAND => {
            (ErrorKind::Unsupported, "operation not supported by device")
        }
        ERROR_GEN_FAILURE => (ErrorKind::DeviceError, "device is not functioning"),
        ERROR_BUSY => (ErrorKind::Busy, "device busy"),
        ERROR_OPERATION_ABORTED => (ErrorKind::Aborted, "operation aborted"),
        ERROR_IO_DEVICE => (ErrorKind::Io, "I/O error"),
        _ => (ErrorKind::Unknown, "unknown error"),
    };
    Error::new_os(kind, message, code)
}

#[test]
fn test_win32_error_mapping() {
    let e = win32_error(ERROR_SHARING_VIOLATION);
    assert_eq!(e.kind(), ErrorKind::ExclusiveAccess);
    assert_eq!(e.os_error(), Some(32));
    assert_eq!(
        e.to_string(),
        "exclusive access and device already open (error 32)"
    );
    assert_eq!(win32_error(ERROR_DEVICE_NOT_CONNECTED).kind(), ErrorKind::NoDevice);
    assert_eq!(win32_error(ERROR_FILE_NOT_FOUND).kind(), ErrorKind::NotFound);
    assert_eq!(win32_error(0xFFFF).kind(), ErrorKind::Unknown);
}
