mod hidraw;

mod enumeration;

mod device;
use device::LinuxDevice;

use std::{num::NonZeroU32, ops::ControlFlow, path::PathBuf};

use rustix::io::Errno;

use super::{Backend, NativeDevice};
use crate::{device::DisconnectNotifier, DeviceInfo, Error, ErrorKind};

const SYSFS_HIDRAW_CLASS: &str = "/sys/class/hidraw";
const DEV_PREFIX: &str = "/dev";

/// The `hidraw` backend.
///
/// hidraw has no removal notification; a device that went away is noticed by
/// the `ENODEV` from the next transfer.
pub(crate) struct LinuxBackend {
    class_dir: PathBuf,
    dev_dir: PathBuf,
}

impl LinuxBackend {
    pub(crate) fn new() -> LinuxBackend {
        LinuxBackend {
            class_dir: PathBuf::from(SYSFS_HIDRAW_CLASS),
            dev_dir: PathBuf::from(DEV_PREFIX),
        }
    }

    /// Look for nodes under `class_dir`, and name them under `dev_dir`.
    #[cfg(test)]
    pub(crate) fn with_roots(class_dir: PathBuf, dev_dir: PathBuf) -> LinuxBackend {
        LinuxBackend { class_dir, dev_dir }
    }
}

impl Backend for LinuxBackend {
    fn supported(&self) -> bool {
        true
    }

    fn enumerate(
        &self,
        visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>,
    ) -> Result<(), Error> {
        enumeration::enumerate(&self.class_dir, &self.dev_dir, visit)
    }

    fn open_needs_enumeration_lock(&self) -> bool {
        false
    }

    fn open(
        &self,
        info: &DeviceInfo,
        _disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn NativeDevice>, Error> {
        Ok(Box::new(LinuxDevice::open(info)?))
    }
}

pub fn format_os_error_code(f: &mut std::fmt::Formatter<'_>, code: u32) -> std::fmt::Result {
    write!(f, "errno {}", code)
}

impl crate::error::Error {
    pub(crate) fn new_os(kind: ErrorKind, message: &'static str, code: Errno) -> Self {
        Self {
            kind,
            code: NonZeroU32::new(code.raw_os_error() as u32),
            message,
        }
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        let (kind, message) = match errno {
            Errno::ACCESS | Errno::PERM => (ErrorKind::PermissionDenied, "permission denied"),
            Errno::NOENT | Errno::NXIO => (ErrorKind::NotFound, "hid: device not found"),
            Errno::NODEV => (ErrorKind::NoDevice, "no such device"),
            Errno::BUSY => (ErrorKind::Busy, "device or resource busy"),
            Errno::AGAIN => (ErrorKind::Busy, "resource temporarily unavailable"),
            Errno::TIMEDOUT => (ErrorKind::Timeout, "I/O Timeout"),
            Errno::NOMEM | Errno::NOBUFS => (ErrorKind::NoResources, "out of memory"),
            Errno::INVAL => (ErrorKind::InvalidArgument, "invalid argument"),
            Errno::NOTTY | Errno::OPNOTSUPP | Errno::NOSYS => {
                (ErrorKind::Unsupported, "operation not supported by device")
            }
            Errno::PIPE | Errno::PROTO => (ErrorKind::DeviceError, "device stopped responding"),
            Errno::IO => (ErrorKind::Io, "I/O error"),
            Errno::INTR => (ErrorKind::Aborted, "operation interrupted"),
            _ => (ErrorKind::Unknown, "unknown error"),
        };
        Error::new_os(kind, message, errno)
    }
}

#[test]
fn test_errno_mapping() {
    let e = Error::from(Errno::NODEV);
    assert_eq!(e.kind(), ErrorKind::NoDevice);
    assert_eq!(e.os_error(), Some(19));
    assert_eq!(e.to_string(), "no such device (errno 19)");

    assert_eq!(Error::from(Errno::ACCESS).kind(), ErrorKind::PermissionDenied);
    assert_eq!(Error::from(Errno::NOENT).kind(), ErrorKind::NotFound);
    assert_eq!(Error::from(Errno::NOTTY).kind(), ErrorKind::Unsupported);
    assert_eq!(Error::from(Errno::XDEV).kind(), ErrorKind::Unknown);
}
