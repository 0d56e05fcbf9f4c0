use std::{fmt::Display, io, num::NonZeroU32};

use crate::platform::format_os_error_code;

/// Error returned from `nhid` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub(crate) kind: ErrorKind,
    pub(crate) code: Option<NonZeroU32>,
    pub(crate) message: &'static str,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            code: None,
            message,
        }
    }

    pub(crate) fn not_found() -> Self {
        Self::new(ErrorKind::NotFound, "hid: device not found")
    }

    pub(crate) fn disconnected() -> Self {
        Self::new(ErrorKind::Disconnected, "hid: device disconnected")
    }

    pub(crate) fn unsupported_platform() -> Self {
        Self::new(ErrorKind::UnsupportedPlatform, "hid: unsupported platform")
    }

    pub(crate) fn not_implemented() -> Self {
        Self::new(ErrorKind::NotImplemented, "hid: method not implemented")
    }

    pub(crate) fn write_mismatch() -> Self {
        Self::new(ErrorKind::WriteMismatch, "hid: written bytes mismatch")
    }

    #[track_caller]
    pub(crate) fn log_error(self) -> Self {
        log::error!("{}", self);
        self
    }

    #[track_caller]
    pub(crate) fn log_debug(self) -> Self {
        log::debug!("{}", self);
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error code from the OS, if applicable.
    ///
    /// * On Linux this is the `errno` value.
    /// * On Windows this is the `WIN32_ERROR` value.
    /// * On macOS this is the `IOReturn` value.
    pub fn os_error(&self) -> Option<u32> {
        self.code.map(|c| c.get())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = self.code {
            write!(f, " (")?;
            format_os_error_code(f, code.get())?;
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err.kind {
            ErrorKind::NotFound | ErrorKind::NoDevice => io::ErrorKind::NotFound,
            ErrorKind::Disconnected | ErrorKind::Offline | ErrorKind::NotOpen => {
                io::ErrorKind::NotConnected
            }
            ErrorKind::UnsupportedPlatform | ErrorKind::NotImplemented | ErrorKind::Unsupported => {
                io::ErrorKind::Unsupported
            }
            ErrorKind::InvalidArgument => io::ErrorKind::InvalidInput,
            ErrorKind::WriteMismatch => io::ErrorKind::WriteZero,
            ErrorKind::PermissionDenied => io::ErrorKind::PermissionDenied,
            ErrorKind::Timeout => io::ErrorKind::TimedOut,
            ErrorKind::NoResources => io::ErrorKind::OutOfMemory,
            ErrorKind::Aborted => io::ErrorKind::Interrupted,
            ErrorKind::ExclusiveAccess
            | ErrorKind::Busy
            | ErrorKind::NotReady
            | ErrorKind::DeviceError
            | ErrorKind::Io
            | ErrorKind::Unknown => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// General category of error as part of an [`Error`].
///
/// Native status codes from every backend are folded into these kinds, so
/// callers can decide on recovery without knowing the platform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No device with the requested path is connected.
    NotFound,

    /// The handle was closed or the device was unplugged. Re-enumerate before
    /// trying again.
    Disconnected,

    /// This build has no HID backend for the running platform.
    UnsupportedPlatform,

    /// The operation exists in the API but no backend implements it.
    NotImplemented,

    /// An argument was rejected before or by the OS, e.g. an empty report buffer.
    InvalidArgument,

    /// The OS transferred a different number of bytes than requested.
    WriteMismatch,

    /// The device is already open with exclusive access, by this or another process.
    ExclusiveAccess,

    /// This user or application does not have permission to perform the requested operation.
    PermissionDenied,

    /// The OS reported that the device no longer exists.
    NoDevice,

    /// The device or a lock on it is busy.
    Busy,

    /// The I/O operation timed out in the OS.
    Timeout,

    /// The device is offline or has no power.
    Offline,

    /// The device is not ready.
    NotReady,

    /// The OS ran out of memory or other resources.
    NoResources,

    /// The device was not opened by the OS.
    NotOpen,

    /// The operation is not supported by the device or its driver.
    Unsupported,

    /// The operation was aborted.
    Aborted,

    /// The device is not working properly or stopped responding.
    DeviceError,

    /// General I/O error.
    Io,

    /// A native status code without a known mapping.
    Unknown,
}

impl ErrorKind {
    /// Whether this condition holds for the lifetime of the process, so that
    /// retrying can never succeed.
    pub fn is_permanent(self) -> bool {
        matches!(
            self,
            ErrorKind::UnsupportedPlatform | ErrorKind::NotImplemented
        )
    }

    /// Whether the device is gone and must be found again by enumeration.
    pub fn requires_enumeration(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::Disconnected | ErrorKind::NoDevice
        )
    }
}

#[test]
fn test_display() {
    assert_eq!(Error::not_found().to_string(), "hid: device not found");
    assert_eq!(Error::disconnected().to_string(), "hid: device disconnected");
    let e = Error {
        kind: ErrorKind::Unknown,
        code: NonZeroU32::new(0),
        message: "unknown error",
    };
    assert_eq!(e.os_error(), None);
    assert_eq!(e.to_string(), "unknown error");
}

#[test]
fn test_io_error_kind() {
    let e: io::Error = Error::disconnected().into();
    assert_eq!(e.kind(), io::ErrorKind::NotConnected);
    let e: io::Error = Error::unsupported_platform().into();
    assert_eq!(e.kind(), io::ErrorKind::Unsupported);
}

#[test]
fn test_recoverability() {
    assert!(ErrorKind::UnsupportedPlatform.is_permanent());
    assert!(ErrorKind::NotImplemented.is_permanent());
    assert!(!ErrorKind::Timeout.is_permanent());
    assert!(ErrorKind::Disconnected.requires_enumeration());
    assert!(ErrorKind::NotFound.requires_enumeration());
    assert!(!ErrorKind::ExclusiveAccess.requires_enumeration());
}
