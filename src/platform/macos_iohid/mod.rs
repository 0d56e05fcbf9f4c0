use std::{num::NonZeroU32, ops::ControlFlow};

use io_kit_sys::ret::*;

mod enumeration;
mod events;

mod device;
use device::MacDevice;

mod iohid;
mod iohid_c;

use super::{Backend, NativeDevice};
use crate::{device::DisconnectNotifier, DeviceInfo, Error, ErrorKind};

/// The `IOHIDManager` backend.
///
/// `IOHIDManagerSetDeviceMatching` releases the devices of any enumeration
/// still in progress, so both listing and opening run under the enumeration
/// lock.
pub(crate) struct MacBackend;

impl MacBackend {
    pub(crate) fn new() -> MacBackend {
        MacBackend
    }
}

impl Backend for MacBackend {
    fn supported(&self) -> bool {
        true
    }

    fn enumerate(
        &self,
        visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>,
    ) -> Result<(), Error> {
        enumeration::enumerate(visit)
    }

    fn open_needs_enumeration_lock(&self) -> bool {
        true
    }

    fn open(
        &self,
        info: &DeviceInfo,
        disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn NativeDevice>, Error> {
        Ok(Box::new(MacDevice::open(info, disconnect)?))
    }
}

pub fn format_os_error_code(f: &mut std::fmt::Formatter<'_>, code: u32) -> std::fmt::Result {
    write!(f, "error 0x{:08x}", code)
}

impl crate::error::Error {
    pub(crate) fn new_os(kind: ErrorKind, message: &'static str, code: IOReturn) -> Self {
        Self {
            kind,
            code: NonZeroU32::new(code as u32),
            message,
        }
    }
}

/// Map a failed `IOReturn` to an error.
#[allow(non_upper_case_globals)]
pub(crate) fn io_return_error(status: IOReturn) -> Error {
    use ErrorKind::*;
    let (kind, message) = match status {
        kIOReturnError => (Unknown, "general error"),
        kIOReturnNoMemory => (NoResources, "can't allocate memory"),
        kIOReturnNoResources => (NoResources, "resource shortage"),
        kIOReturnIPCError => (Io, "error during IPC"),
        kIOReturnNoDevice => (NoDevice, "no such device"),
        kIOReturnNotPrivileged => (PermissionDenied, "privilege violation"),
        kIOReturnBadArgument => (InvalidArgument, "invalid argument"),
        kIOReturnLockedRead => (Busy, "device read locked"),
        kIOReturnLockedWrite => (Busy, "device write locked"),
        kIOReturnExclusiveAccess => (ExclusiveAccess, "exclusive access and device already open"),
        kIOReturnBadMessageID => (Io, "sent/received messages had different msg_id"),
        kIOReturnUnsupported => (Unsupported, "unsupported function"),
        kIOReturnVMError => (Unknown, "misc. VM failure"),
        kIOReturnInternalError => (Unknown, "internal error"),
        kIOReturnIOError => (Io, "general I/O error"),
        kIOReturnCannotLock => (Busy, "can't acquire lock"),
        kIOReturnNotOpen => (NotOpen, "device not open"),
        kIOReturnNotReadable => (Unsupported, "read not supported"),
        kIOReturnNotWritable => (Unsupported, "write not supported"),
        kIOReturnNotAligned => (InvalidArgument, "alignment error"),
        kIOReturnBadMedia => (DeviceError, "media error"),
        kIOReturnStillOpen => (Busy, "device(s) still open"),
        kIOReturnRLDError => (Unknown, "rld failure"),
        kIOReturnDMAError => (Io, "DMA failure"),
        kIOReturnBusy => (Busy, "device is busy"),
        kIOReturnTimeout => (Timeout, "I/O Timeout"),
        kIOReturnOffline => (Offline, "device offline"),
        kIOReturnNotReady => (NotReady, "not ready"),
        kIOReturnNotAttached => (NoDevice, "device not attached"),
        kIOReturnNoChannels => (NoResources, "no DMA channels left"),
        kIOReturnNoSpace => (NoResources, "no space for data"),
        kIOReturnPortExists => (Busy, "port already exists"),
        kIOReturnCannotWire => (NoResources, "can't wire down physical memory"),
        kIOReturnNoInterrupt => (DeviceError, "no interrupt attached"),
        kIOReturnNoFrames => (Io, "no DMA frames enqueued"),
        kIOReturnMessageTooLarge => (InvalidArgument, "oversize msg received on interrupt port"),
        kIOReturnNotPermitted => (PermissionDenied, "not permitted"),
        kIOReturnNoPower => (Offline, "no power to device"),
        kIOReturnNoMedia => (DeviceError, "media not present"),
        kIOReturnUnformattedMedia => (DeviceError, "media not formatted"),
        kIOReturnUnsupportedMode => (Unsupported, "no such mode"),
        kIOReturnUnderrun => (Io, "data underrun"),
        kIOReturnOverrun => (Io, "data overrun"),
        kIOReturnDeviceError => (DeviceError, "the device is not working properly"),
        kIOReturnNoCompletion => (InvalidArgument, "a completion routine is required"),
        kIOReturnAborted => (Aborted, "operation aborted"),
        kIOReturnNoBandwidth => (NoResources, "bus bandwidth would be exceeded"),
        kIOReturnNotResponding => (DeviceError, "device not responding"),
        kIOReturnIsoTooOld => (Io, "isochronous I/O request for distant past"),
        kIOReturnIsoTooNew => (Io, "isochronous I/O request for distant future"),
        kIOReturnNotFound => (NotFound, "data was not found"),
        _ => (Unknown, "unknown error"),
    };
    Error::new_os(kind, message, status)
}

/// Convert an `IOReturn` status to a `Result`.
pub(crate) fn check_io_return(status: IOReturn) -> Result<(), Error> {
    if status == kIOReturnSuccess {
        Ok(())
    } else {
        Err(io_return_error(status))
    }
}

#[test]
fn test_io_return_mapping() {
    let e = io_return_error(kIOReturnExclusiveAccess);
    assert_eq!(e.kind(), ErrorKind::ExclusiveAccess);
    assert_eq!(e.os_error(), Some(0xe00002c5));
    assert_eq!(
        e.to_string(),
        "exclusive access and device already open (error 0xe00002c5)"
    );
    assert_eq!(io_return_error(kIOReturnNoDevice).kind(), ErrorKind::NoDevice);
    assert_eq!(io_return_error(kIOReturnNotAttached).kind(), ErrorKind::NoDevice);
    assert_eq!(io_return_error(kIOReturnTimeout).to_string(), "I/O Timeout (error 0xe00002d6)");
    assert_eq!(io_return_error(0x1234).kind(), ErrorKind::Unknown);
    assert!(check_io_return(kIOReturnSuccess).is_ok());
}
