//! Native backends and the interface the portable layer needs from them.

use std::ops::ControlFlow;

use crate::{device::DisconnectNotifier, DeviceInfo, Error, ReportType};

#[cfg(all(any(target_os = "linux", target_os = "android"), not(feature = "disabled")))]
mod linux_hidraw;

#[cfg(all(any(target_os = "linux", target_os = "android"), not(feature = "disabled")))]
pub(crate) use linux_hidraw::{format_os_error_code, LinuxBackend as NativeBackend};

#[cfg(all(target_os = "windows", not(feature = "disabled")))]
mod windows_hid;

#[cfg(all(target_os = "windows", not(feature = "disabled")))]
pub(crate) use windows_hid::{format_os_error_code, WindowsBackend as NativeBackend};

#[cfg(all(target_os = "macos", not(feature = "disabled")))]
mod macos_iohid;

#[cfg(all(target_os = "macos", not(feature = "disabled")))]
pub(crate) use macos_iohid::{format_os_error_code, MacBackend as NativeBackend};

#[cfg(any(
    feature = "disabled",
    not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "windows",
        target_os = "macos"
    ))
))]
mod unsupported;

#[cfg(any(
    feature = "disabled",
    not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "windows",
        target_os = "macos"
    ))
))]
pub(crate) use unsupported::{format_os_error_code, UnsupportedBackend as NativeBackend};

#[cfg(test)]
pub(crate) mod mock;

/// One platform's native HID API.
///
/// Implementations only translate native objects; locking, report number
/// framing and the handle lifecycle live in the portable layer.
pub(crate) trait Backend: Send + Sync + 'static {
    /// Whether this backend can talk to devices at all.
    fn supported(&self) -> bool;

    /// Walk the native device list, passing each device to `visit` until it
    /// returns `Break` or the list is exhausted.
    ///
    /// Called with the enumeration lock held. All native objects must be
    /// released before returning, including on early exit.
    fn enumerate(
        &self,
        visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>,
    ) -> Result<(), Error>;

    /// Whether [`Backend::open`] walks the native device list and so must run
    /// under the enumeration lock.
    fn open_needs_enumeration_lock(&self) -> bool;

    /// Open the device at `info.path()`.
    ///
    /// Backends that receive asynchronous removal notifications call
    /// `disconnect.notify()` from their notification context.
    fn open(
        &self,
        info: &DeviceInfo,
        disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn NativeDevice>, Error>;
}

/// An opened native device. Dropping it releases the native resource.
///
/// The report data passed here is already unframed: for report number 0 it
/// excludes the leading 0 byte, otherwise it starts with the report number.
pub(crate) trait NativeDevice: Send + Sync {
    /// Send one report. Fails with `WriteMismatch` if the OS transferred a
    /// different number of bytes than it was given.
    fn set_report(&self, report_type: ReportType, report_id: u8, data: &[u8])
        -> Result<(), Error>;

    /// Fetch one report into `buf`, returning the number of bytes received.
    fn get_report(
        &self,
        report_type: ReportType,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Error>;
}
