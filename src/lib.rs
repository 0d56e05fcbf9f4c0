#![warn(missing_docs)]
//! A cross-platform library for finding and talking to HID devices.
//!
//! `nhid` lists connected Human Interface Devices, describes them the same
//! way on every OS, and exchanges input, output and feature reports with
//! them, using the OS's own HID API:
//!
//!  * Linux: `hidraw` device nodes and sysfs
//!  * Windows: SetupAPI and `hid.dll`
//!  * macOS: `IOHIDManager` and `IOHIDDevice`
//!
//! On any other platform, or with the `disabled` Cargo feature, [`supported`]
//! returns `false`, enumeration finds nothing and opening fails with
//! [`ErrorKind::UnsupportedPlatform`].
//!
//! ## Usage
//!
//! Use [`devices`] or one of the lookup functions to find a device, then
//! [`DeviceInfo::open`] it:
//!
//! ```no_run
//! for info in nhid::devices() {
//!     println!("{:04x}:{:04x} {}", info.vendor_id(), info.product_id(), info.product());
//! }
//!
//! let device = nhid::by_path("/dev/hidraw0")?.open()?;
//! device.write_feature(&[0x00, 0x01])?;
//! # Ok::<(), nhid::Error>(())
//! ```
//!
//! Report buffers always start with the report number, which is 0 for
//! devices that don't use numbered reports. See [`Device::write`] and
//! [`Device::read`].
//!
//! ## Logging
//!
//! `nhid` logs through the [`log`](https://docs.rs/log) facade. Failed native
//! calls are logged at `error`, skipped devices and missing properties at
//! `warn` and `debug`.

use std::sync::Arc;

use once_cell::sync::Lazy;

mod platform;
use platform::Backend;

mod error;
pub use error::{Error, ErrorKind};

mod report;
pub use report::ReportType;

mod report_descriptor;
pub use report_descriptor::ReportLengths;

mod enumeration;
pub use enumeration::DeviceInfo;

mod device;
pub use device::{Device, DeviceState};

mod directory;
pub use directory::Devices;

mod query;
use query::Directory;

static BACKEND: Lazy<Arc<dyn Backend>> = Lazy::new(|| Arc::new(platform::NativeBackend::new()));

pub(crate) fn platform_backend() -> &'static Arc<dyn Backend> {
    &BACKEND
}

/// Whether this build can access HID devices on the running platform.
///
/// When `false`, every other function in this crate finds nothing or fails
/// with [`ErrorKind::UnsupportedPlatform`].
pub fn supported() -> bool {
    Directory::native().supported()
}

/// Enumerate the connected HID devices.
///
/// Devices are produced lazily, in the order the OS lists them, by a
/// background thread. Enumerations are serialized process-wide, so a second
/// call made while an earlier [`Devices`] is still being consumed waits for
/// it to finish or be dropped.
pub fn devices() -> Devices {
    Directory::native().devices()
}

/// The first connected device for which `predicate` returns `true`.
pub fn first_matching(predicate: impl FnMut(&DeviceInfo) -> bool) -> Option<DeviceInfo> {
    Directory::native().first_matching(predicate)
}

/// The first device the OS lists, if any.
pub fn first_device() -> Option<DeviceInfo> {
    Directory::native().first_matching(|_| true)
}

/// Every connected device for which `predicate` returns `true`, in
/// enumeration order.
pub fn all_matching(predicate: impl FnMut(&DeviceInfo) -> bool) -> Vec<DeviceInfo> {
    Directory::native().all_matching(predicate)
}

/// Every connected device, in enumeration order.
pub fn all_devices() -> Vec<DeviceInfo> {
    Directory::native().all_matching(|_| true)
}

/// Connected devices with the given vendor and product id.
pub fn find_devices(vendor_id: u16, product_id: u16) -> impl Iterator<Item = DeviceInfo> {
    Directory::native().find_devices(vendor_id, product_id)
}

/// Connected devices whose product string contains `text`. The match is
/// case sensitive.
pub fn find_devices_by_product(text: &str) -> impl Iterator<Item = DeviceInfo> {
    Directory::native().find_devices_by_product(text)
}

/// Find the device at `path`, as returned by [`DeviceInfo::path`].
///
/// Fails with [`ErrorKind::NotFound`] when no connected device has that path.
/// If the device list could not be obtained, that error is returned instead.
pub fn by_path(path: &str) -> Result<DeviceInfo, Error> {
    Directory::native().by_path(path)
}
