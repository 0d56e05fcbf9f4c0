use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use log::{debug, warn};

use crate::{
    directory::ENUMERATE_LOCK,
    platform::{Backend, NativeDevice},
    report::{read_report, write_report},
    DeviceInfo, Error, ErrorKind, ReportLengths, ReportType,
};

/// An opened HID device.
///
/// Obtain a `Device` by calling [`DeviceInfo::open`]:
///
/// ```no_run
/// let info = nhid::find_devices(0xAAAA, 0xBBBB)
///     .next()
///     .expect("device not connected");
///
/// let device = info.open().expect("failed to open device");
/// device.write(&[0x00, 0x01, 0x02]).unwrap();
///
/// let mut buf = [0u8; 65];
/// let len = device.read(&mut buf).unwrap();
/// println!("report: {:02x?}", &buf[..len]);
/// ```
///
/// All I/O methods block until the OS completes the transfer. They take
/// `&self`, so the device can be shared between threads, and
/// [`close`][`Device::close`] may be called while another thread is blocked in
/// a transfer.
///
/// Once the device is closed or unplugged, every I/O method fails with
/// [`ErrorKind::Disconnected`]. The device is closed when dropped.
pub struct Device {
    path: String,
    report_lengths: ReportLengths,
    shared: Arc<Shared>,
}

/// Lifecycle state of a [`Device`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// The native resource is held and I/O can be attempted.
    Open,

    /// The device was unplugged. Terminal.
    Disconnected,

    /// [`Device::close`] was called. Terminal.
    Closed,
}

pub(crate) struct Shared {
    slot: Mutex<Slot>,
}

enum Slot {
    /// Between the backend open call and the handle being returned.
    Opening,
    Open(Arc<dyn NativeDevice>),
    Disconnected,
    Closed,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move out of `Open` (or `Opening`) into `next`.
    ///
    /// Returns the native device so the caller drops it after the lock is
    /// released. Only the first transition out of `Open` gets it, so the
    /// native release happens once.
    fn end(&self, next: Slot) -> Option<Arc<dyn NativeDevice>> {
        let mut slot = self.lock();
        match *slot {
            Slot::Open(_) | Slot::Opening => match mem::replace(&mut *slot, next) {
                Slot::Open(native) => Some(native),
                _ => None,
            },
            Slot::Disconnected | Slot::Closed => None,
        }
    }
}

/// Handed to backends at open time to report asynchronous device removal.
///
/// Holds only a weak reference, so a notification arriving after the
/// [`Device`] is gone does nothing.
#[derive(Clone)]
#[cfg_attr(
    all(not(test), any(feature = "disabled", not(target_os = "macos"))),
    allow(dead_code)
)]
pub(crate) struct DisconnectNotifier(Weak<Shared>);

impl DisconnectNotifier {
    #[cfg_attr(
        all(not(test), any(feature = "disabled", not(target_os = "macos"))),
        allow(dead_code)
    )]
    pub(crate) fn notify(&self) {
        let Some(shared) = self.0.upgrade() else {
            return;
        };
        if let Some(native) = shared.end(Slot::Disconnected) {
            debug!("Device removed, releasing handle");
            drop(native);
        }
    }
}

impl Device {
    pub(crate) fn open(backend: &dyn Backend, info: &DeviceInfo) -> Result<Device, Error> {
        if !backend.supported() {
            return Err(Error::unsupported_platform());
        }

        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::Opening),
        });
        let notifier = DisconnectNotifier(Arc::downgrade(&shared));

        debug!("Opening device {}", info.path);
        let native = if backend.open_needs_enumeration_lock() {
            let _guard = ENUMERATE_LOCK
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            backend.open(info, notifier)?
        } else {
            backend.open(info, notifier)?
        };

        {
            let mut slot = shared.lock();
            if !matches!(*slot, Slot::Opening) {
                // removed while opening
                drop(slot);
                drop(native);
                return Err(Error::disconnected().log_debug());
            }
            *slot = Slot::Open(Arc::from(native));
        }

        Ok(Device {
            path: info.path.clone(),
            report_lengths: info.report_lengths,
            shared,
        })
    }

    /// Path of the device this handle was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Report lengths declared by the device when it was enumerated.
    pub fn report_lengths(&self) -> ReportLengths {
        self.report_lengths
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DeviceState {
        match *self.shared.lock() {
            Slot::Opening | Slot::Open(_) => DeviceState::Open,
            Slot::Disconnected => DeviceState::Disconnected,
            Slot::Closed => DeviceState::Closed,
        }
    }

    /// Close the device and release the native handle.
    ///
    /// Calling `close` again, or after the device was unplugged, does
    /// nothing. A transfer already in progress on another thread finishes
    /// first; the OS handle is released when it returns.
    pub fn close(&self) {
        if let Some(native) = self.shared.end(Slot::Closed) {
            debug!("Closing device {}", self.path);
            drop(native);
        }
    }

    fn native(&self) -> Result<Arc<dyn NativeDevice>, Error> {
        match &*self.shared.lock() {
            Slot::Open(native) => Ok(native.clone()),
            _ => Err(Error::disconnected()),
        }
    }

    /// Map a failure from the backend, noticing when the device went away.
    fn check_failure(&self, err: Error) -> Error {
        if err.kind() == ErrorKind::NoDevice {
            warn!("Device {} is gone: {err}", self.path);
            if let Some(native) = self.shared.end(Slot::Disconnected) {
                drop(native);
            }
            return Error::disconnected();
        }

        match *self.shared.lock() {
            // closed or unplugged while the transfer was in progress
            Slot::Closed | Slot::Disconnected => Error::disconnected(),
            Slot::Opening | Slot::Open(_) => err,
        }
    }

    fn write_kind(&self, report_type: ReportType, buf: &[u8]) -> Result<(), Error> {
        let native = self.native()?;
        write_report(&*native, report_type, buf).map_err(|e| self.check_failure(e))
    }

    fn read_kind(&self, report_type: ReportType, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let native = self.native()?;
        read_report(&*native, report_type, buf).map_err(|e| self.check_failure(e))
    }

    /// Send an output report.
    ///
    /// The first byte of `buf` is the report number, or 0 for devices that
    /// don't use numbered reports. An empty `buf` is an
    /// [`ErrorKind::InvalidArgument`] error.
    ///
    /// ### Platform-specific notes
    /// * On Windows, the report is zero-padded or truncated to the device's
    ///   output report length.
    pub fn write(&self, buf: &[u8]) -> Result<(), Error> {
        self.write_kind(ReportType::Output, buf)
    }

    /// Send a feature report.
    ///
    /// The first byte of `buf` is the report number, or 0 for devices that
    /// don't use numbered reports, followed by the report data. For a device
    /// with 16-byte unnumbered feature reports, pass 17 bytes.
    pub fn write_feature(&self, buf: &[u8]) -> Result<(), Error> {
        self.write_kind(ReportType::Feature, buf)
    }

    /// Fetch an input report.
    ///
    /// Set `buf[0]` to the number of the report to fetch, or 0 for devices
    /// that don't use numbered reports. On return `buf[0]` still holds the
    /// report number and the data starts at `buf[1]`; the returned length
    /// includes the report number byte.
    ///
    /// An empty `buf` returns `Ok(0)` without any I/O.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        self.read_kind(ReportType::Input, buf)
    }

    /// Fetch a feature report.
    ///
    /// Framing is the same as [`read`][`Device::read`].
    pub fn read_feature(&self, buf: &mut [u8]) -> Result<usize, Error> {
        self.read_kind(ReportType::Feature, buf)
    }

    /// Write directly to an interrupt OUT endpoint. Not implemented by any
    /// backend; always fails with [`ErrorKind::NotImplemented`].
    pub fn write_interrupt(&self, _endpoint: u8, _buf: &[u8]) -> Result<usize, Error> {
        Err(Error::not_implemented())
    }

    /// Read directly from an interrupt IN endpoint. Not implemented by any
    /// backend; always fails with [`ErrorKind::NotImplemented`].
    pub fn read_interrupt(&self, _endpoint: u8, _buf: &mut [u8]) -> Result<usize, Error> {
        Err(Error::not_implemented())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

#[test]
fn assert_send_sync() {
    fn require_send_sync<T: Send + Sync>() {}
    require_send_sync::<Device>();
    require_send_sync::<DeviceInfo>();
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use crate::{
        platform::mock::{MockBackend, NativeCall},
        DeviceState, ErrorKind, ReportType,
    };

    use super::Device;

    fn open_first(backend: &MockBackend) -> Device {
        let info = backend.devices()[0].clone();
        Device::open(backend, &info).unwrap()
    }

    #[test]
    fn test_round_trip_unnumbered() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        let native = backend.opened(0);

        device.write(&[0, 1, 2, 3, 4]).unwrap();
        native.queue_report(&[9, 8, 7]);
        let mut buf = [0u8; 16];
        let len = device.read(&mut buf).unwrap();

        assert_eq!(len, 4);
        assert_eq!(&buf[..len], &[0, 9, 8, 7]);
        assert_eq!(
            native.calls(),
            vec![
                NativeCall::SetReport(ReportType::Output, 0, vec![1, 2, 3, 4]),
                NativeCall::GetReport(ReportType::Input, 0, 15),
            ]
        );
    }

    #[test]
    fn test_feature_reports() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        let native = backend.opened(0);

        device.write_feature(&[2, 0xAA]).unwrap();
        native.queue_report(&[2, 0x55, 0x66]);
        let mut buf = [2u8, 0, 0, 0, 0];
        assert_eq!(device.read_feature(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[2, 0x55, 0x66]);
        assert_eq!(
            native.calls(),
            vec![
                NativeCall::SetReport(ReportType::Feature, 2, vec![2, 0xAA]),
                NativeCall::GetReport(ReportType::Feature, 2, 5),
            ]
        );
    }

    #[test]
    fn test_zero_length_read() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        let native = backend.opened(0);

        assert_eq!(device.read(&mut []).unwrap(), 0);
        assert_eq!(device.read_feature(&mut []).unwrap(), 0);
        assert!(native.calls().is_empty());
    }

    #[test]
    fn test_close() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        let native = backend.opened(0);
        assert_eq!(device.state(), DeviceState::Open);

        device.close();
        assert_eq!(device.state(), DeviceState::Closed);
        assert_eq!(native.release_count(), 1);

        let mut buf = [0u8; 4];
        for err in [
            device.write(&[0, 1]).unwrap_err(),
            device.write_feature(&[0, 1]).unwrap_err(),
            device.read(&mut buf).unwrap_err(),
            device.read_feature(&mut buf).unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::Disconnected);
        }
        assert!(native.calls().is_empty());

        device.close();
        drop(device);
        assert_eq!(native.release_count(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        let native = backend.opened(0);
        drop(device);
        assert_eq!(native.release_count(), 1);
    }

    #[test]
    fn test_disconnect_notification() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        let native = backend.opened(0);

        backend.unplug(0);
        assert_eq!(device.state(), DeviceState::Disconnected);
        assert_eq!(native.release_count(), 1);
        assert_eq!(
            device.write(&[0, 1]).unwrap_err().kind(),
            ErrorKind::Disconnected
        );

        device.close();
        assert_eq!(device.state(), DeviceState::Disconnected);
        assert_eq!(native.release_count(), 1);
    }

    #[test]
    fn test_gone_device_error_disconnects() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        let native = backend.opened(0);

        native.fail_next(crate::Error::new(ErrorKind::NoDevice, "no such device"));
        let mut buf = [0u8; 8];
        assert_eq!(
            device.read(&mut buf).unwrap_err().kind(),
            ErrorKind::Disconnected
        );
        assert_eq!(device.state(), DeviceState::Disconnected);
        assert_eq!(native.release_count(), 1);
    }

    #[test]
    fn test_other_errors_pass_through() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        let native = backend.opened(0);

        native.fail_next(crate::Error::new(ErrorKind::Timeout, "I/O Timeout"));
        assert_eq!(device.write(&[0, 1]).unwrap_err().kind(), ErrorKind::Timeout);
        assert_eq!(device.state(), DeviceState::Open);
    }

    #[test]
    fn test_interrupt_not_implemented() {
        let backend = MockBackend::with_devices(1);
        let device = open_first(&backend);
        assert_eq!(
            device.write_interrupt(1, &[1]).unwrap_err().kind(),
            ErrorKind::NotImplemented
        );
        assert_eq!(
            device.read_interrupt(0x81, &mut [0; 4]).unwrap_err().kind(),
            ErrorKind::NotImplemented
        );
    }

    #[test]
    fn test_close_races_disconnect() {
        for _ in 0..50 {
            let backend = Arc::new(MockBackend::with_devices(1));
            let device = Arc::new(open_first(&backend));
            let native = backend.opened(0);

            let closer = {
                let device = device.clone();
                thread::spawn(move || device.close())
            };
            let unplugger = {
                let backend = backend.clone();
                thread::spawn(move || backend.unplug(0))
            };
            closer.join().unwrap();
            unplugger.join().unwrap();

            assert_ne!(device.state(), DeviceState::Open);
            assert_eq!(native.release_count(), 1);
        }
    }

    #[test]
    fn test_exclusive_open() {
        let backend = MockBackend::with_devices(1);
        let info = backend.devices()[0].clone();
        let first = Device::open(&backend, &info).unwrap();
        assert_eq!(
            Device::open(&backend, &info).unwrap_err().kind(),
            ErrorKind::ExclusiveAccess
        );
        drop(first);
        Device::open(&backend, &info).unwrap();
    }

    #[test]
    fn test_open_unplugged_path() {
        let backend = MockBackend::with_devices(1);
        let mut info = backend.devices()[0].clone();
        info.path = "mock/missing".into();
        assert_eq!(
            Device::open(&backend, &info).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_open_takes_enumeration_lock() {
        let backend = MockBackend::with_devices(1).open_walks_list();
        let device = open_first(&backend);
        assert!(backend.open_saw_lock_held());
        drop(device);
    }
}
