//! In-memory backend for exercising the portable layer in tests.

use std::{
    collections::VecDeque,
    ops::ControlFlow,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, TryLockError,
    },
    thread,
    time::Duration,
};

use crate::{
    device::DisconnectNotifier, directory::ENUMERATE_LOCK, DeviceInfo, Error, ErrorKind,
    ReportLengths, ReportType,
};

use super::{Backend, NativeDevice};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum NativeCall {
    SetReport(ReportType, u8, Vec<u8>),
    /// Report type, report number and the length of the buffer passed in.
    GetReport(ReportType, u8, usize),
}

/// Records calls and plays back queued reports.
#[derive(Default)]
pub(crate) struct MockDevice {
    calls: Mutex<Vec<NativeCall>>,
    reports: Mutex<VecDeque<Vec<u8>>>,
    fail: Mutex<Option<Error>>,
    claimed: AtomicBool,
    releases: AtomicUsize,
}

impl MockDevice {
    pub(crate) fn new() -> MockDevice {
        MockDevice::default()
    }

    pub(crate) fn calls(&self) -> Vec<NativeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn queue_report(&self, data: &[u8]) {
        self.reports.lock().unwrap().push_back(data.to_vec());
    }

    /// Make the next transfer fail with `err`.
    pub(crate) fn fail_next(&self, err: Error) {
        *self.fail.lock().unwrap() = Some(err);
    }

    pub(crate) fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), Error> {
        match self.fail.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl NativeDevice for MockDevice {
    fn set_report(&self, report_type: ReportType, report_id: u8, data: &[u8]) -> Result<(), Error> {
        self.take_failure()?;
        self.calls
            .lock()
            .unwrap()
            .push(NativeCall::SetReport(report_type, report_id, data.to_vec()));
        Ok(())
    }

    fn get_report(
        &self,
        report_type: ReportType,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        self.take_failure()?;
        self.calls
            .lock()
            .unwrap()
            .push(NativeCall::GetReport(report_type, report_id, buf.len()));
        let report = self.reports.lock().unwrap().pop_front().unwrap_or_default();
        let len = report.len().min(buf.len());
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }
}

/// What the backend hands to the portable layer. Dropping it is the native
/// release.
struct MockHandle(Arc<MockDevice>);

impl NativeDevice for MockHandle {
    fn set_report(&self, report_type: ReportType, report_id: u8, data: &[u8]) -> Result<(), Error> {
        self.0.set_report(report_type, report_id, data)
    }

    fn get_report(
        &self,
        report_type: ReportType,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        self.0.get_report(report_type, report_id, buf)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.0.releases.fetch_add(1, Ordering::SeqCst);
        self.0.claimed.store(false, Ordering::SeqCst);
    }
}

pub(crate) fn device_info(path: &str, vendor_id: u16, product_id: u16, product: &str) -> DeviceInfo {
    DeviceInfo {
        path: path.into(),
        vendor_id,
        product_id,
        version_number: 0x0100,
        manufacturer: "Mock".into(),
        product: product.into(),
        serial_number: String::new(),
        report_lengths: ReportLengths {
            input: 65,
            output: 65,
            feature: 9,
        },
    }
}

pub(crate) struct MockBackend {
    supported: bool,
    infos: Vec<DeviceInfo>,
    natives: Vec<Arc<MockDevice>>,
    notifiers: Mutex<Vec<Option<DisconnectNotifier>>>,

    fail_enumeration: bool,
    slow: bool,
    walks_list: bool,

    active: AtomicUsize,
    overlap: AtomicBool,
    released: AtomicUsize,
    lock_held_in_open: AtomicBool,
}

/// Counts the native list release, whichever way enumeration exits.
struct ListGuard<'a>(&'a MockBackend);

impl Drop for ListGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl MockBackend {
    pub(crate) fn with_infos(infos: Vec<DeviceInfo>) -> MockBackend {
        let natives = infos.iter().map(|_| Arc::new(MockDevice::new())).collect();
        let notifiers = Mutex::new(infos.iter().map(|_| None).collect());
        MockBackend {
            supported: true,
            infos,
            natives,
            notifiers,
            fail_enumeration: false,
            slow: false,
            walks_list: false,
            active: AtomicUsize::new(0),
            overlap: AtomicBool::new(false),
            released: AtomicUsize::new(0),
            lock_held_in_open: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_devices(n: usize) -> MockBackend {
        MockBackend::with_infos(
            (0..n)
                .map(|i| device_info(&format!("mock/{i}"), 0x1209, 0x0001 + i as u16, "Widget"))
                .collect(),
        )
    }

    pub(crate) fn unsupported() -> MockBackend {
        MockBackend {
            supported: false,
            ..MockBackend::with_devices(0)
        }
    }

    pub(crate) fn fail_enumeration(self) -> MockBackend {
        MockBackend {
            fail_enumeration: true,
            ..self
        }
    }

    /// Sleep between devices so concurrent enumerations would interleave.
    pub(crate) fn slow_enumeration(self) -> MockBackend {
        MockBackend { slow: true, ..self }
    }

    pub(crate) fn open_walks_list(self) -> MockBackend {
        MockBackend {
            walks_list: true,
            ..self
        }
    }

    pub(crate) fn devices(&self) -> Vec<DeviceInfo> {
        self.infos.clone()
    }

    pub(crate) fn opened(&self, index: usize) -> Arc<MockDevice> {
        self.natives[index].clone()
    }

    /// Deliver a removal notification for device `index`, as an OS
    /// notification thread would.
    pub(crate) fn unplug(&self, index: usize) {
        let notifier = self.notifiers.lock().unwrap()[index].take();
        if let Some(notifier) = notifier {
            notifier.notify();
        }
    }

    pub(crate) fn saw_overlap(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    pub(crate) fn lists_released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn open_saw_lock_held(&self) -> bool {
        self.lock_held_in_open.load(Ordering::SeqCst)
    }
}

impl Backend for MockBackend {
    fn supported(&self) -> bool {
        self.supported
    }

    fn enumerate(
        &self,
        visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>,
    ) -> Result<(), Error> {
        if self.fail_enumeration {
            return Err(Error::new(
                ErrorKind::NoResources,
                "mock: device list unavailable",
            ));
        }

        if self.active.fetch_add(1, Ordering::SeqCst) != 0 {
            self.overlap.store(true, Ordering::SeqCst);
        }
        let _list = ListGuard(self);

        for info in &self.infos {
            if self.slow {
                thread::sleep(Duration::from_millis(1));
            }
            if visit(info.clone()).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn open_needs_enumeration_lock(&self) -> bool {
        self.walks_list
    }

    fn open(
        &self,
        info: &DeviceInfo,
        disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn NativeDevice>, Error> {
        if self.walks_list {
            let held = matches!(ENUMERATE_LOCK.try_lock(), Err(TryLockError::WouldBlock));
            self.lock_held_in_open.store(held, Ordering::SeqCst);
        }

        let index = self
            .infos
            .iter()
            .position(|i| i.path == info.path)
            .ok_or_else(Error::not_found)?;

        let native = &self.natives[index];
        if native.claimed.swap(true, Ordering::SeqCst) {
            return Err(Error::new(
                ErrorKind::ExclusiveAccess,
                "exclusive access and device already open",
            ));
        }

        self.notifiers.lock().unwrap()[index] = Some(disconnect);
        Ok(Box::new(MockHandle(native.clone())))
    }
}
