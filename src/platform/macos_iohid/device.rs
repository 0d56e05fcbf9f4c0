use std::{ffi::c_void, ptr};

use io_kit_sys::ret::IOReturn;
use log::{debug, error};

use super::{
    enumeration::find_device,
    events::{schedule_device, EventRegistration},
    iohid::{HidDevice, HidManager},
    iohid_c::{kIOHIDOptionsTypeSeizeDevice, IOHIDDeviceRegisterRemovalCallback},
};
use crate::{
    device::DisconnectNotifier, platform::NativeDevice, DeviceInfo, Error, ReportType,
};

pub(crate) struct MacDevice {
    device: HidDevice,
    events: Option<EventRegistration>,

    /// Context of the removal callback, owned by this struct.
    removal: *mut DisconnectNotifier,

    path: String,

    // Devices from a manager are only usable while it stays open
    _manager: HidManager,
}

unsafe impl Send for MacDevice {}
unsafe impl Sync for MacDevice {}

impl MacDevice {
    /// Open the device at `info.path`. Must be called with the enumeration
    /// lock held.
    pub(crate) fn open(info: &DeviceInfo, disconnect: DisconnectNotifier) -> Result<MacDevice, Error> {
        let (manager, device) = find_device(&info.path)?;

        device.open(kIOHIDOptionsTypeSeizeDevice).map_err(|e| {
            error!("IOHIDDeviceOpen failed for {}: {e}", info.path);
            e
        })?;

        let removal = Box::into_raw(Box::new(disconnect));
        unsafe {
            IOHIDDeviceRegisterRemovalCallback(device.get(), Some(device_removed), removal.cast())
        };
        let events = schedule_device(&device);

        Ok(MacDevice {
            device,
            events,
            removal,
            path: info.path.clone(),
            _manager: manager,
        })
    }
}

unsafe extern "C" fn device_removed(context: *mut c_void, _result: IOReturn, _sender: *mut c_void) {
    // Notifying may drop the `MacDevice` that owns `context`
    let notifier = unsafe { (*(context as *const DisconnectNotifier)).clone() };
    debug!("Removal callback fired");
    notifier.notify();
}

impl NativeDevice for MacDevice {
    fn set_report(&self, report_type: ReportType, report_id: u8, data: &[u8]) -> Result<(), Error> {
        self.device.set_report(report_type, report_id, data)
    }

    fn get_report(
        &self,
        report_type: ReportType,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        self.device.get_report(report_type, report_id, buf)
    }
}

impl Drop for MacDevice {
    fn drop(&mut self) {
        debug!("Closing device {}", self.path);
        unsafe { IOHIDDeviceRegisterRemovalCallback(self.device.get(), None, ptr::null_mut()) };
        drop(self.events.take());

        if let Err(e) = self.device.close(kIOHIDOptionsTypeSeizeDevice) {
            debug!("IOHIDDeviceClose for {}: {e}", self.path);
        }

        drop(unsafe { Box::from_raw(self.removal) });
    }
}
