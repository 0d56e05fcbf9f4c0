use std::ptr::{self, null};

use core_foundation::{
    base::{CFType, TCFType},
    number::CFNumber,
    string::CFString,
    ConcreteCFType,
};
use core_foundation_sys::{
    base::{kCFAllocatorDefault, CFIndex, CFRelease, CFRetain, CFTypeRef},
    runloop::{kCFRunLoopDefaultMode, CFRunLoopRef},
    set::{CFSetGetCount, CFSetGetValues},
};
use log::{debug, error};

use super::{check_io_return, iohid_c::*};
use crate::{Error, ErrorKind, ReportType};

/// An open `IOHIDManager` matching every HID device.
pub(crate) struct HidManager(IOHIDManagerRef);

unsafe impl Send for HidManager {}
unsafe impl Sync for HidManager {}

impl HidManager {
    pub fn open() -> Result<HidManager, Error> {
        let raw = unsafe { IOHIDManagerCreate(kCFAllocatorDefault, kIOHIDOptionsTypeNone) };
        if raw.is_null() {
            return Err(Error::new(
                ErrorKind::NoResources,
                "hid: failed to create HID manager",
            ));
        }
        let manager = HidManager(raw);

        unsafe { IOHIDManagerSetDeviceMatching(manager.0, null()) };

        // Fails with kIOReturnNotPrivileged when input monitoring is not
        // allowed, but the devices are still listed
        if let Err(e) = check_io_return(unsafe { IOHIDManagerOpen(manager.0, kIOHIDOptionsTypeNone) })
        {
            debug!("IOHIDManagerOpen: {e}");
        }

        Ok(manager)
    }

    /// Copy the current set of matched devices.
    pub fn devices(&self) -> Vec<HidDevice> {
        unsafe {
            let set = IOHIDManagerCopyDevices(self.0);
            if set.is_null() {
                return Vec::new();
            }

            let count = CFSetGetCount(set).max(0) as usize;
            let mut values: Vec<*const std::ffi::c_void> = vec![ptr::null(); count];
            CFSetGetValues(set, values.as_mut_ptr());

            let devices = values
                .into_iter()
                .filter(|v| !v.is_null())
                .map(|v| HidDevice::retain(v as IOHIDDeviceRef))
                .collect();

            CFRelease(set as CFTypeRef);
            devices
        }
    }
}

impl Drop for HidManager {
    fn drop(&mut self) {
        unsafe {
            IOHIDManagerClose(self.0, kIOHIDOptionsTypeNone);
            CFRelease(self.0 as CFTypeRef);
        }
    }
}

/// A retained `IOHIDDeviceRef`.
pub(crate) struct HidDevice(IOHIDDeviceRef);

unsafe impl Send for HidDevice {}
unsafe impl Sync for HidDevice {}

impl HidDevice {
    // Safety: `raw` must be a valid IOHIDDeviceRef. It is retained, not taken.
    unsafe fn retain(raw: IOHIDDeviceRef) -> HidDevice {
        CFRetain(raw as CFTypeRef);
        HidDevice(raw)
    }

    pub fn get(&self) -> IOHIDDeviceRef {
        self.0
    }

    fn get_property<T: ConcreteCFType>(&self, property: &'static str) -> Option<T> {
        unsafe {
            let key = CFString::from_static_string(property);
            let raw = IOHIDDeviceGetProperty(self.0, key.as_concrete_TypeRef());
            if raw.is_null() {
                return None;
            }

            let res = CFType::wrap_under_get_rule(raw).downcast_into();
            if res.is_none() {
                error!("Failed to convert device property `{property}`");
            }
            res
        }
    }

    pub fn string_property(&self, property: &'static str) -> Option<String> {
        self.get_property::<CFString>(property).map(|s| s.to_string())
    }

    pub fn integer_property(&self, property: &'static str) -> Option<i64> {
        self.get_property::<CFNumber>(property)
            .and_then(|n| n.to_i64())
    }

    pub fn open(&self, options: IOOptionBits) -> Result<(), Error> {
        check_io_return(unsafe { IOHIDDeviceOpen(self.0, options) })
    }

    pub fn close(&self, options: IOOptionBits) -> Result<(), Error> {
        check_io_return(unsafe { IOHIDDeviceClose(self.0, options) })
    }

    pub fn set_report(&self, report_type: ReportType, report_id: u8, data: &[u8]) -> Result<(), Error> {
        check_io_return(unsafe {
            IOHIDDeviceSetReport(
                self.0,
                native_report_type(report_type),
                report_id as CFIndex,
                data.as_ptr(),
                data.len() as CFIndex,
            )
        })
    }

    pub fn get_report(
        &self,
        report_type: ReportType,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        let mut len = buf.len() as CFIndex;
        check_io_return(unsafe {
            IOHIDDeviceGetReport(
                self.0,
                native_report_type(report_type),
                report_id as CFIndex,
                buf.as_mut_ptr(),
                &mut len,
            )
        })?;
        Ok((len.max(0) as usize).min(buf.len()))
    }

    pub fn schedule(&self, runloop: CFRunLoopRef) {
        unsafe { IOHIDDeviceScheduleWithRunLoop(self.0, runloop, kCFRunLoopDefaultMode) }
    }
}

impl Drop for HidDevice {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as CFTypeRef) }
    }
}

fn native_report_type(report_type: ReportType) -> IOHIDReportType {
    match report_type {
        ReportType::Input => kIOHIDReportTypeInput,
        ReportType::Output => kIOHIDReportTypeOutput,
        ReportType::Feature => kIOHIDReportTypeFeature,
    }
}
