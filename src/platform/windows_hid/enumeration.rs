use std::{ffi::c_void, mem, ops::ControlFlow, os::windows::prelude::OwnedHandle};

use log::{debug, warn};
use windows_sys::{
    core::GUID,
    Win32::{
        Devices::{
            HumanInterfaceDevice::{
                HidD_FreePreparsedData, HidD_GetAttributes, HidD_GetManufacturerString,
                HidD_GetPreparsedData, HidD_GetProductString, HidD_GetSerialNumberString,
                HidP_GetCaps, HIDD_ATTRIBUTES, HIDP_CAPS, HIDP_STATUS_SUCCESS,
                PHIDP_PREPARSED_DATA,
            },
        },
        Foundation::{BOOLEAN, HANDLE},
        Storage::FileSystem::{FILE_SHARE_READ, FILE_SHARE_WRITE},
    },
};

use super::{
    setupapi::HidInterfaceSet,
    util::{create_file, from_wide_buffer, raw_handle},
    win32_error,
};
use crate::{DeviceInfo, Error, ReportLengths};

pub(super) fn enumerate(
    hid_guid: GUID,
    visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>,
) -> Result<(), Error> {
    let set = HidInterfaceSet::present(hid_guid).map_err(|e| win32_error(e).log_error())?;

    for path in set.paths() {
        let info = match probe_device(path) {
            Ok(info) => info,
            Err(e) => {
                warn!("{e}; ignoring device");
                continue;
            }
        };
        if visit(info).is_break() {
            break;
        }
    }
    Ok(())
}

fn probe_device(path: String) -> Result<DeviceInfo, Error> {
    debug!("Probing device {path}");

    // no access rights needed for attributes and strings, and other
    // processes may have the device open
    let handle = create_file(path.as_ref(), 0, FILE_SHARE_READ | FILE_SHARE_WRITE)
        .map_err(win32_error)?;

    let mut attrs: HIDD_ATTRIBUTES = unsafe { mem::zeroed() };
    attrs.Size = mem::size_of::<HIDD_ATTRIBUTES>() as u32;
    if unsafe { HidD_GetAttributes(raw_handle(&handle), &mut attrs) } == 0 {
        debug!("HidD_GetAttributes failed for {path}");
    }

    Ok(DeviceInfo {
        vendor_id: attrs.VendorID,
        product_id: attrs.ProductID,
        version_number: attrs.VersionNumber,
        manufacturer: hid_string(&handle, HidD_GetManufacturerString),
        product: hid_string(&handle, HidD_GetProductString),
        serial_number: hid_string(&handle, HidD_GetSerialNumberString),
        report_lengths: report_lengths(&handle),
        path,
    })
}

type StringGetter = unsafe extern "system" fn(HANDLE, *mut c_void, u32) -> BOOLEAN;

fn hid_string(handle: &OwnedHandle, get: StringGetter) -> String {
    let mut buf = [0u16; 256];
    let r = unsafe {
        get(
            raw_handle(handle),
            buf.as_mut_ptr().cast(),
            mem::size_of_val(&buf) as u32,
        )
    };
    if r == 0 {
        return String::new();
    }
    from_wide_buffer(&buf)
}

fn report_lengths(handle: &OwnedHandle) -> ReportLengths {
    unsafe {
        let mut preparsed: PHIDP_PREPARSED_DATA = mem::zeroed();
        if HidD_GetPreparsedData(raw_handle(handle), &mut preparsed) == 0 {
            debug!("HidD_GetPreparsedData failed; report lengths unknown");
            return ReportLengths::default();
        }

        let mut caps: HIDP_CAPS = mem::zeroed();
        let lengths = if HidP_GetCaps(preparsed, &mut caps) == HIDP_STATUS_SUCCESS {
            ReportLengths {
                input: caps.InputReportByteLength,
                output: caps.OutputReportByteLength,
                feature: caps.FeatureReportByteLength,
            }
        } else {
            ReportLengths::default()
        };

        HidD_FreePreparsedData(preparsed);
        lengths
    }
}
