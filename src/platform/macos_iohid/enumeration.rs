use std::ops::ControlFlow;

use log::debug;

use super::iohid::{HidDevice, HidManager};
use crate::{DeviceInfo, Error, ReportLengths};

pub(super) fn enumerate(visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>) -> Result<(), Error> {
    let manager = HidManager::open()?;

    for device in manager.devices() {
        if visit(probe_device(&device)).is_break() {
            break;
        }
    }
    Ok(())
}

/// Find the device at `path`, returning it along with the manager that
/// must stay open while it is in use.
pub(super) fn find_device(path: &str) -> Result<(HidManager, HidDevice), Error> {
    let manager = HidManager::open()?;
    let device = manager
        .devices()
        .into_iter()
        .find(|device| device_path_of(device) == path)
        .ok_or_else(Error::not_found)?;
    Ok((manager, device))
}

fn probe_device(device: &HidDevice) -> DeviceInfo {
    let path = device_path_of(device);
    debug!("Probing device {path}");

    let int = |property| device.integer_property(property).unwrap_or(0);
    let string = |property| device.string_property(property).unwrap_or_default();

    DeviceInfo {
        vendor_id: int("VendorID") as u16,
        product_id: int("ProductID") as u16,
        version_number: int("VersionNumber") as u16,
        manufacturer: string("Manufacturer"),
        product: string("Product"),
        serial_number: string("SerialNumber"),
        report_lengths: ReportLengths {
            input: int("MaxInputReportSize") as u16,
            output: int("MaxOutputReportSize") as u16,
            feature: int("MaxFeatureReportSize") as u16,
        },
        path,
    }
}

fn device_path_of(device: &HidDevice) -> String {
    device_path(
        &device.string_property("Transport").unwrap_or_default(),
        device.integer_property("VendorID").unwrap_or(0) as u16,
        device.integer_property("ProductID").unwrap_or(0) as u16,
        device.integer_property("LocationID").unwrap_or(0) as u32,
    )
}

/// IOKit has no device node paths, so identify a device by its transport,
/// IDs and location.
fn device_path(transport: &str, vendor_id: u16, product_id: u16, location_id: u32) -> String {
    format!("{transport}_{vendor_id:04x}_{product_id:04x}_{location_id:08x}")
}

#[test]
fn test_device_path() {
    assert_eq!(
        device_path("USB", 0x1209, 0x0001, 0x14200000),
        "USB_1209_0001_14200000"
    );
    assert_eq!(device_path("", 0, 0, 0), "_0000_0000_00000000");
}
