//! Listing HID device interface paths through SetupAPI.

use std::{
    mem::{self, offset_of, size_of},
    ptr::{addr_of_mut, null, null_mut},
    slice,
};

use log::{debug, error};
use windows_sys::{
    core::GUID,
    Win32::{
        Devices::{
            DeviceAndDriverInstallation::{
                SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInterfaces, SetupDiGetClassDevsW,
                SetupDiGetDeviceInterfaceDetailW, SetupDiGetDevicePropertyW,
                DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO, SP_DEVICE_INTERFACE_DATA,
                SP_DEVICE_INTERFACE_DETAIL_DATA_W, SP_DEVINFO_DATA,
            },
            Properties::{
                DEVPKEY_Device_Class, DEVPKEY_Device_Driver, DEVPROPKEY, DEVPROPTYPE,
                DEVPROP_TYPE_STRING,
            },
        },
        Foundation::{GetLastError, FALSE, INVALID_HANDLE_VALUE, WIN32_ERROR},
    },
};

use super::util::from_wide_buffer;

/// The present devices exposing the HID interface class, as returned by
/// [`SetupDiGetClassDevsW`].
pub struct HidInterfaceSet {
    handle: HDEVINFO,
    hid_guid: GUID,
}

impl HidInterfaceSet {
    pub fn present(hid_guid: GUID) -> Result<HidInterfaceSet, WIN32_ERROR> {
        let handle = unsafe {
            SetupDiGetClassDevsW(
                &hid_guid,
                null(),
                null_mut(),
                DIGCF_DEVICEINTERFACE | DIGCF_PRESENT,
            )
        };
        if handle as isize == INVALID_HANDLE_VALUE as isize {
            return Err(unsafe { GetLastError() });
        }
        Ok(HidInterfaceSet { handle, hid_guid })
    }

    /// Paths of the interfaces whose device can be opened, in SetupAPI order.
    pub fn paths(&self) -> HidInterfacePaths<'_> {
        HidInterfacePaths {
            set: self,
            index: 0,
        }
    }

    /// Look up the interface's device path, filling `device` with the
    /// device it belongs to.
    fn interface_path(
        &self,
        interface: &SP_DEVICE_INTERFACE_DATA,
        device: &mut SP_DEVINFO_DATA,
    ) -> Option<String> {
        let mut required: u32 = 0;
        unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.handle,
                interface,
                null_mut(),
                0,
                &mut required,
                null_mut(),
            )
        };

        let header = size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>();
        if (required as usize) < header {
            error!("SetupDiGetDeviceInterfaceDetailW unexpected required size {required}");
            return None;
        }

        // u32 words keep the detail struct aligned
        let mut buf = vec![0u32; (required as usize).div_ceil(size_of::<u32>())];
        let detail = buf.as_mut_ptr().cast::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>();

        // cbSize is the size of the fixed part, not of the buffer
        unsafe { addr_of_mut!((*detail).cbSize).write(header as u32) };

        let r = unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.handle,
                interface,
                detail,
                required,
                null_mut(),
                device,
            )
        };
        if r == FALSE {
            error!("SetupDiGetDeviceInterfaceDetailW failed: {}", unsafe {
                GetLastError()
            });
            return None;
        }

        let offset = offset_of!(SP_DEVICE_INTERFACE_DETAIL_DATA_W, DevicePath);
        let path = unsafe {
            slice::from_raw_parts(
                detail.cast::<u8>().add(offset).cast::<u16>(),
                (required as usize - offset) / size_of::<u16>(),
            )
        };
        Some(from_wide_buffer(path))
    }

    fn device_string_property(&self, device: &SP_DEVINFO_DATA, key: DEVPROPKEY) -> Option<String> {
        let mut property_type: DEVPROPTYPE = 0;
        let mut buf = [0u16; 256];
        let mut size: u32 = 0;

        let r = unsafe {
            SetupDiGetDevicePropertyW(
                self.handle,
                device,
                &key,
                &mut property_type,
                buf.as_mut_ptr().cast(),
                mem::size_of_val(&buf) as u32,
                &mut size,
                0,
            )
        };
        (r != FALSE && property_type == DEVPROP_TYPE_STRING).then(|| from_wide_buffer(&buf))
    }

    /// Devices outside the `HIDClass` setup class, or with no driver bound,
    /// can't be opened.
    fn is_bound_hid_device(&self, device: &SP_DEVINFO_DATA) -> bool {
        let class = self.device_string_property(device, DEVPKEY_Device_Class);
        if class.as_deref() != Some("HIDClass") {
            debug!("Skipping device of class {class:?}");
            return false;
        }
        self.device_string_property(device, DEVPKEY_Device_Driver)
            .is_some()
    }
}

impl Drop for HidInterfaceSet {
    fn drop(&mut self) {
        unsafe {
            SetupDiDestroyDeviceInfoList(self.handle);
        }
    }
}

pub struct HidInterfacePaths<'a> {
    set: &'a HidInterfaceSet,
    index: u32,
}

impl Iterator for HidInterfacePaths<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let mut interface: SP_DEVICE_INTERFACE_DATA = unsafe { mem::zeroed() };
            interface.cbSize = size_of::<SP_DEVICE_INTERFACE_DATA>() as u32;

            let r = unsafe {
                SetupDiEnumDeviceInterfaces(
                    self.set.handle,
                    null(),
                    &self.set.hid_guid,
                    self.index,
                    &mut interface,
                )
            };
            if r == FALSE {
                return None;
            }
            self.index += 1;

            let mut device: SP_DEVINFO_DATA = unsafe { mem::zeroed() };
            device.cbSize = size_of::<SP_DEVINFO_DATA>() as u32;

            let Some(path) = self.set.interface_path(&interface, &mut device) else {
                continue;
            };
            if self.set.is_bound_hid_device(&device) {
                return Some(path);
            }
        }
    }
}

#[test]
fn test_present_hid_interface_paths() {
    use windows_sys::Win32::Devices::HumanInterfaceDevice::HidD_GetHidGuid;

    let mut hid_guid: GUID = unsafe { mem::zeroed() };
    unsafe { HidD_GetHidGuid(&mut hid_guid) };

    let set = HidInterfaceSet::present(hid_guid).unwrap();
    let paths: Vec<String> = set.paths().collect();
    for path in &paths {
        assert!(path.starts_with(r"\\?\"), "{path}");
        assert!(!path.contains('\0'));
    }

    let mut unique = paths.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), paths.len());
}
