use std::{
    ffi::c_void,
    mem,
    os::windows::prelude::{FromRawHandle, OwnedHandle, RawHandle},
    ptr::{null, null_mut},
};

use log::{debug, error};
use windows_sys::Win32::{
    Devices::HumanInterfaceDevice::HidD_SetFeature,
    Foundation::{GetLastError, ERROR_IO_PENDING, FALSE, GENERIC_READ, GENERIC_WRITE, TRUE},
    Storage::FileSystem::{WriteFile, FILE_SHARE_READ},
    System::{
        Threading::CreateEventW,
        IO::{DeviceIoControl, GetOverlappedResult, OVERLAPPED},
    },
};

use super::{
    util::{create_file, raw_handle},
    win32_error,
};
use crate::{
    platform::NativeDevice, report::frame, DeviceInfo, Error, ErrorKind, ReportLengths,
    ReportType,
};

// HID_OUT_CTL_CODE(104) and HID_OUT_CTL_CODE(100) from hidclass.h
const IOCTL_HID_GET_INPUT_REPORT: u32 = 0x000B_01A2;
const IOCTL_HID_GET_FEATURE: u32 = 0x000B_0192;

pub(crate) struct WindowsDevice {
    handle: OwnedHandle,
    path: String,
    report_lengths: ReportLengths,
}

impl WindowsDevice {
    pub(crate) fn open(info: &DeviceInfo) -> Result<WindowsDevice, Error> {
        debug!("Opening device {}", info.path);

        // denying write sharing makes the handle exclusive
        let handle = create_file(
            info.path.as_ref(),
            GENERIC_READ | GENERIC_WRITE,
            FILE_SHARE_READ,
        )
        .map_err(|e| {
            let err = win32_error(e);
            error!("Failed to open {}: {err}", info.path);
            err
        })?;

        Ok(WindowsDevice {
            handle,
            path: info.path.clone(),
            report_lengths: info.report_lengths,
        })
    }

    /// Start an overlapped operation with `start` and wait for it to finish,
    /// returning the number of bytes transferred.
    fn overlapped(&self, start: impl FnOnce(*mut OVERLAPPED) -> i32) -> Result<u32, Error> {
        let event = unsafe { CreateEventW(null(), TRUE, FALSE, null()) };
        if event.is_null() {
            return Err(win32_error(unsafe { GetLastError() }).log_error());
        }
        let event = unsafe { OwnedHandle::from_raw_handle(event as RawHandle) };

        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = raw_handle(&event);

        if start(&mut overlapped) == FALSE {
            let err = unsafe { GetLastError() };
            if err != ERROR_IO_PENDING {
                return Err(win32_error(err));
            }
        }

        let mut transferred = 0;
        let r = unsafe {
            GetOverlappedResult(
                raw_handle(&self.handle),
                &overlapped,
                &mut transferred,
                TRUE,
            )
        };
        if r == FALSE {
            return Err(win32_error(unsafe { GetLastError() }));
        }
        Ok(transferred)
    }

    /// Declared length of reports of this type, if any.
    fn declared_len(&self, report_type: ReportType) -> Option<usize> {
        let len = match report_type {
            ReportType::Input => self.report_lengths.input,
            ReportType::Output => self.report_lengths.output,
            ReportType::Feature => self.report_lengths.feature,
        };
        (len > 0).then_some(len as usize)
    }
}

impl NativeDevice for WindowsDevice {
    fn set_report(&self, report_type: ReportType, report_id: u8, data: &[u8]) -> Result<(), Error> {
        // the HID class driver rejects reports that aren't exactly the
        // declared length
        let report = frame(report_id, data, self.declared_len(report_type));

        match report_type {
            ReportType::Output => {
                let written = self.overlapped(|overlapped| unsafe {
                    WriteFile(
                        raw_handle(&self.handle),
                        report.as_ptr(),
                        report.len() as u32,
                        null_mut(),
                        overlapped,
                    )
                })?;
                if written as usize != report.len() {
                    debug!("Wrote {written} of {} bytes to {}", report.len(), self.path);
                    return Err(Error::write_mismatch());
                }
                Ok(())
            }
            ReportType::Feature => {
                let r = unsafe {
                    HidD_SetFeature(
                        raw_handle(&self.handle),
                        report.as_ptr() as *const c_void,
                        report.len() as u32,
                    )
                };
                if r == 0 {
                    return Err(win32_error(unsafe { GetLastError() }));
                }
                Ok(())
            }
            ReportType::Input => Err(Error::new(
                ErrorKind::InvalidArgument,
                "hid: input reports can't be sent",
            )),
        }
    }

    fn get_report(
        &self,
        report_type: ReportType,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        let ioctl = match report_type {
            ReportType::Input => IOCTL_HID_GET_INPUT_REPORT,
            ReportType::Feature => IOCTL_HID_GET_FEATURE,
            ReportType::Output => {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    "hid: output reports can't be read",
                ))
            }
        };

        // the driver returns the report number first, 0 included, and
        // needs room for the whole declared report
        let prefix = usize::from(report_id == 0);
        let len = (buf.len() + prefix).max(self.declared_len(report_type).unwrap_or(0));
        let mut report = vec![0u8; len];
        report[0] = report_id;
        if prefix == 0 {
            report[..buf.len()].copy_from_slice(buf);
        }

        let ptr = report.as_mut_ptr() as *mut c_void;
        let read = self.overlapped(|overlapped| unsafe {
            DeviceIoControl(
                raw_handle(&self.handle),
                ioctl,
                ptr,
                len as u32,
                ptr,
                len as u32,
                null_mut(),
                overlapped,
            )
        })?;

        let read = (read as usize).min(len);
        let n = read.saturating_sub(prefix).min(buf.len());
        buf[..n].copy_from_slice(&report[prefix..prefix + n]);
        Ok(n)
    }
}

impl Drop for WindowsDevice {
    fn drop(&mut self) {
        debug!("Closing device {}", self.path);
    }
}
