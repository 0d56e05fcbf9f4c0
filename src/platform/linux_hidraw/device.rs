use log::{debug, error};
use rustix::{
    fd::OwnedFd,
    fs::{FlockOperation, Mode, OFlags},
    io::Errno,
};

use super::hidraw;
use crate::{
    platform::NativeDevice,
    report::frame,
    DeviceInfo, Error, ErrorKind, ReportType,
};

pub(crate) struct LinuxDevice {
    fd: OwnedFd,
    path: String,
}

impl LinuxDevice {
    pub(crate) fn open(info: &DeviceInfo) -> Result<LinuxDevice, Error> {
        debug!("Opening hidraw device {}", info.path);
        let fd = rustix::fs::open(&info.path, OFlags::RDWR | OFlags::CLOEXEC, Mode::empty())
            .map_err(|e| {
                error!("Failed to open {}: {e}", info.path);
                Error::from(e)
            })?;

        // hidraw nodes can be opened any number of times; the lock is what
        // makes the handle exclusive among cooperating processes
        match rustix::fs::flock(&fd, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => {}
            Err(Errno::WOULDBLOCK) => {
                return Err(Error::new_os(
                    ErrorKind::ExclusiveAccess,
                    "exclusive access and device already open",
                    Errno::WOULDBLOCK,
                )
                .log_debug());
            }
            Err(e) => return Err(Error::from(e).log_error()),
        }

        Ok(LinuxDevice {
            fd,
            path: info.path.clone(),
        })
    }
}

impl NativeDevice for LinuxDevice {
    fn set_report(&self, report_type: ReportType, report_id: u8, data: &[u8]) -> Result<(), Error> {
        // hidraw always takes the report number first, 0 included
        let written = match report_type {
            ReportType::Output => {
                let report = frame(report_id, data, None);
                let n = rustix::io::write(&self.fd, &report)?;
                (n, report.len())
            }
            ReportType::Feature => {
                let mut report = frame(report_id, data, None).into_owned();
                let n = hidraw::set_feature(&self.fd, &mut report)?;
                (n, report.len())
            }
            ReportType::Input => {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    "hid: input reports can't be sent",
                ))
            }
        };

        let (n, len) = written;
        check_written(n, len).inspect_err(|_| debug!("Wrote {n} of {len} bytes to {}", self.path))
    }

    fn get_report(
        &self,
        report_type: ReportType,
        report_id: u8,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        match report_type {
            // read() returns the next report as the device sent it, with the
            // report number only for numbered reports
            ReportType::Input => Ok(rustix::io::read(&self.fd, buf)?),
            ReportType::Feature if report_id == 0 => {
                let mut report = vec![0; buf.len() + 1];
                let n = hidraw::get_feature(&self.fd, &mut report)?;
                let n = n.saturating_sub(1).min(buf.len());
                buf[..n].copy_from_slice(&report[1..n + 1]);
                Ok(n)
            }
            ReportType::Feature => Ok(hidraw::get_feature(&self.fd, buf)?),
            ReportType::Output => Err(Error::new(
                ErrorKind::InvalidArgument,
                "hid: output reports can't be read",
            )),
        }
    }
}

/// A short or long write means the kernel didn't take the report as given.
fn check_written(written: usize, len: usize) -> Result<(), Error> {
    if written == len {
        Ok(())
    } else {
        Err(Error::write_mismatch())
    }
}

impl Drop for LinuxDevice {
    fn drop(&mut self) {
        // closing the fd releases the lock
        debug!("Closing hidraw device {}", self.path);
    }
}
