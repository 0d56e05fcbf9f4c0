//! Wrappers for the [hidraw] feature report ioctls, translated from the
//! [C definitions][uapi].
//!
//! [hidraw]: https://www.kernel.org/doc/html/latest/hid/hidraw.html
//! [uapi]: https://github.com/torvalds/linux/blob/master/include/uapi/linux/hidraw.h
use std::ffi::c_void;

use rustix::{
    fd::AsFd,
    io,
    ioctl::{self, Direction, Ioctl, IoctlOutput, Opcode},
};

// We repeat the HIDIOC prefix to help keep the same names as what linux uses.
#[allow(non_snake_case)]
mod opcodes {
    use super::*;

    /// `HIDIOCSFEATURE(len)`
    pub const fn HIDIOCSFEATURE(len: usize) -> Opcode {
        ioctl::opcode::from_components(Direction::ReadWrite, b'H', 0x06, len)
    }

    /// `HIDIOCGFEATURE(len)`
    pub const fn HIDIOCGFEATURE(len: usize) -> Opcode {
        ioctl::opcode::from_components(Direction::ReadWrite, b'H', 0x07, len)
    }
}

/// An ioctl whose argument is a report buffer and whose opcode encodes the
/// buffer length, so it can't be a const generic like rustix's `Setter`.
struct ReportBuffer<'a> {
    opcode: Opcode,
    buf: &'a mut [u8],
}

unsafe impl Ioctl for ReportBuffer<'_> {
    /// Number of bytes transferred, including the report number.
    type Output = usize;

    const IS_MUTATING: bool = true;

    fn opcode(&self) -> Opcode {
        self.opcode
    }

    fn as_ptr(&mut self) -> *mut c_void {
        self.buf.as_mut_ptr() as *mut c_void
    }

    unsafe fn output_from_ptr(out: IoctlOutput, _: *mut c_void) -> io::Result<usize> {
        Ok(out as usize)
    }
}

/// Send a feature report. `report[0]` is the report number, 0 for devices
/// without numbered reports.
pub fn set_feature<Fd: AsFd>(fd: Fd, report: &mut [u8]) -> io::Result<usize> {
    unsafe {
        let ctl = ReportBuffer {
            opcode: opcodes::HIDIOCSFEATURE(report.len()),
            buf: report,
        };
        ioctl::ioctl(fd, ctl)
    }
}

/// Fetch the feature report selected by `report[0]` into `report`. The
/// report number stays at `report[0]`.
pub fn get_feature<Fd: AsFd>(fd: Fd, report: &mut [u8]) -> io::Result<usize> {
    unsafe {
        let ctl = ReportBuffer {
            opcode: opcodes::HIDIOCGFEATURE(report.len()),
            buf: report,
        };
        ioctl::ioctl(fd, ctl)
    }
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
#[test]
fn test_opcodes() {
    // values from <linux/hidraw.h>
    assert_eq!(opcodes::HIDIOCSFEATURE(9) as u32, 0xC0094806);
    assert_eq!(opcodes::HIDIOCGFEATURE(65) as u32, 0xC0414807);
}
