//! Report number framing shared by every backend.
//!
//! Callers always see buffers prefixed with the report number. Devices that
//! don't use numbered reports use report number 0, and that byte is not part
//! of the data on the wire: it is stripped before writing, and a read for
//! report 0 fills the buffer after it and puts the 0 back.

use std::borrow::Cow;

use crate::{platform::NativeDevice, Error, ErrorKind};

/// HID report type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReportType {
    /// Device-to-host report.
    Input,

    /// Host-to-device report.
    Output,

    /// Configuration report, readable and writable over the control pipe.
    Feature,
}

/// Send `buf` as a report of type `report_type`.
///
/// `buf[0]` is the report number. An empty buffer is rejected without
/// calling into the backend.
pub(crate) fn write_report(
    native: &dyn NativeDevice,
    report_type: ReportType,
    buf: &[u8],
) -> Result<(), Error> {
    let Some((&report_id, rest)) = buf.split_first() else {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            "hid: report buffer is empty",
        ));
    };

    let data = if report_id == 0 { rest } else { buf };
    native.set_report(report_type, report_id, data)
}

/// Fetch a report of type `report_type` into `buf`.
///
/// `buf[0]` selects the report number. The returned length includes the
/// report number byte. An empty buffer reads nothing and returns 0.
pub(crate) fn read_report(
    native: &dyn NativeDevice,
    report_type: ReportType,
    buf: &mut [u8],
) -> Result<usize, Error> {
    let Some(&report_id) = buf.first() else {
        return Ok(0);
    };

    if report_id == 0 {
        let len = native.get_report(report_type, 0, &mut buf[1..])?;
        buf[0] = 0;
        Ok(len + 1)
    } else {
        native.get_report(report_type, report_id, buf)
    }
}

/// Rebuild the report-number-prefixed wire format for OS interfaces that
/// always expect it, from the `(report_id, data)` pair passed to
/// [`NativeDevice::set_report`].
///
/// When `len` is `Some`, the result is zero-padded or truncated to exactly
/// that many bytes.
#[cfg_attr(
    any(
        feature = "disabled",
        not(any(target_os = "linux", target_os = "android", target_os = "windows"))
    ),
    allow(dead_code)
)]
pub(crate) fn frame(report_id: u8, data: &[u8], len: Option<usize>) -> Cow<'_, [u8]> {
    let framed: Cow<[u8]> = if report_id == 0 {
        let mut v = Vec::with_capacity(data.len() + 1);
        v.push(0);
        v.extend_from_slice(data);
        Cow::Owned(v)
    } else {
        Cow::Borrowed(data)
    };

    match len {
        Some(len) if len != framed.len() => {
            let mut v = framed.into_owned();
            v.resize(len, 0);
            Cow::Owned(v)
        }
        _ => framed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockDevice, NativeCall};

    #[test]
    fn test_write_unnumbered_strips_report_number() {
        let native = MockDevice::new();
        write_report(&native, ReportType::Output, &[0, 1, 2, 3]).unwrap();
        assert_eq!(
            native.calls(),
            vec![NativeCall::SetReport(ReportType::Output, 0, vec![1, 2, 3])]
        );
    }

    #[test]
    fn test_write_numbered_keeps_report_number() {
        let native = MockDevice::new();
        write_report(&native, ReportType::Feature, &[5, 1, 2]).unwrap();
        assert_eq!(
            native.calls(),
            vec![NativeCall::SetReport(ReportType::Feature, 5, vec![5, 1, 2])]
        );
    }

    #[test]
    fn test_write_empty_is_rejected() {
        let native = MockDevice::new();
        let err = write_report(&native, ReportType::Output, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(native.calls().is_empty());
    }

    #[test]
    fn test_read_unnumbered_restores_report_number() {
        let native = MockDevice::new();
        native.queue_report(&[0xAA, 0xBB, 0xCC]);

        let mut buf = [0u8; 8];
        let len = read_report(&native, ReportType::Input, &mut buf).unwrap();

        assert_eq!(len, 4);
        assert_eq!(&buf[..len], &[0, 0xAA, 0xBB, 0xCC]);
        assert_eq!(
            native.calls(),
            vec![NativeCall::GetReport(ReportType::Input, 0, 7)]
        );
    }

    #[test]
    fn test_read_numbered_passes_whole_buffer() {
        let native = MockDevice::new();
        native.queue_report(&[3, 0x10, 0x20]);

        let mut buf = [3u8, 0, 0, 0];
        let len = read_report(&native, ReportType::Feature, &mut buf).unwrap();

        assert_eq!(len, 3);
        assert_eq!(&buf[..len], &[3, 0x10, 0x20]);
        assert_eq!(
            native.calls(),
            vec![NativeCall::GetReport(ReportType::Feature, 3, 4)]
        );
    }

    #[test]
    fn test_read_empty_buffer_does_not_call_native() {
        let native = MockDevice::new();
        assert_eq!(read_report(&native, ReportType::Input, &mut []).unwrap(), 0);
        assert!(native.calls().is_empty());
    }

    #[test]
    fn test_frame_prepends_zero_and_pads() {
        assert_eq!(&*frame(0, &[1, 2], None), &[0, 1, 2]);
        assert_eq!(&*frame(0, &[1, 2], Some(5)), &[0, 1, 2, 0, 0]);
        assert_eq!(&*frame(7, &[7, 1, 2, 3], Some(2)), &[7, 1]);
        assert!(matches!(frame(7, &[7, 1], None), Cow::Borrowed(_)));
    }
}
