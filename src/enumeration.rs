use crate::{Device, Error, ReportLengths};

/// Information about a device that can be obtained without opening it.
///
/// Found in the results of [`crate::devices`] and the query functions. A
/// `DeviceInfo` is a snapshot: it is never updated, and it goes stale when the
/// device is unplugged.
///
/// ### Platform-specific notes
///
/// The [`path`][`DeviceInfo::path`] is opaque and only meaningful to
/// [`crate::by_path`] and [`DeviceInfo::open`] on the same machine:
///  * Linux: the `/dev/hidrawN` node.
///  * Windows: the device interface path.
///  * macOS: `{transport}_{vid}_{pid}_{location}`, since IOKit has no stable
///    path string for HID devices.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DeviceInfo {
    pub(crate) path: String,

    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) version_number: u16,

    pub(crate) manufacturer: String,
    pub(crate) product: String,
    pub(crate) serial_number: String,

    pub(crate) report_lengths: ReportLengths,
}

impl DeviceInfo {
    /// Platform-specific identifier for the connection, used to find the
    /// device again.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The 16-bit number identifying the device's vendor.
    #[doc(alias = "idVendor")]
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// The 16-bit number identifying the product.
    #[doc(alias = "idProduct")]
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// The device release number, normally encoded as BCD.
    #[doc(alias = "bcdDevice")]
    pub fn version_number(&self) -> u16 {
        self.version_number
    }

    /// Manufacturer string, or empty if the device or OS doesn't expose one.
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Product string, or empty if the device or OS doesn't expose one.
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Serial number string, or empty if the device or OS doesn't expose one.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Length in bytes of the longest input report, including the report
    /// number byte. 0 if not declared.
    pub fn input_report_length(&self) -> u16 {
        self.report_lengths.input
    }

    /// Length in bytes of the longest output report, including the report
    /// number byte. 0 if not declared.
    pub fn output_report_length(&self) -> u16 {
        self.report_lengths.output
    }

    /// Length in bytes of the longest feature report, including the report
    /// number byte. 0 if not declared.
    pub fn feature_report_length(&self) -> u16 {
        self.report_lengths.feature
    }

    /// All three report lengths.
    pub fn report_lengths(&self) -> ReportLengths {
        self.report_lengths
    }

    /// Open the device for reading and writing reports.
    ///
    /// The device is looked up again by path, so this fails with
    /// [`ErrorKind::NotFound`][`crate::ErrorKind::NotFound`] if it was
    /// unplugged since enumeration.
    ///
    /// ### Platform-specific notes
    ///
    /// Opening claims the device exclusively. A second open of the same
    /// device, from this or another process, fails with
    /// [`ErrorKind::ExclusiveAccess`][`crate::ErrorKind::ExclusiveAccess`]
    /// until the first handle is closed.
    ///  * macOS seizes the device from other clients, including the OS.
    ///  * Windows denies write sharing.
    ///  * Linux takes an advisory lock on the hidraw node, which other
    ///    programs using hidraw directly may ignore.
    pub fn open(&self) -> Result<Device, Error> {
        Device::open(&**crate::platform_backend(), self)
    }
}

// Not derived so that we can format some fields in hex
impl std::fmt::Debug for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInfo")
            .field("path", &self.path)
            .field("vendor_id", &format_args!("0x{:04X}", self.vendor_id))
            .field("product_id", &format_args!("0x{:04X}", self.product_id))
            .field(
                "version_number",
                &format_args!("0x{:04X}", self.version_number),
            )
            .field("manufacturer", &self.manufacturer)
            .field("product", &self.product)
            .field("serial_number", &self.serial_number)
            .field("input_report_length", &self.report_lengths.input)
            .field("output_report_length", &self.report_lengths.output)
            .field("feature_report_length", &self.report_lengths.feature)
            .finish()
    }
}

#[test]
fn test_debug_hex_ids() {
    let info = DeviceInfo {
        path: "/dev/hidraw3".into(),
        vendor_id: 0x046d,
        product_id: 0xc52b,
        version_number: 0x1201,
        manufacturer: "Logitech".into(),
        product: "USB Receiver".into(),
        serial_number: String::new(),
        report_lengths: ReportLengths {
            input: 8,
            output: 0,
            feature: 20,
        },
    };
    let s = format!("{info:?}");
    assert!(s.contains("vendor_id: 0x046D"));
    assert!(s.contains("product_id: 0xC52B"));
    assert!(s.contains("feature_report_length: 20"));
    assert_eq!(info.feature_report_length(), 20);
    assert_eq!(info.serial_number(), "");
}
