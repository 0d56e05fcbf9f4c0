use std::fs;
use std::io;
use std::num::ParseIntError;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, error, warn};
use rustix::io::Errno;

use crate::{DeviceInfo, Error, ReportLengths};

#[derive(Debug, Clone)]
pub struct SysfsPath(pub(crate) PathBuf);

#[derive(Debug)]
pub struct SysfsError(PathBuf, SysfsErrorKind);

#[derive(Debug)]
enum SysfsErrorKind {
    Io(io::Error),
    Parse(String),
}

impl std::fmt::Display for SysfsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to read sysfs attribute {}: ", self.0.display())?;
        match &self.1 {
            SysfsErrorKind::Io(e) => write!(f, "{e}"),
            SysfsErrorKind::Parse(v) => write!(f, "couldn't parse value {:?}", v.trim()),
        }
    }
}

impl std::error::Error for SysfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.1 {
            SysfsErrorKind::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl SysfsPath {
    fn parse_attr<T, E>(
        &self,
        attr: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Result<T, SysfsError> {
        let attr_path = self.0.join(attr);
        fs::read_to_string(&attr_path)
            .map_err(SysfsErrorKind::Io)
            .and_then(|v| parse(v.trim()).map_err(|_| SysfsErrorKind::Parse(v)))
            .map_err(|e| SysfsError(attr_path, e))
    }

    fn read_attr<T: FromStr>(&self, attr: &str) -> Result<T, SysfsError> {
        self.parse_attr(attr, |s| s.parse())
    }

    fn read_attr_hex(&self, attr: &str) -> Result<u16, SysfsError> {
        self.parse_attr(attr, |s| from_hex_str(s.strip_prefix("0x").unwrap_or(s)))
    }

    fn read_bytes(&self, attr: &str) -> Result<Vec<u8>, SysfsError> {
        let attr_path = self.0.join(attr);
        fs::read(&attr_path).map_err(|e| SysfsError(attr_path, SysfsErrorKind::Io(e)))
    }

    /// Follow a symlink such as `device` to the directory it names.
    fn link(&self, name: &str) -> Result<SysfsPath, SysfsError> {
        let link_path = self.0.join(name);
        fs::canonicalize(&link_path)
            .map(SysfsPath)
            .map_err(|e| SysfsError(link_path, SysfsErrorKind::Io(e)))
    }

    /// The closest ancestor that is a USB device, as opposed to one of its
    /// interfaces.
    fn usb_device(&self) -> Option<SysfsPath> {
        self.0
            .ancestors()
            .skip(1)
            .take(4)
            .find(|p| p.join("idVendor").is_file())
            .map(|p| SysfsPath(p.to_owned()))
    }
}

fn from_hex_str(s: &str) -> Result<u16, ParseIntError> {
    u16::from_str_radix(s, 16)
}

const BUS_USB: u16 = 0x03;

/// The fields of a HID device's `uevent` attribute that describe it.
#[derive(Debug, Default, PartialEq, Eq)]
struct HidUevent {
    bus: u16,
    vendor_id: u16,
    product_id: u16,
    name: String,
    uniq: String,
}

#[derive(Debug)]
struct InvalidUevent;

impl FromStr for HidUevent {
    type Err = InvalidUevent;

    /// Parse `KEY=value` lines, e.g. `HID_ID=0003:0000046D:0000C52B`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut uevent = HidUevent::default();
        let mut have_id = false;

        for line in s.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "HID_ID" => {
                    let ids: Vec<u32> = value
                        .split(':')
                        .map(|v| u32::from_str_radix(v, 16))
                        .collect::<Result<_, _>>()
                        .map_err(|_| InvalidUevent)?;
                    let [bus, vendor_id, product_id] = ids[..] else {
                        return Err(InvalidUevent);
                    };
                    uevent.bus = bus as u16;
                    uevent.vendor_id = vendor_id as u16;
                    uevent.product_id = product_id as u16;
                    have_id = true;
                }
                "HID_NAME" => uevent.name = value.to_owned(),
                "HID_UNIQ" => uevent.uniq = value.to_owned(),
                _ => {}
            }
        }

        if have_id {
            Ok(uevent)
        } else {
            Err(InvalidUevent)
        }
    }
}

/// Walk `class_dir` (normally `/sys/class/hidraw`) in node number order.
pub(super) fn enumerate(
    class_dir: &Path,
    dev_dir: &Path,
    visit: &mut dyn FnMut(DeviceInfo) -> ControlFlow<()>,
) -> Result<(), Error> {
    let entries = match fs::read_dir(class_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} does not exist, hidraw not loaded", class_dir.display());
            return Ok(());
        }
        Err(e) => {
            error!("Failed to list {}: {e}", class_dir.display());
            return Err(Errno::from_io_error(&e).unwrap_or(Errno::IO).into());
        }
    };

    let mut nodes: Vec<(u32, String)> = entries
        .filter_map(|entry| {
            let name = entry.ok()?.file_name().into_string().ok()?;
            let num = name.strip_prefix("hidraw")?.parse().ok()?;
            Some((num, name))
        })
        .collect();
    nodes.sort_unstable();

    for (_, name) in nodes {
        let node = SysfsPath(class_dir.join(&name));
        let info = match probe_device(&node, dev_dir.join(&name)) {
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

fn probe_device(node: &SysfsPath, dev_path: PathBuf) -> Result<DeviceInfo, SysfsError> {
    debug!("Probing device {:?}", node.0);

    let hid = node.link("device")?;
    let uevent: HidUevent = hid.read_attr("uevent")?;

    let report_lengths = match hid.read_bytes("report_descriptor") {
        Ok(desc) => ReportLengths::from_report_descriptor(&desc),
        Err(e) => {
            debug!("{e}; report lengths unknown");
            ReportLengths::default()
        }
    };

    let usb = if uevent.bus == BUS_USB {
        hid.usb_device()
    } else {
        None
    };

    let usb_string = |attr: &str| -> Option<String> {
        usb.as_ref()?
            .read_attr(attr)
            .inspect_err(|e| debug!("{e}"))
            .ok()
    };

    Ok(DeviceInfo {
        path: dev_path.to_string_lossy().into_owned(),
        vendor_id: uevent.vendor_id,
        product_id: uevent.product_id,
        version_number: usb
            .as_ref()
            .and_then(|u| u.read_attr_hex("bcdDevice").ok())
            .unwrap_or(0),
        manufacturer: usb_string("manufacturer").unwrap_or_default(),
        product: usb_string("product").unwrap_or(uevent.name),
        serial_number: usb_string("serial").unwrap_or(uevent.uniq),
        report_lengths,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        ops::ControlFlow,
        os::unix::fs::symlink,
        path::PathBuf,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use super::HidUevent;
    use crate::{
        directory::Devices,
        platform::{linux_hidraw::LinuxBackend, Backend},
        DeviceInfo,
    };

    #[test]
    fn test_parse_uevent() {
        let uevent: HidUevent = "DRIVER=hid-generic\n\
            HID_ID=0003:0000046D:0000C52B\n\
            HID_NAME=Logitech USB Receiver\n\
            HID_PHYS=usb-0000:00:14.0-2/input2\n\
            HID_UNIQ=\n\
            MODALIAS=hid:b0003g0000v0000046Dp0000C52B\n"
            .parse()
            .unwrap();
        assert_eq!(
            uevent,
            HidUevent {
                bus: 0x03,
                vendor_id: 0x046d,
                product_id: 0xc52b,
                name: "Logitech USB Receiver".into(),
                uniq: String::new(),
            }
        );

        assert!("HID_NAME=x\n".parse::<HidUevent>().is_err());
        assert!("HID_ID=0003:zzzz:0001\n".parse::<HidUevent>().is_err());
    }

    /// A throwaway copy of the sysfs layout for hidraw nodes.
    struct FakeSysfs(PathBuf);

    impl FakeSysfs {
        fn new() -> FakeSysfs {
            static N: AtomicUsize = AtomicUsize::new(0);
            let root = std::env::temp_dir().join(format!(
                "nhid-sysfs-{}-{}",
                std::process::id(),
                N.fetch_add(1, Ordering::SeqCst)
            ));
            fs::create_dir_all(root.join("class")).unwrap();
            FakeSysfs(root)
        }

        fn class_dir(&self) -> PathBuf {
            self.0.join("class")
        }

        fn add(&self, node: &str, hid_dir: &str, uevent: &str, usb: Option<&[(&str, &str)]>) {
            let usb_dir = self.0.join("devices/1-2");
            let hid = usb_dir.join("1-2:1.0").join(hid_dir);
            fs::create_dir_all(&hid).unwrap();
            fs::write(hid.join("uevent"), uevent).unwrap();
            // 8-byte unnumbered input and output reports
            fs::write(
                hid.join("report_descriptor"),
                [0x75, 0x08, 0x95, 0x08, 0x81, 0x02, 0x91, 0x02],
            )
            .unwrap();
            for (attr, value) in usb.unwrap_or_default() {
                fs::write(usb_dir.join(attr), format!("{value}\n")).unwrap();
            }

            let class = self.class_dir().join(node);
            fs::create_dir_all(&class).unwrap();
            symlink(&hid, class.join("device")).unwrap();
        }

        fn backend(&self) -> LinuxBackend {
            LinuxBackend::with_roots(self.class_dir(), PathBuf::from("/dev"))
        }

        fn list(&self) -> Vec<DeviceInfo> {
            let mut found = Vec::new();
            self.backend()
                .enumerate(&mut |info| {
                    found.push(info);
                    ControlFlow::Continue(())
                })
                .unwrap();
            found
        }
    }

    impl Drop for FakeSysfs {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_enumerate_usb_and_bluetooth() {
        let sysfs = FakeSysfs::new();
        sysfs.add(
            "hidraw10",
            "0005:054C:09CC.0007",
            "HID_ID=0005:0000054C:000009CC\nHID_NAME=Wireless Controller\nHID_UNIQ=a4:ae:12:00:00:01\n",
            None,
        );
        sysfs.add(
            "hidraw2",
            "0003:1209:0001.0002",
            "HID_ID=0003:00001209:00000001\nHID_NAME=pid.codes Macropad\nHID_UNIQ=\n",
            Some(&[
                ("idVendor", "1209"),
                ("bcdDevice", "0102"),
                ("manufacturer", "pid.codes"),
                ("product", "Macropad"),
                ("serial", "MP-0001"),
            ]),
        );

        let found = sysfs.list();
        assert_eq!(found.len(), 2);

        // numeric order, not lexical
        let usb = &found[0];
        assert_eq!(usb.path(), "/dev/hidraw2");
        assert_eq!(usb.vendor_id(), 0x1209);
        assert_eq!(usb.product_id(), 0x0001);
        assert_eq!(usb.version_number(), 0x0102);
        assert_eq!(usb.manufacturer(), "pid.codes");
        assert_eq!(usb.product(), "Macropad");
        assert_eq!(usb.serial_number(), "MP-0001");
        assert_eq!(usb.input_report_length(), 9);
        assert_eq!(usb.output_report_length(), 9);
        assert_eq!(usb.feature_report_length(), 0);

        let bt = &found[1];
        assert_eq!(bt.path(), "/dev/hidraw10");
        assert_eq!(bt.vendor_id(), 0x054c);
        assert_eq!(bt.version_number(), 0);
        assert_eq!(bt.manufacturer(), "");
        assert_eq!(bt.product(), "Wireless Controller");
        assert_eq!(bt.serial_number(), "a4:ae:12:00:00:01");
    }

    #[test]
    fn test_broken_node_skipped() {
        let sysfs = FakeSysfs::new();
        sysfs.add("hidraw0", "0003:0000:0000.0001", "HID_NAME=no id\n", None);
        fs::create_dir_all(sysfs.class_dir().join("hidraw1")).unwrap();
        sysfs.add(
            "hidraw3",
            "0018:04F3:3043.0003",
            "HID_ID=0018:000004F3:00003043\nHID_NAME=ELAN Touchpad\n",
            None,
        );

        let found = sysfs.list();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path(), "/dev/hidraw3");
    }

    #[test]
    fn test_missing_class_dir_is_empty() {
        let backend = LinuxBackend::with_roots(
            PathBuf::from("/nonexistent/nhid/class/hidraw"),
            PathBuf::from("/dev"),
        );
        let mut count = 0;
        backend
            .enumerate(&mut |_| {
                count += 1;
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_device_stream_over_sysfs() {
        let sysfs = FakeSysfs::new();
        for (i, node) in ["hidraw0", "hidraw1", "hidraw7"].iter().enumerate() {
            sysfs.add(
                node,
                &format!("0003:1209:000{i}.000{i}"),
                &format!("HID_ID=0003:00001209:0000000{i}\nHID_NAME=Pad {i}\n"),
                None,
            );
        }

        let mut devices = Devices::start(Arc::new(sysfs.backend()));
        let paths: Vec<String> = devices.by_ref().map(|d| d.path().to_owned()).collect();
        assert_eq!(paths, ["/dev/hidraw0", "/dev/hidraw1", "/dev/hidraw7"]);
        assert!(devices.take_error().is_none());
    }
}
