//! Convenience lookups over one enumeration pass.

use std::sync::Arc;

use crate::{platform::Backend, DeviceInfo, Devices, Error};

/// A backend as seen by the lookup functions.
pub(crate) struct Directory {
    backend: Arc<dyn Backend>,
}

impl Directory {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Directory {
        Directory { backend }
    }

    /// The directory of the platform backend compiled into this build.
    pub(crate) fn native() -> Directory {
        Directory::new(crate::platform_backend().clone())
    }

    pub(crate) fn supported(&self) -> bool {
        self.backend.supported()
    }

    pub(crate) fn devices(&self) -> Devices {
        if !self.backend.supported() {
            return Devices::finished();
        }
        Devices::start(self.backend.clone())
    }

    pub(crate) fn first_matching(
        &self,
        mut predicate: impl FnMut(&DeviceInfo) -> bool,
    ) -> Option<DeviceInfo> {
        // dropping the rest of the stream stops the enumeration thread
        self.devices().find(|d| predicate(d))
    }

    pub(crate) fn all_matching(
        &self,
        mut predicate: impl FnMut(&DeviceInfo) -> bool,
    ) -> Vec<DeviceInfo> {
        self.devices().filter(|d| predicate(d)).collect()
    }

    pub(crate) fn find_devices(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> impl Iterator<Item = DeviceInfo> {
        self.devices()
            .filter(move |d| d.vendor_id == vendor_id && d.product_id == product_id)
    }

    pub(crate) fn find_devices_by_product(&self, text: &str) -> impl Iterator<Item = DeviceInfo> {
        let text = text.to_owned();
        self.devices().filter(move |d| d.product.contains(&text))
    }

    pub(crate) fn by_path(&self, path: &str) -> Result<DeviceInfo, Error> {
        if !self.backend.supported() {
            return Err(Error::unsupported_platform());
        }

        let mut devices = self.devices();
        if let Some(info) = devices.by_ref().find(|d| d.path == path) {
            return Ok(info);
        }

        match devices.take_error() {
            Some(e) => Err(e),
            None => Err(Error::not_found().log_debug()),
        }
    }
}
