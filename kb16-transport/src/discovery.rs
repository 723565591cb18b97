//! HID device discovery

use hidapi::{HidApi, HidDevice};
use tracing::{debug, info};

use crate::device_registry;
use crate::error::TransportError;
use crate::types::HidDeviceInfo;

/// Usage pages at or above this value are vendor-defined
const VENDOR_USAGE_PAGE_MIN: u16 = 0xFF00;

/// Which device interface to look for.
///
/// An empty filter matches every HID interface on the system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub interface: Option<i32>,
}

impl DeviceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the primary KB16 identity
    pub fn kb16() -> Self {
        Self::new()
            .with_vendor_id(device_registry::VENDOR_ID)
            .with_product_id(device_registry::PRODUCT_ID)
    }

    pub fn with_vendor_id(mut self, vid: u16) -> Self {
        self.vendor_id = Some(vid);
        self
    }

    pub fn with_product_id(mut self, pid: u16) -> Self {
        self.product_id = Some(pid);
        self
    }

    pub fn with_interface(mut self, interface: i32) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Check a device against the filter
    pub fn matches(&self, vid: u16, pid: u16, interface: i32) -> bool {
        self.vendor_id.map_or(true, |v| v == vid)
            && self.product_id.map_or(true, |p| p == pid)
            && self.interface.map_or(true, |i| i == interface)
    }

    fn describe(&self) -> String {
        let part = |v: Option<u16>| v.map_or_else(|| "*".to_string(), |v| format!("{v:04X}"));
        let mut text = format!("{}:{}", part(self.vendor_id), part(self.product_id));
        if let Some(i) = self.interface {
            text.push_str(&format!(" interface {i}"));
        }
        text
    }
}

fn to_info(device: &hidapi::DeviceInfo) -> HidDeviceInfo {
    let vid = device.vendor_id();
    let pid = device.product_id();
    HidDeviceInfo {
        vid,
        pid,
        interface_number: device.interface_number(),
        usage_page: device.usage_page(),
        usage: device.usage(),
        path: device.path().to_string_lossy().to_string(),
        manufacturer: device.manufacturer_string().map(|s| s.to_string()),
        product_name: device.product_string().map(|s| s.to_string()),
        serial: device.serial_number().map(|s| s.to_string()),
        known_as: device_registry::lookup(vid, pid).map(|d| d.name),
    }
}

/// Pick the interface to read from among matching candidates.
///
/// An explicit interface in the filter has already narrowed the list.
/// Otherwise a vendor-defined usage page wins, then the lowest interface
/// number.
pub fn select_interface<'a>(candidates: &'a [HidDeviceInfo]) -> Option<&'a HidDeviceInfo> {
    candidates
        .iter()
        .min_by_key(|d| (d.usage_page < VENDOR_USAGE_PAGE_MIN, d.interface_number))
}

/// Enumerates and opens HID devices
pub struct HidDiscovery {
    api: HidApi,
}

impl HidDiscovery {
    /// Initialise the HID backend
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new()?;
        Ok(Self { api })
    }

    /// List interfaces matching the filter, KB16 identities first
    pub fn list_devices(&self, filter: &DeviceFilter) -> Vec<HidDeviceInfo> {
        let mut devices: Vec<HidDeviceInfo> = self
            .api
            .device_list()
            .filter(|d| filter.matches(d.vendor_id(), d.product_id(), d.interface_number()))
            .map(to_info)
            .collect();

        devices.sort_by_key(|d| (!d.is_kb16(), d.vid, d.pid, d.interface_number));
        debug!(count = devices.len(), filter = %filter.describe(), "Enumerated HID devices");
        devices
    }

    /// Open the best interface matching the filter.
    ///
    /// With no vendor/product in the filter, every known KB16 identity is
    /// tried in registry order.
    pub fn open(&self, filter: &DeviceFilter) -> Result<(HidDevice, HidDeviceInfo), TransportError> {
        let filters: Vec<DeviceFilter> = if filter.vendor_id.is_none() && filter.product_id.is_none()
        {
            device_registry::KNOWN_DEVICES
                .iter()
                .map(|known| DeviceFilter {
                    vendor_id: Some(known.vid),
                    product_id: Some(known.pid),
                    interface: filter.interface,
                })
                .collect()
        } else {
            vec![*filter]
        };

        for candidate_filter in &filters {
            let candidates = self.list_devices(candidate_filter);
            if let Some(info) = select_interface(&candidates) {
                debug!(path = %info.path, "Opening HID interface");
                let device = self
                    .api
                    .device_list()
                    .find(|d| d.path().to_string_lossy() == info.path)
                    .ok_or_else(|| TransportError::DeviceNotFound(info.label()))?
                    .open_device(&self.api)?;
                info!("Opened {}", info.label());
                return Ok((device, info.clone()));
            }
        }

        Err(TransportError::DeviceNotFound(filter.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(interface_number: i32, usage_page: u16) -> HidDeviceInfo {
        HidDeviceInfo {
            vid: 0xD010,
            pid: 0x1601,
            interface_number,
            usage_page,
            usage: 0x01,
            path: format!("/dev/hidraw{interface_number}"),
            manufacturer: None,
            product_name: None,
            serial: None,
            known_as: Some("DOIO KB16"),
        }
    }

    #[test]
    fn test_filter_matches() {
        let filter = DeviceFilter::kb16().with_interface(2);
        assert!(filter.matches(0xD010, 0x1601, 2));
        assert!(!filter.matches(0xD010, 0x1601, 1));
        assert!(!filter.matches(0x1EAF, 0x0003, 2));
        assert!(DeviceFilter::new().matches(0x1234, 0x5678, -1));
    }

    #[test]
    fn test_filter_describe() {
        assert_eq!(DeviceFilter::kb16().describe(), "D010:1601");
        assert_eq!(
            DeviceFilter::new().with_interface(1).describe(),
            "*:* interface 1"
        );
    }

    #[test]
    fn test_select_prefers_vendor_page() {
        let candidates = vec![info(0, 0x0001), info(2, 0xFF60), info(1, 0x000C)];
        assert_eq!(select_interface(&candidates).map(|d| d.interface_number), Some(2));
    }

    #[test]
    fn test_select_falls_back_to_lowest_interface() {
        let candidates = vec![info(3, 0x0001), info(1, 0x000C)];
        assert_eq!(select_interface(&candidates).map(|d| d.interface_number), Some(1));
        assert!(select_interface(&[]).is_none());
    }
}
