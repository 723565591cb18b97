//! Device registry - known KB16 USB identities
//!
//! The KB16 normally enumerates as VID 0xD010 / PID 0x1601. Some units (and
//! the keypad while in its bootloader) show up as the generic STM32
//! VID 0x1EAF / PID 0x0003 instead.

/// DOIO vendor ID
pub const VENDOR_ID: u16 = 0xD010;

/// KB16 product ID
pub const PRODUCT_ID: u16 = 0x1601;

/// Alternate vendor ID (STM32 generic)
pub const ALT_VENDOR_ID: u16 = 0x1EAF;

/// Alternate product ID
pub const ALT_PRODUCT_ID: u16 = 0x0003;

/// A USB identity the tools recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDevice {
    pub vid: u16,
    pub pid: u16,
    pub name: &'static str,
}

/// All recognised identities, preferred first
pub const KNOWN_DEVICES: &[KnownDevice] = &[
    KnownDevice {
        vid: VENDOR_ID,
        pid: PRODUCT_ID,
        name: "DOIO KB16",
    },
    KnownDevice {
        vid: ALT_VENDOR_ID,
        pid: ALT_PRODUCT_ID,
        name: "DOIO KB16 (alternate ID)",
    },
];

/// Look up a VID/PID pair
pub fn lookup(vid: u16, pid: u16) -> Option<&'static KnownDevice> {
    KNOWN_DEVICES.iter().find(|d| d.vid == vid && d.pid == pid)
}

/// Check if a VID/PID pair is a known KB16 identity
#[inline]
pub fn is_kb16(vid: u16, pid: u16) -> bool {
    lookup(vid, pid).is_some()
}
