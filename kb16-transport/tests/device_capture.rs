//! Integration tests against a connected KB16.
//!
//! These tests require the keypad to be plugged in.
//! Run with: cargo test -p kb16-transport --test device_capture -- --ignored --nocapture

use std::time::Duration;

use kb16_transport::{DeviceFilter, HidDiscovery, ReaderConfig, ReportReader};

#[test]
#[ignore] // requires hardware
fn kb16_is_listed() {
    let discovery = HidDiscovery::new().expect("HID backend unavailable");
    let devices = discovery.list_devices(&DeviceFilter::new());
    assert!(
        devices.iter().any(|d| d.is_kb16()),
        "No KB16 found among {} HID interfaces",
        devices.len()
    );
}

#[test]
#[ignore] // requires hardware
fn capture_one_keypress() {
    let discovery = HidDiscovery::new().expect("HID backend unavailable");
    let (device, info) = discovery
        .open(&DeviceFilter::new())
        .expect("No KB16 found, plug in the keypad");
    println!("Opened {}; press any key within 10 seconds", info.label());

    let (reader, mut rx) = ReportReader::spawn(device, ReaderConfig::default()).unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let mut got = None;
    while std::time::Instant::now() < deadline {
        if let Ok(report) = rx.try_recv() {
            got = Some(report);
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    drop(rx);
    reader.stop().unwrap();

    let report = got.expect("No report received");
    assert!(!report.report.is_empty());
}
