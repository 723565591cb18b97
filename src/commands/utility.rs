//! Utility command handlers.

use super::CommandResult;
use kb16_tools::Config;
use kb16_transport::{select_interface, DeviceFilter, HidDiscovery};

/// List HID devices
pub fn list(config: &Config, all: bool) -> CommandResult {
    let discovery = HidDiscovery::new()?;
    let devices = discovery.list_devices(&DeviceFilter::new());

    let shown: Vec<_> = devices
        .iter()
        .filter(|d| {
            all || d.is_kb16()
                || (d.vid == config.device.vendor_id && d.pid == config.device.product_id)
        })
        .cloned()
        .collect();

    if shown.is_empty() {
        if all {
            println!("No HID devices found.");
        } else {
            println!("No KB16 found. Use --all to list every HID device.");
        }
        return Ok(());
    }

    println!(
        "{}:",
        if all { "All HID devices" } else { "KB16 interfaces" }
    );
    let preferred = select_interface(&shown).map(|d| d.path.clone());
    for device in &shown {
        let marker = if Some(&device.path) == preferred.as_ref() && device.is_kb16() {
            "*"
        } else {
            " "
        };
        println!(
            "{} VID={:04x} PID={:04x} usage={:04x} page={:04x} if={} {}{}",
            marker,
            device.vid,
            device.pid,
            device.usage,
            device.usage_page,
            device.interface_number,
            device.product_name.as_deref().unwrap_or("(unnamed)"),
            device
                .known_as
                .map(|name| format!(" [{name}]"))
                .unwrap_or_default(),
        );
    }
    if !all {
        println!("\n* = interface opened by capture/monitor");
    }
    Ok(())
}
