//! Port listing and controller scan commands.

use {
    anyhow::Result,
    console::style,
    stkflash::{DetectedPort, ScannedPort, discover_ports, scan_ports},
};

fn port_json(port: &DetectedPort) -> serde_json::Value {
    serde_json::json!({
        "name": port.name,
        "device": port.device.name(),
        "known": port.device.is_known(),
        "vid": port.vid,
        "pid": port.pid,
        "manufacturer": port.manufacturer,
        "product": port.product,
        "serial": port.serial,
    })
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let detected = discover_ports();

    if json {
        let ports: Vec<serde_json::Value> = detected.iter().map(port_json).collect();
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());
    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for port in &detected {
        let device_type = if port.device.is_known() {
            format!(" [{}]", style(port.device.name()).yellow())
        } else {
            String::new()
        };
        let vid_pid = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!(" ({vid:04X}:{pid:04X})"),
            _ => String::new(),
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();
        println!("  {}{device_type}{vid_pid}{product}", style(&port.name).green());
    }

    Ok(())
}

/// Scan command implementation.
pub(crate) fn cmd_scan(json: bool) -> Result<()> {
    if !json {
        eprintln!(
            "{} Probing USB serial ports for a controller banner...",
            style("🔍").cyan()
        );
    }
    let found: Vec<ScannedPort> = scan_ports();

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    if found.is_empty() {
        eprintln!("  {}", style("No controllers found").dim());
    }
    for port in &found {
        println!("  {}  {}", style(&port.id).green(), port.status.trim_end());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stkflash::PortInfo;

    #[test]
    fn test_port_json_shape() {
        let port = DetectedPort::from(PortInfo {
            name: "/dev/ttyUSB0".to_string(),
            vid: Some(0x1A86),
            pid: Some(0x7523),
            product: Some("USB Serial".to_string()),
            ..PortInfo::default()
        });
        let value = port_json(&port);
        assert_eq!(value["name"], "/dev/ttyUSB0");
        assert_eq!(value["device"], "CH340/CH341");
        assert_eq!(value["known"], true);
        assert_eq!(value["vid"], 0x1A86);
        assert!(value["serial"].is_null());
    }

    #[test]
    fn test_scanned_port_serializes_with_bridge_names() {
        let port = ScannedPort {
            id: "COM3".to_string(),
            status: "SYS\tVER".to_string(),
        };
        let value = serde_json::to_value(&port).unwrap();
        assert_eq!(value, serde_json::json!({"PortId": "COM3", "Status": "SYS\tVER"}));
    }
}
