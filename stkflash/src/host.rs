//! Host-side discovery: list ports and probe them for a controller banner.
//!
//! A controller announces itself shortly after its port is opened with a
//! tab-separated status line such as `SYS\tVER...`, or the same tokens as
//! decimal ASCII codes (`838983\t866982`). Probing opens each candidate,
//! waits for that line and keeps the ports that produced it.

use std::time::Duration;

use log::{debug, info};

use crate::device::DetectedPort;
use crate::port::{Port, PortOpener, SerialConfig};
use crate::protocol::stk500::DEFAULT_BAUD;
use crate::target::timing::Sleeper;

/// Read timeout while waiting for a banner.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time given to the controller to boot and print its banner.
pub const BANNER_SETTLE: Duration = Duration::from_millis(2500);

const BANNER_HEADS: [&[u8]; 2] = [b"SYS", b"838983"];
const BANNER_TAILS: [&[u8]; 2] = [b"VER", b"866982"];

/// A port that answered the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScannedPort {
    /// Port name/path.
    #[cfg_attr(feature = "serde", serde(rename = "PortId"))]
    pub id: String,
    /// Banner text the controller printed.
    #[cfg_attr(feature = "serde", serde(rename = "Status"))]
    pub status: String,
}

/// Discover all available serial ports.
#[must_use]
pub fn discover_ports() -> Vec<DetectedPort> {
    crate::device::detect_ports()
}

/// Whether `bytes` contain a controller status banner.
pub fn is_status_banner(bytes: &[u8]) -> bool {
    BANNER_HEADS.iter().any(|head| {
        bytes
            .windows(head.len() + 1)
            .enumerate()
            .filter(|(_, w)| w.starts_with(head) && w[head.len()] == b'\t')
            .any(|(i, _)| {
                let rest = &bytes[i + head.len() + 1..];
                BANNER_TAILS.iter().any(|tail| rest.starts_with(tail))
            })
    })
}

/// Probe one port. Returns `None` if it cannot be opened or stays silent.
pub fn probe_port<O: PortOpener>(
    opener: &mut O,
    name: &str,
    sleeper: &dyn Sleeper,
) -> Option<ScannedPort> {
    let config = SerialConfig::new(name, DEFAULT_BAUD).with_timeout(PROBE_TIMEOUT);
    let mut port = match opener.open(&config) {
        Ok(port) => port,
        Err(e) => {
            debug!("Skipping {name}: {e}");
            return None;
        },
    };

    sleeper.sleep(BANNER_SETTLE);
    let response = port.read_response();
    if let Err(e) = port.close() {
        debug!("Failed to close {name}: {e}");
    }

    let bytes = match response {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            debug!("{name}: no banner");
            return None;
        },
        Err(e) => {
            debug!("{name}: read failed: {e}");
            return None;
        },
    };

    let status = String::from_utf8_lossy(&bytes).into_owned();
    debug!("{name} returned {status:?}");
    is_status_banner(&bytes).then(|| ScannedPort {
        id: name.to_string(),
        status,
    })
}

/// Probe every name in `candidates` in order.
pub fn scan_ports_with<O: PortOpener>(
    opener: &mut O,
    candidates: &[String],
    sleeper: &dyn Sleeper,
) -> Vec<ScannedPort> {
    let found: Vec<ScannedPort> = candidates
        .iter()
        .filter_map(|name| probe_port(opener, name, sleeper))
        .collect();
    info!(
        "Scan found {} controller(s) on {} candidate port(s)",
        found.len(),
        candidates.len()
    );
    found
}

/// Probe every USB serial port on this host.
#[cfg(feature = "native")]
pub fn scan_ports() -> Vec<ScannedPort> {
    let candidates: Vec<String> = discover_ports()
        .into_iter()
        .filter(DetectedPort::is_usb)
        .map(|p| p.name)
        .collect();
    scan_ports_with(
        &mut crate::port::NativeOpener,
        &candidates,
        &crate::target::timing::ThreadSleeper,
    )
}
