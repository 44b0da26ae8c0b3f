//! Serial port discovery and classification.
//!
//! Ports are classified by USB VID/PID so that the bridge chips commonly
//! found on bootloader-equipped boards can be labelled when listing ports
//! and offered first when choosing one.

use crate::port::PortInfo;

#[cfg(feature = "native")]
use log::{debug, trace};

/// Known USB bridge/device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Arduino-class board with native USB CDC.
    ArduinoCdc,
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232/FT2232/FT4232 USB-to-Serial converter.
    Ftdi,
    /// Prolific PL2303 USB-to-Serial converter.
    Prolific,
    /// Unknown device.
    Unknown,
}

/// Known USB VID/PID pairs. An empty PID list matches any product.
const KNOWN_USB_DEVICES: &[(u16, &[u16], DeviceKind)] = &[
    (0x2341, &[], DeviceKind::ArduinoCdc),
    (0x2A03, &[], DeviceKind::ArduinoCdc),
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x5512, 0x55D4],
        DeviceKind::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71, 0xEA63], DeviceKind::Cp210x),
    (
        0x0403,
        &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015],
        DeviceKind::Ftdi,
    ),
    (0x067B, &[0x2303, 0x23A3, 0x23C3, 0x23D3], DeviceKind::Prolific),
];

impl DeviceKind {
    /// Classify a VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        for (known_vid, pids, device) in KNOWN_USB_DEVICES {
            if vid == *known_vid && (pids.is_empty() || pids.contains(&pid)) {
                return *device;
            }
        }
        Self::Unknown
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ArduinoCdc => "Arduino",
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Prolific => "PL2303",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether this is a recognized device kind.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Discovered serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Classified device kind.
    pub device: DeviceKind,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl DetectedPort {
    /// Whether the port sits behind a USB bridge or CDC device.
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }
}

impl From<PortInfo> for DetectedPort {
    fn from(info: PortInfo) -> Self {
        let device = match (info.vid, info.pid) {
            (Some(vid), Some(pid)) => DeviceKind::from_vid_pid(vid, pid),
            _ => DeviceKind::Unknown,
        };
        Self {
            name: info.name,
            device,
            vid: info.vid,
            pid: info.pid,
            manufacturer: info.manufacturer,
            product: info.product,
            serial: info.serial_number,
        }
    }
}

/// Detect all available serial ports.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    use crate::port::{NativePortEnumerator, PortEnumerator};

    match NativePortEnumerator::list_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|info| {
                let detected = DetectedPort::from(info);
                if let (Some(vid), Some(pid)) = (detected.vid, detected.pid) {
                    trace!(
                        "Found USB port: {} (VID: {vid:04X}, PID: {pid:04X}, Device: {:?})",
                        detected.name, detected.device
                    );
                }
                detected
            })
            .collect(),
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            Vec::new()
        },
    }
}

/// Detect all available serial ports (no native backend: always empty).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}
