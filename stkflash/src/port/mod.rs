//! Serial channel abstraction.
//!
//! The bootloader session only ever talks to a [`Port`]. The native
//! implementation wraps the `serialport` crate; tests substitute an in-memory
//! channel with scripted responses.
//!
//! ```text
//! +--------------------+
//! |  Flasher           |  decode, open, sync, fallback, program, close
//! +---------+----------+
//!           | PortOpener
//!           v
//! +---------+----------+
//! |  BootloaderSession |  GET_SYNC / ENTER / LOAD_ADDR / PROG_PAGE / EXIT
//! +---------+----------+
//!           | Port
//!           v
//! +---------+----------+
//! |  NativePort        |  serialport, 8N1, no flow control
//! +--------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{self, Read, Write};
use std::time::Duration;

use log::trace;

use crate::error::Result;

/// Default per-read timeout for the bootloader protocol.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_micros(4500);

/// Size of the buffer used for a single response read.
pub const RESPONSE_BUFFER_SIZE: usize = 1024;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Per-read timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: crate::protocol::stk500::DEFAULT_BAUD,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create an 8N1 configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information.
#[derive(Debug, Clone, Default)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

/// Byte-oriented, timeout-bounded serial channel.
///
/// Framing is always 8N1 without flow control. Timeout and baud rate are
/// fixed when the channel is opened; fallback reopens instead of
/// reconfiguring.
pub trait Port: Read + Write + Send {
    /// Baud rate the channel was opened with.
    fn baud_rate(&self) -> u32;

    /// Discard pending input and output.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Release the channel.
    ///
    /// Calling this on an already closed port is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes and flush.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        Write::write_all(self, buf)?;
        Write::flush(self)?;
        Ok(())
    }

    /// Perform one bounded read and return whatever arrived.
    ///
    /// A read that times out yields an empty response rather than an error.
    fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; RESPONSE_BUFFER_SIZE];
        match self.read(&mut buf) {
            Ok(n) => {
                trace!("rx {:02X?}", &buf[..n]);
                Ok(buf[..n].to_vec())
            },
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                trace!("rx timeout");
                Ok(Vec::new())
            },
            Err(e) => Err(e.into()),
        }
    }
}

/// Trait for listing available serial ports.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

/// Opens channels for the flasher, possibly several times per attempt.
pub trait PortOpener {
    /// Channel type produced by this opener.
    type Port: Port;

    /// Open `config.port_name` at `config.baud_rate`.
    fn open(&mut self, config: &SerialConfig) -> Result<Self::Port>;
}

#[cfg(feature = "native")]
pub use native::{NativeOpener, NativePort, NativePortEnumerator};
