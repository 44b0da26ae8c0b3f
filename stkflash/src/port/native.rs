//! Native serial port implementation using the `serialport` crate.

use {
    crate::{
        error::{Error, Result},
        port::{Port, PortEnumerator, PortInfo, PortOpener, SerialConfig},
    },
    log::{debug, trace},
    serialport::{ClearBuffer, DataBits, FlowControl, Parity, StopBits},
    std::io::{self, Read, Write},
};

/// Native serial port, 8N1 without flow control.
///
/// The underlying handle is dropped on [`Port::close`]; later I/O fails with
/// `NotConnected`.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
    baud_rate: u32,
}

impl NativePort {
    /// Open a serial port with the given configuration.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!(
            "Opening {} at {} baud (timeout {:?})",
            config.port_name, config.baud_rate, config.timeout
        );
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;

        Ok(Self {
            port: Some(port),
            name: config.port_name.clone(),
            baud_rate: config.baud_rate,
        })
    }

    fn handle(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))
    }
}

impl Port for NativePort {
    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn clear_buffers(&mut self) -> Result<()> {
        if let Some(ref mut p) = self.port {
            p.clear(ClearBuffer::All)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Closed {}", self.name);
        }
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle()?.read(buf)
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        trace!("tx {buf:02X?}");
        self.handle()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle()?.flush()
    }
}

/// Opens [`NativePort`]s for the flasher.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeOpener;

impl PortOpener for NativeOpener {
    type Port = NativePort;

    fn open(&mut self, config: &SerialConfig) -> Result<NativePort> {
        NativePort::open(config)
    }
}

/// Native port enumerator.
pub struct NativePortEnumerator;

impl PortEnumerator for NativePortEnumerator {
    fn list_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(Error::Serial)?;

        Ok(ports
            .into_iter()
            .map(|p| match p.port_type {
                serialport::SerialPortType::UsbPort(info) => PortInfo {
                    name: p.port_name,
                    vid: Some(info.vid),
                    pid: Some(info.pid),
                    manufacturer: info.manufacturer,
                    product: info.product,
                    serial_number: info.serial_number,
                },
                _ => PortInfo {
                    name: p.port_name,
                    ..PortInfo::default()
                },
            })
            .collect())
    }
}
