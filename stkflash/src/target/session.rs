//! Bootloader session.
//!
//! A session owns one open channel and drives the bootloader through
//!
//! ```text
//! Opened --sync--> Synced --enter--> ProgrammingMode --exit--> Opened
//!    \________________\______________________\__________________ close --> Closed
//! ```
//!
//! Operations called from the wrong state fail with [`Error::Protocol`]
//! without touching the wire. The channel is released exactly once, either
//! by [`BootloaderSession::close`] or when the session is dropped.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::port::{Port, PortOpener, SerialConfig};
use crate::protocol::stk500::{
    CommandFrame, PARAM_SW_MAJOR, PARAM_SW_MINOR, framed_payload, is_in_sync, is_in_sync_ok,
    starts_in_sync_ok,
};
use crate::target::timing::{Delays, Sleeper, ThreadSleeper, Timing};

/// Number of GET_SYNC frames sent before the timed attempts.
pub const WARMUP_SYNCS: usize = 2;

/// Number of timed GET_SYNC attempts.
pub const MAX_SYNC_ATTEMPTS: usize = 10;

/// Where a session is in the bootloader conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Channel open, bootloader not yet (or no longer) synchronized.
    Opened,
    /// Bootloader answered GET_SYNC.
    Synced,
    /// Bootloader accepted ENTER_PGMMODE.
    ProgrammingMode,
    /// Channel released.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Synced => write!(f, "synced"),
            Self::ProgrammingMode => write!(f, "programming mode"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Bootloader firmware version and device signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Bootloader major version.
    pub major: u8,
    /// Bootloader minor version.
    pub minor: u8,
    /// Device signature bytes.
    pub signature: [u8; 3],
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bootloader {}.{}, signature {:02X} {:02X} {:02X}",
            self.major, self.minor, self.signature[0], self.signature[1], self.signature[2]
        )
    }
}

/// Bootloader session over a single channel.
pub struct BootloaderSession<P: Port> {
    port: P,
    state: SessionState,
    multiplier: u32,
    delays: Delays,
    sleeper: Arc<dyn Sleeper>,
}

impl<P: Port> BootloaderSession<P> {
    /// Wrap an already open channel.
    pub fn new(port: P, multiplier: u32, timing: &Timing) -> Self {
        Self {
            port,
            state: SessionState::Opened,
            multiplier,
            delays: timing.resolve(multiplier),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Open a channel through `opener` and wrap it.
    pub fn open<O>(
        opener: &mut O,
        config: &SerialConfig,
        multiplier: u32,
        timing: &Timing,
    ) -> Result<Self>
    where
        O: PortOpener<Port = P>,
    {
        let port = opener.open(config)?;
        debug!(
            "Session on {} at {} baud, timing x{multiplier}",
            config.port_name, config.baud_rate
        );
        Ok(Self::new(port, multiplier, timing))
    }

    /// Use `sleeper` for every protocol delay.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Timing multiplier this session was opened with.
    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Resolved delays.
    pub fn delays(&self) -> &Delays {
        &self.delays
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Synchronize with the bootloader.
    ///
    /// Sends [`WARMUP_SYNCS`] untimed GET_SYNC frames, flushes, then makes
    /// up to [`MAX_SYNC_ATTEMPTS`] timed attempts. The first answer starting
    /// with INSYNC wins. I/O errors during the handshake count as a failed
    /// attempt.
    pub fn sync(&mut self) -> Result<()> {
        self.require(&[SessionState::Opened, SessionState::Synced], "sync")?;

        let frame = CommandFrame::get_sync().build();

        for _ in 0..WARMUP_SYNCS {
            if let Err(e) = self.port.write_all_bytes(&frame) {
                trace!("Warm-up write error (ignoring): {e}");
            }
            self.sleeper.sleep(self.delays.warmup_pause);
        }
        if let Err(e) = self.port.clear_buffers() {
            trace!("Flush error (ignoring): {e}");
        }

        for attempt in 1..=MAX_SYNC_ATTEMPTS {
            if let Err(e) = self.port.write_all_bytes(&frame) {
                trace!("Write error (ignoring): {e}");
            }
            self.sleeper.sleep(self.delays.sync_response);

            match self.port.read_response() {
                Ok(resp) if is_in_sync(&resp) => {
                    info!(
                        "In sync with bootloader on {} ({} baud, attempt {attempt})",
                        self.port.name(),
                        self.port.baud_rate()
                    );
                    let _ = self.port.clear_buffers();
                    self.state = SessionState::Synced;
                    return Ok(());
                },
                Ok(resp) => {
                    warn!("Sync attempt {attempt}/{MAX_SYNC_ATTEMPTS} failed, got {resp:02X?}");
                },
                Err(e) => {
                    warn!("Sync attempt {attempt}/{MAX_SYNC_ATTEMPTS} failed: {e}");
                },
            }
        }

        Err(Error::SyncFailed(format!(
            "no answer from bootloader on {} at {} baud after {MAX_SYNC_ATTEMPTS} attempts",
            self.port.name(),
            self.port.baud_rate()
        )))
    }

    /// Switch the bootloader into programming mode.
    ///
    /// The answer must be exactly INSYNC, OK.
    pub fn enter_programming_mode(&mut self) -> Result<()> {
        self.require(&[SessionState::Synced], "enter programming mode")?;

        let resp = self.exchange(&CommandFrame::enter_prog_mode(), self.delays.enter_response)?;
        if !is_in_sync_ok(&resp) {
            return Err(Error::Protocol(format!(
                "unexpected response entering programming mode: {resp:02X?}"
            )));
        }

        info!("Entered programming mode");
        self.state = SessionState::ProgrammingMode;
        Ok(())
    }

    /// Set the word address for the next page.
    ///
    /// The answer is read and discarded.
    pub fn load_address(&mut self, word_addr: u16) -> Result<()> {
        self.require(&[SessionState::ProgrammingMode], "load address")?;

        let resp = self.exchange(
            &CommandFrame::load_address(word_addr),
            self.delays.load_address_settle,
        )?;
        if !is_in_sync_ok(&resp) {
            trace!("LOAD_ADDR 0x{word_addr:04X} answered {resp:02X?}");
        }
        Ok(())
    }

    /// Write one page (at most 256 bytes) at the loaded address.
    ///
    /// The answer is read and discarded.
    pub fn program_page(&mut self, page: &[u8]) -> Result<()> {
        self.require(&[SessionState::ProgrammingMode], "program page")?;

        let frame = CommandFrame::prog_page(page)?;
        let resp = self.exchange(&frame, self.delays.program_page_settle)?;
        if !is_in_sync_ok(&resp) {
            trace!("PROG_PAGE ({} bytes) answered {resp:02X?}", page.len());
        }
        Ok(())
    }

    /// Leave programming mode.
    ///
    /// The answer must start with INSYNC, OK.
    pub fn exit_programming_mode(&mut self) -> Result<()> {
        self.require(&[SessionState::ProgrammingMode], "exit programming mode")?;

        if let Some(settle) = self.delays.exit_settle {
            self.sleeper.sleep(settle);
            self.port.clear_buffers()?;
        }

        let resp = self.exchange(&CommandFrame::leave_prog_mode(), self.delays.exit_response)?;
        if !starts_in_sync_ok(&resp) {
            return Err(Error::Protocol(format!(
                "unexpected response exiting programming mode: {resp:02X?}"
            )));
        }

        info!("Exited programming mode");
        self.state = SessionState::Opened;
        Ok(())
    }

    /// Read the bootloader version and device signature.
    pub fn identify(&mut self) -> Result<DeviceIdentity> {
        self.require(
            &[SessionState::Synced, SessionState::ProgrammingMode],
            "identify",
        )?;

        let major = self.query(&CommandFrame::get_parameter(PARAM_SW_MAJOR), 1, "major version")?;
        let minor = self.query(&CommandFrame::get_parameter(PARAM_SW_MINOR), 1, "minor version")?;
        let sig = self.query(&CommandFrame::read_signature(), 3, "signature")?;

        let identity = DeviceIdentity {
            major: major[0],
            minor: minor[0],
            signature: [sig[0], sig[1], sig[2]],
        };
        info!("Device: {identity}");
        Ok(identity)
    }

    /// Release the channel.
    ///
    /// Only the first call reaches the port.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        debug!("Closing {}", self.port.name());
        self.port.close()
    }

    fn require(&self, allowed: &[SessionState], op: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "cannot {op} while session is {}",
                self.state
            )))
        }
    }

    fn exchange(&mut self, frame: &CommandFrame, wait: std::time::Duration) -> Result<Vec<u8>> {
        let data = frame.build();
        trace!("Sending {:?}: {} bytes", frame.command(), data.len());
        self.port.write_all_bytes(&data)?;
        self.sleeper.sleep(wait);
        self.port.read_response()
    }

    fn query(&mut self, frame: &CommandFrame, len: usize, what: &str) -> Result<Vec<u8>> {
        let resp = self.exchange(frame, self.delays.query_response)?;
        framed_payload(&resp, len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::Protocol(format!("unexpected response reading {what}: {resp:02X?}")))
    }
}

impl<P: Port> Drop for BootloaderSession<P> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close {}: {e}", self.port.name());
        }
    }
}
