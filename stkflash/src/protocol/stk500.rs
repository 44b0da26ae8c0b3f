//! STK500v1 bootloader protocol subset.
//!
//! Only the commands needed to write flash are implemented (sync, enter and
//! leave programming mode, load address, program page) plus the two read-only
//! queries used to identify a device.
//!
//! ## Frame Format
//!
//! Every command is an opcode, an optional payload, and the `CRC_EOP`
//! terminator. A bootloader in sync answers `INSYNC` followed by any
//! result bytes and `OK`.
//!
//! ```text
//! GET_SYNC        30 20
//! ENTER_PGMMODE   50 20
//! EXIT_PGMMODE    51 20
//! LOAD_ADDR       55 lo hi 20                   (word address, little-endian)
//! PROG_PAGE       64 hi lo 46 data... 20        (length, big-endian)
//! GET_PARAMETER   41 pp 20                      -> 14 vv 10
//! READ_SIGN       75 20                         -> 14 s1 s2 s3 10
//! ```

use {
    crate::error::{Error, Result},
    byteorder::{BigEndian, LittleEndian, WriteBytesExt},
};

/// Command terminator.
pub const CRC_EOP: u8 = 0x20;

/// Memory type marker for flash in PROG_PAGE.
pub const MEM_TYPE_FLASH: u8 = 0x46;

/// Largest payload accepted by a single PROG_PAGE.
pub const MAX_PAGE_SIZE: usize = 256;

/// GET_PARAMETER selector for the bootloader major version.
pub const PARAM_SW_MAJOR: u8 = 0x81;

/// GET_PARAMETER selector for the bootloader minor version.
pub const PARAM_SW_MINOR: u8 = 0x82;

/// Primary baud rate.
pub const DEFAULT_BAUD: u32 = 115200;

/// Baud rate retried when the primary rate does not sync.
pub const FALLBACK_BAUD: u32 = 57600;

/// Host-to-bootloader opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Ask the bootloader to answer INSYNC.
    GetSync = 0x30,
    /// Read a bootloader parameter.
    GetParameter = 0x41,
    /// Enter programming mode.
    EnterProgMode = 0x50,
    /// Leave programming mode.
    LeaveProgMode = 0x51,
    /// Set the word address for the next page.
    LoadAddress = 0x55,
    /// Write a page at the loaded address.
    ProgPage = 0x64,
    /// Read the three device signature bytes.
    ReadSign = 0x75,
}

/// Bootloader-to-host status bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Response {
    /// Command succeeded.
    Ok = 0x10,
    /// Command failed.
    Failed = 0x11,
    /// Command frame was well formed.
    InSync = 0x14,
    /// Command frame was not terminated correctly.
    NoSync = 0x15,
}

impl Response {
    /// Decode a status byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x10 => Some(Self::Ok),
            0x11 => Some(Self::Failed),
            0x14 => Some(Self::InSync),
            0x15 => Some(Self::NoSync),
            _ => None,
        }
    }
}

/// Command frame builder.
#[derive(Debug)]
pub struct CommandFrame {
    cmd: Command,
    data: Vec<u8>,
}

impl CommandFrame {
    /// Create a frame without payload.
    pub fn new(cmd: Command) -> Self {
        Self {
            cmd,
            data: Vec::new(),
        }
    }

    /// GET_SYNC frame.
    pub fn get_sync() -> Self {
        Self::new(Command::GetSync)
    }

    /// ENTER_PGMMODE frame.
    pub fn enter_prog_mode() -> Self {
        Self::new(Command::EnterProgMode)
    }

    /// EXIT_PGMMODE frame.
    pub fn leave_prog_mode() -> Self {
        Self::new(Command::LeaveProgMode)
    }

    /// GET_PARAMETER frame for `param`.
    pub fn get_parameter(param: u8) -> Self {
        let mut frame = Self::new(Command::GetParameter);
        frame.data.push(param);
        frame
    }

    /// READ_SIGN frame.
    pub fn read_signature() -> Self {
        Self::new(Command::ReadSign)
    }

    /// LOAD_ADDR frame for a word address.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn load_address(word_addr: u16) -> Self {
        let mut frame = Self::new(Command::LoadAddress);
        frame
            .data
            .write_u16::<LittleEndian>(word_addr)
            .unwrap();
        frame
    }

    /// PROG_PAGE frame writing `page` to flash.
    ///
    /// Fails if the page is longer than [`MAX_PAGE_SIZE`].
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn prog_page(page: &[u8]) -> Result<Self> {
        if page.len() > MAX_PAGE_SIZE {
            return Err(Error::Protocol(format!(
                "page of {} bytes exceeds {MAX_PAGE_SIZE}",
                page.len()
            )));
        }

        let mut frame = Self::new(Command::ProgPage);
        // Bounded by MAX_PAGE_SIZE above.
        #[allow(clippy::cast_possible_truncation)]
        frame
            .data
            .write_u16::<BigEndian>(page.len() as u16)
            .unwrap();
        frame.data.push(MEM_TYPE_FLASH);
        frame.data.extend_from_slice(page);
        Ok(frame)
    }

    /// Build the complete frame data.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.data.len() + 2);
        buf.push(self.cmd as u8);
        buf.extend_from_slice(&self.data);
        buf.push(CRC_EOP);
        buf
    }

    /// Get the command type.
    pub fn command(&self) -> Command {
        self.cmd
    }
}

/// Whether a response starts with INSYNC.
pub fn is_in_sync(response: &[u8]) -> bool {
    response.first() == Some(&(Response::InSync as u8))
}

/// Whether a response is exactly INSYNC, OK.
pub fn is_in_sync_ok(response: &[u8]) -> bool {
    response == [Response::InSync as u8, Response::Ok as u8]
}

/// Whether a response begins with INSYNC, OK.
pub fn starts_in_sync_ok(response: &[u8]) -> bool {
    response.starts_with(&[Response::InSync as u8, Response::Ok as u8])
}

/// Payload of a framed query answer `INSYNC payload... OK` of exact length.
pub fn framed_payload(response: &[u8], payload_len: usize) -> Option<&[u8]> {
    if response.len() == payload_len + 2
        && is_in_sync(response)
        && response.last() == Some(&(Response::Ok as u8))
    {
        Some(&response[1..=payload_len])
    } else {
        None
    }
}
