//! Intel HEX decoding.
//!
//! Intel HEX is a line-oriented ASCII encoding of a binary image. Every line
//! is one record:
//!
//! ```text
//! +-----+--------+---------+------+---------------+----------+
//! |  :  | LENGTH | ADDRESS | TYPE |     DATA      | CHECKSUM |
//! +-----+--------+---------+------+---------------+----------+
//! |  1  |   2    |    4    |  2   |  2 * LENGTH   |    2     |
//! +-----+--------+---------+------+---------------+----------+
//! ```
//!
//! All fields are hex digit pairs, the address is big-endian and the checksum
//! is the two's complement of the sum of every preceding byte.
//!
//! Decoding produces a flat [`MemoryImage`] starting at address zero. Bytes
//! not covered by any data record are filled with [`EMPTY_VALUE`], the value
//! of erased flash.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use log::debug;
use std::fs;
use std::path::Path;

/// Record start character.
pub const START_CODE: u8 = b':';

/// Fill value for bytes not written by any data record.
pub const EMPTY_VALUE: u8 = 0xFF;

/// Largest absolute address a data record may reach.
///
/// Stops a stray extended address record from allocating gigabytes of
/// padding.
pub const MAX_IMAGE_SIZE: usize = 16 * 1024 * 1024;

/// Bytes in a record besides its data: length, address (2), type, checksum.
const RECORD_OVERHEAD: usize = 5;

/// Intel HEX record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Data bytes at base + offset.
    Data = 0x00,
    /// End of file.
    EndOfFile = 0x01,
    /// Sets the base address to `value << 4`.
    ExtendedSegmentAddress = 0x02,
    /// CS:IP start address (informational).
    StartSegmentAddress = 0x03,
    /// Sets the base address to `value << 16`.
    ExtendedLinearAddress = 0x04,
    /// EIP start address (informational).
    StartLinearAddress = 0x05,
}

impl TryFrom<u8> for RecordType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0x00 => Ok(Self::Data),
            0x01 => Ok(Self::EndOfFile),
            0x02 => Ok(Self::ExtendedSegmentAddress),
            0x03 => Ok(Self::StartSegmentAddress),
            0x04 => Ok(Self::ExtendedLinearAddress),
            0x05 => Ok(Self::StartLinearAddress),
            other => Err(other),
        }
    }
}

/// Compute the checksum of a record.
///
/// Two's complement of the low byte of the sum of length, both address
/// bytes, type and data.
pub fn record_checksum(record_type: u8, offset: u16, data: &[u8]) -> u8 {
    #[allow(clippy::cast_possible_truncation)] // length is taken mod 256 by design of the format
    let len = data.len() as u8;
    let [hi, lo] = offset.to_be_bytes();
    let sum = data
        .iter()
        .fold(
            len.wrapping_add(hi)
                .wrapping_add(lo)
                .wrapping_add(record_type),
            |acc, b| acc.wrapping_add(*b),
        );
    sum.wrapping_neg()
}

/// A single parsed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    /// Raw record type byte.
    pub record_type: u8,
    /// 16-bit address offset.
    pub offset: u16,
    /// Data field.
    pub data: Vec<u8>,
    /// Checksum byte as stored in the record.
    pub checksum: u8,
}

impl HexRecord {
    /// Parse one record line (without its line terminator).
    ///
    /// `line_no` is 1-based and only used for error reporting. The checksum
    /// is verified here.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let bytes = line.as_bytes();
        if bytes.first() != Some(&START_CODE) {
            return Err(Error::invalid_hex(line_no, "bad line start"));
        }

        let digits = &bytes[1..];
        if digits.len() % 2 != 0 {
            return Err(Error::invalid_hex(line_no, "odd number of hex digits"));
        }

        let raw = digits
            .chunks_exact(2)
            .map(|pair| hex_byte(pair[0], pair[1]))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| Error::invalid_hex(line_no, "invalid hex digit"))?;

        if raw.len() < RECORD_OVERHEAD {
            return Err(Error::invalid_hex(line_no, "record too short"));
        }

        let len = usize::from(raw[0]);
        if raw.len() != len + RECORD_OVERHEAD {
            return Err(Error::invalid_hex(
                line_no,
                format!(
                    "record length mismatch: header says {len} data bytes, line holds {}",
                    raw.len() - RECORD_OVERHEAD
                ),
            ));
        }

        let record = Self {
            record_type: raw[3],
            offset: BigEndian::read_u16(&raw[1..3]),
            data: raw[4..4 + len].to_vec(),
            checksum: raw[4 + len],
        };

        let actual = record.computed_checksum();
        if actual != record.checksum {
            return Err(Error::ChecksumMismatch {
                line: line_no,
                expected: record.checksum,
                actual,
            });
        }

        Ok(record)
    }

    /// Checksum computed over this record's fields.
    pub fn computed_checksum(&self) -> u8 {
        record_checksum(self.record_type, self.offset, &self.data)
    }

    /// Interpret a 2-byte address record payload.
    fn address_u16(&self, line_no: usize, what: &str) -> Result<u16> {
        if self.data.len() != 2 || self.offset != 0 {
            return Err(Error::invalid_hex(line_no, format!("invalid {what} record")));
        }
        Ok(BigEndian::read_u16(&self.data))
    }

    /// Interpret a 4-byte start address record payload.
    fn address_u32(&self, line_no: usize, what: &str) -> Result<u32> {
        if self.data.len() != 4 || self.offset != 0 {
            return Err(Error::invalid_hex(line_no, format!("invalid {what} record")));
        }
        Ok(BigEndian::read_u32(&self.data))
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn hex_byte(hi: u8, lo: u8) -> Option<u8> {
    Some(hex_nibble(hi)? << 4 | hex_nibble(lo)?)
}

/// Decoded flash image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryImage {
    data: Vec<u8>,
    start_segment_address: Option<u32>,
    start_linear_address: Option<u32>,
}

impl MemoryImage {
    /// Decode Intel HEX text.
    pub fn from_hex(text: &str) -> Result<Self> {
        decode(text)
    }

    /// Load and decode an Intel HEX file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading Intel HEX from: {}", path.display());

        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|e| {
            let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
            let line_no = valid.iter().filter(|b| **b == b'\n').count() + 1;
            Error::invalid_hex(line_no, "invalid UTF-8")
        })?;
        decode(&text)
    }

    /// Image bytes, starting at address zero.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Start segment address record value, if one was present.
    pub fn start_segment_address(&self) -> Option<u32> {
        self.start_segment_address
    }

    /// Start linear address record value, if one was present.
    pub fn start_linear_address(&self) -> Option<u32> {
        self.start_linear_address
    }

    /// Number of `page_size` pages needed to hold the image.
    pub fn page_count(&self, page_size: usize) -> usize {
        self.data.len().div_ceil(page_size)
    }

    /// Iterate over `(byte_offset, page)` chunks. The last page may be short.
    pub fn pages(&self, page_size: usize) -> impl Iterator<Item = (usize, &[u8])> {
        self.data
            .chunks(page_size)
            .enumerate()
            .map(move |(i, chunk)| (i * page_size, chunk))
    }
}

impl From<Vec<u8>> for MemoryImage {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

/// Accumulates data records, tracking which bytes have been written.
#[derive(Default)]
struct ImageBuilder {
    image: MemoryImage,
    written: Vec<bool>,
}

impl ImageBuilder {
    fn write(&mut self, addr: usize, bytes: &[u8], line_no: usize) -> Result<()> {
        let end = addr.checked_add(bytes.len()).unwrap_or(usize::MAX);
        if end > MAX_IMAGE_SIZE {
            return Err(Error::invalid_hex(
                line_no,
                format!("address {end:#X} exceeds maximum image size {MAX_IMAGE_SIZE:#X}"),
            ));
        }

        if end > self.image.data.len() {
            self.image.data.resize(end, EMPTY_VALUE);
            self.written.resize(end, false);
        }

        if self.written[addr..end].iter().any(|w| *w) {
            return Err(Error::invalid_hex(line_no, "overlapping data record"));
        }

        self.image.data[addr..end].copy_from_slice(bytes);
        self.written[addr..end].fill(true);
        Ok(())
    }
}

/// Decode Intel HEX text into a flat image.
///
/// Fails with [`Error::MissingEof`] if the input ends before an End Of File
/// record. Anything after the End Of File record is ignored.
pub fn decode(text: &str) -> Result<MemoryImage> {
    let mut builder = ImageBuilder::default();
    let mut base: usize = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let record = HexRecord::parse_line(line, line_no)?;
        let record_type = RecordType::try_from(record.record_type)
            .map_err(|_| Error::invalid_hex(line_no, "invalid record type"))?;

        match record_type {
            RecordType::Data => {
                let addr = base
                    .checked_add(usize::from(record.offset))
                    .unwrap_or(usize::MAX);
                builder.write(addr, &record.data, line_no)?;
            },
            RecordType::EndOfFile => {
                if !record.data.is_empty() {
                    return Err(Error::invalid_hex(line_no, "invalid EOF record"));
                }
                debug!(
                    "Decoded {} bytes from {} lines",
                    builder.image.len(),
                    line_no
                );
                return Ok(builder.image);
            },
            RecordType::ExtendedSegmentAddress => {
                base = usize::from(record.address_u16(line_no, "extended segment address")?) << 4;
            },
            RecordType::StartSegmentAddress => {
                builder.image.start_segment_address =
                    Some(record.address_u32(line_no, "start segment address")?);
            },
            RecordType::ExtendedLinearAddress => {
                base = usize::from(record.address_u16(line_no, "extended linear address")?) << 16;
            },
            RecordType::StartLinearAddress => {
                builder.image.start_linear_address =
                    Some(record.address_u32(line_no, "start linear address")?);
            },
        }
    }

    Err(Error::MissingEof)
}
