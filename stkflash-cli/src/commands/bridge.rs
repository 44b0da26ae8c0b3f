//! Line-delimited JSON bridge for a remote UI.
//!
//! Each stdin line is one request object, each reply is one stdout line.
//!
//! ```text
//! {"type":"1"}                                  -> [{"PortId":..,"Status":..}, ..]
//! {"type":"2","device":PORT,"payload":HEXTEXT}  -> {"flash":"complete"} | {"flash":ERROR}
//! ```
//!
//! Unknown, malformed or oversized requests get no reply. The loop returns
//! when stdin closes or the pipe breaks.

use {
    log::{debug, info, warn},
    serde::Deserialize,
    std::io::{self, BufRead, Read, Write},
    stkflash::{Flasher, NativeOpener, ScannedPort, scan_ports},
};

use crate::Cli;
use crate::config::Config;

const MTYPE_DEV_FIND: &str = "1";
const MTYPE_FLASH_HEX: &str = "2";

/// Longest accepted request line, in bytes. Leaves room for the HEX text of
/// a full 128 KiB program.
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Reply to a successful flash.
const FLASH_COMPLETE: &str = "complete";

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(rename = "type")]
    kind: Option<String>,
    device: Option<String>,
    payload: Option<String>,
}

fn reply<W: Write, T: serde::Serialize>(output: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *output, value)?;
    output.write_all(b"\n")?;
    output.flush()
}

/// Answer one request. `Ok(false)` means the request was ignored.
fn handle_line<W, S, F>(line: &str, output: &mut W, scan: &mut S, flash: &mut F) -> io::Result<bool>
where
    W: Write,
    S: FnMut() -> Vec<ScannedPort>,
    F: FnMut(&str, &str) -> stkflash::Result<()>,
{
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            debug!("Ignoring malformed request: {e}");
            return Ok(false);
        },
    };

    match request.kind.as_deref() {
        Some(MTYPE_DEV_FIND) => {
            let found = scan();
            reply(output, &found)?;
        },
        Some(MTYPE_FLASH_HEX) => {
            let (Some(device), Some(payload)) = (request.device, request.payload) else {
                debug!("Ignoring flash request without device or payload");
                return Ok(false);
            };
            info!("Flashing {} bytes of HEX to {device}", payload.len());
            let status = match flash(&device, &payload) {
                Ok(()) => FLASH_COMPLETE.to_string(),
                Err(e) => {
                    warn!("Flashing {device} failed: {e}");
                    e.to_string()
                },
            };
            reply(output, &serde_json::json!({ "flash": status }))?;
        },
        other => {
            debug!("Ignoring request of type {other:?}");
            return Ok(false);
        },
    }
    Ok(true)
}

/// Discard input up to and including the next newline.
fn skip_line<R: BufRead>(input: &mut R) -> io::Result<()> {
    loop {
        let available = input.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            input.consume(pos + 1);
            return Ok(());
        }
        let len = available.len();
        input.consume(len);
    }
}

/// Read one request line into `buf` without buffering more than
/// [`MAX_MESSAGE_SIZE`] bytes of it.
///
/// Returns `None` at end of input and `Some(false)` for an oversized line.
fn read_message<R: BufRead>(input: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<bool>> {
    buf.clear();
    let limit = MAX_MESSAGE_SIZE as u64 + 1;
    if input.by_ref().take(limit).read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_MESSAGE_SIZE {
        skip_line(input)?;
        return Ok(Some(false));
    }
    Ok(Some(true))
}

/// Serve requests from `input` until it ends or an I/O error occurs.
pub(crate) fn run_bridge<R, W, S, F>(mut input: R, output: &mut W, mut scan: S, mut flash: F)
where
    R: BufRead,
    W: Write,
    S: FnMut() -> Vec<ScannedPort>,
    F: FnMut(&str, &str) -> stkflash::Result<()>,
{
    let mut buf = Vec::new();
    loop {
        match read_message(&mut input, &mut buf) {
            Ok(None) => break,
            Ok(Some(true)) => {},
            Ok(Some(false)) => {
                warn!("Ignoring request longer than {MAX_MESSAGE_SIZE} bytes");
                continue;
            },
            Err(e) => {
                warn!("Bridge input failed: {e}");
                return;
            },
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            debug!("Ignoring request that is not UTF-8");
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = handle_line(line, output, &mut scan, &mut flash) {
            warn!("Bridge output failed: {e}");
            return;
        }
    }
    debug!("Bridge input closed");
}

/// Bridge command implementation.
pub(crate) fn cmd_bridge(cli: &Cli, config: &Config) {
    let flash_config = cli.flash_config(config, stkflash::FlashConfig::default().page_size);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    run_bridge(stdin.lock(), &mut stdout, scan_ports, |device, hex| {
        Flasher::new(NativeOpener)
            .with_config(flash_config.clone())
            .flash_hex(hex, device, |p| debug!("Uploading: {}%", p.percent()))
    });
}
