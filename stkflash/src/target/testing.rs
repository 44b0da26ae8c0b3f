//! In-memory channel doubles for session and flasher tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::port::{Port, PortOpener, SerialConfig};
use crate::protocol::stk500::Command;
use crate::target::session::WARMUP_SYNCS;
use crate::target::timing::Sleeper;

/// Computes the bootloader's answer to one written frame.
pub(crate) type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

const INSYNC_OK: [u8; 2] = [0x14, 0x10];

/// Responder built from a closure.
pub(crate) fn replying<F>(f: F) -> Responder
where
    F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
{
    Box::new(f)
}

/// A bootloader that acknowledges everything.
pub(crate) fn healthy() -> Responder {
    replying(|_| INSYNC_OK.to_vec())
}

/// A device that never answers.
pub(crate) fn silent() -> Responder {
    replying(|_| Vec::new())
}

/// Answers GET_SYNC only on timed attempt `n` (after the warm-up frames).
pub(crate) fn sync_on_attempt(n: usize) -> Responder {
    let mut syncs = 0;
    replying(move |frame| {
        if frame.first() == Some(&(Command::GetSync as u8)) {
            syncs += 1;
            if syncs == WARMUP_SYNCS + n {
                INSYNC_OK.to_vec()
            } else {
                Vec::new()
            }
        } else {
            INSYNC_OK.to_vec()
        }
    })
}

#[derive(Default)]
struct LogInner {
    writes: Vec<Vec<u8>>,
    clears: usize,
    closes: usize,
    fail_writes: usize,
    opens: Vec<u32>,
    timeouts: Vec<Duration>,
}

/// Shared record of everything the code under test did to its channels.
#[derive(Clone, Default)]
pub(crate) struct PortLog(Arc<Mutex<LogInner>>);

impl PortLog {
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().writes.clone()
    }

    /// Written frames starting with `cmd`.
    pub(crate) fn frames(&self, cmd: Command) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|w| w.first() == Some(&(cmd as u8)))
            .collect()
    }

    pub(crate) fn clear_writes(&self) {
        self.0.lock().unwrap().writes.clear();
    }

    pub(crate) fn clears(&self) -> usize {
        self.0.lock().unwrap().clears
    }

    /// Number of `Port::close` calls across every channel.
    pub(crate) fn closes(&self) -> usize {
        self.0.lock().unwrap().closes
    }

    /// Read timeout of the most recently opened channel.
    pub(crate) fn last_timeout(&self) -> Option<Duration> {
        self.0.lock().unwrap().timeouts.last().copied()
    }

    /// Baud rates of every open attempt, in order.
    pub(crate) fn opens(&self) -> Vec<u32> {
        self.0.lock().unwrap().opens.clone()
    }

    /// Make the next `n` writes fail.
    pub(crate) fn fail_writes(&self, n: usize) {
        self.0.lock().unwrap().fail_writes = n;
    }
}

/// Channel whose answers come from a [`Responder`].
pub(crate) struct ScriptedPort {
    name: String,
    baud_rate: u32,
    responder: Responder,
    pending: Vec<u8>,
    log: PortLog,
}

impl ScriptedPort {
    pub(crate) fn new(name: &str, baud_rate: u32, responder: Responder) -> (Self, PortLog) {
        let log = PortLog::default();
        (Self::with_log(name, baud_rate, responder, log.clone()), log)
    }

    fn with_log(name: &str, baud_rate: u32, responder: Responder, log: PortLog) -> Self {
        Self {
            name: name.to_string(),
            baud_rate,
            responder,
            pending: Vec::new(),
            log,
        }
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"));
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        {
            let mut inner = self.log.0.lock().unwrap();
            if inner.fail_writes > 0 {
                inner.fail_writes -= 1;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
            }
            inner.writes.push(buf.to_vec());
        }
        let answer = (self.responder)(buf);
        self.pending.extend(answer);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for ScriptedPort {
    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.pending.clear();
        self.log.0.lock().unwrap().clears += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        self.log.0.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Opener handing out scripted channels, one script entry per open.
pub(crate) struct ScriptedOpener {
    script: VecDeque<Option<(Responder, Vec<u8>)>>,
    log: PortLog,
}

impl ScriptedOpener {
    pub(crate) fn new() -> (Self, PortLog) {
        let log = PortLog::default();
        (
            Self {
                script: VecDeque::new(),
                log: log.clone(),
            },
            log,
        )
    }

    /// Next open succeeds with a channel answering via `responder`.
    #[must_use]
    pub(crate) fn then_port(mut self, responder: Responder) -> Self {
        self.script.push_back(Some((responder, Vec::new())));
        self
    }

    /// Next open succeeds with a channel that has `banner` waiting to be read.
    #[must_use]
    pub(crate) fn then_banner(mut self, banner: &[u8]) -> Self {
        self.script.push_back(Some((silent(), banner.to_vec())));
        self
    }

    /// Next open fails.
    #[must_use]
    pub(crate) fn then_open_failure(mut self) -> Self {
        self.script.push_back(None);
        self
    }
}

impl PortOpener for ScriptedOpener {
    type Port = ScriptedPort;

    fn open(&mut self, config: &SerialConfig) -> Result<ScriptedPort> {
        {
            let mut inner = self.log.0.lock().unwrap();
            inner.opens.push(config.baud_rate);
            inner.timeouts.push(config.timeout);
        }
        match self.script.pop_front() {
            Some(Some((responder, banner))) => {
                let mut port =
                    ScriptedPort::with_log(&config.port_name, config.baud_rate, responder, self.log.clone());
                port.pending = banner;
                Ok(port)
            },
            _ => Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such port: {}", config.port_name),
            ))),
        }
    }
}

/// Sleeper that records instead of sleeping.
#[derive(Clone, Default)]
pub(crate) struct RecordingSleeper(Arc<Mutex<Vec<Duration>>>);

impl RecordingSleeper {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_answers_accumulate_until_cleared() {
        let (mut port, _) = ScriptedPort::new("ttyTEST", 115200, healthy());
        port.write_all_bytes(&[0x30, 0x20]).unwrap();
        port.write_all_bytes(&[0x30, 0x20]).unwrap();
        assert_eq!(port.read_response().unwrap(), vec![0x14, 0x10, 0x14, 0x10]);

        port.write_all_bytes(&[0x30, 0x20]).unwrap();
        port.clear_buffers().unwrap();
        assert!(port.read_response().unwrap().is_empty());
    }
}
