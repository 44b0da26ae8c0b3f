//! End-to-end flashing.
//!
//! [`Flasher`] owns the whole policy around a [`BootloaderSession`]:
//!
//! 1. decode the Intel HEX input (no port is touched on a format error)
//! 2. open at the primary baud rate with timing multiplier 1 and sync
//! 3. on sync failure close, wait for the device to reset, reopen at the
//!    fallback rate with a larger multiplier and sync once more
//! 4. enter programming mode, write the image page by page, exit
//! 5. close the channel on every path
//!
//! ## Example
//!
//! ```rust,no_run
//! use stkflash::{Flasher, NativeOpener};
//!
//! fn main() -> stkflash::Result<()> {
//!     let hex = std::fs::read_to_string("firmware.hex")?;
//!     let mut flasher = Flasher::new(NativeOpener);
//!     flasher.flash_hex(&hex, "/dev/ttyUSB0", |p| {
//!         println!("{}%", p.percent());
//!     })
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::image::MemoryImage;
use crate::port::{DEFAULT_READ_TIMEOUT, PortOpener, SerialConfig};
use crate::protocol::stk500::{DEFAULT_BAUD, FALLBACK_BAUD, MAX_PAGE_SIZE};
use crate::target::session::{BootloaderSession, DeviceIdentity};
use crate::target::timing::{Sleeper, ThreadSleeper, Timing};

/// Largest image addressable through the 16-bit LOAD_ADDR word address.
pub const MAX_PROGRAM_SIZE: usize = (u16::MAX as usize + 1) * 2;

/// Timing multiplier used at the fallback baud rate.
pub const FALLBACK_MULTIPLIER: u32 = 2;

/// Cooperative cancellation check.
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Flashing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashConfig {
    /// Primary baud rate.
    pub baud_rate: u32,
    /// Baud rate retried after a failed sync, if any.
    pub fallback_baud: Option<u32>,
    /// Timing multiplier at the fallback rate.
    pub fallback_multiplier: u32,
    /// Bytes per PROG_PAGE.
    pub page_size: usize,
    /// Per-read timeout.
    pub read_timeout: Duration,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD,
            fallback_baud: Some(FALLBACK_BAUD),
            fallback_multiplier: FALLBACK_MULTIPLIER,
            page_size: MAX_PAGE_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl FlashConfig {
    /// Set the primary baud rate.
    #[must_use]
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the fallback baud rate.
    #[must_use]
    pub fn with_fallback_baud(mut self, baud: Option<u32>) -> Self {
        self.fallback_baud = baud;
        self
    }

    /// Never retry at a second baud rate.
    #[must_use]
    pub fn without_fallback(self) -> Self {
        self.with_fallback_baud(None)
    }

    /// Set the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the per-read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        // Page boundaries must stay word aligned.
        if self.page_size % 2 != 0 {
            return Err(Error::Config(format!(
                "page size must be even, got {}",
                self.page_size
            )));
        }
        Ok(())
    }
}

/// Upload progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashProgress {
    /// Bytes sent so far.
    pub bytes_written: usize,
    /// Image size.
    pub total_bytes: usize,
}

impl FlashProgress {
    /// Whole percent written, rounded down. An empty image is complete.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = self.bytes_written.min(self.total_bytes) * 100 / self.total_bytes;
        u8::try_from(pct).unwrap_or(100)
    }
}

/// Flash orchestrator.
pub struct Flasher<O: PortOpener> {
    opener: O,
    config: FlashConfig,
    timing: Timing,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancelCheck,
}

impl<O: PortOpener> Flasher<O> {
    /// Create a flasher with default configuration and host timing.
    ///
    /// Cancellation follows [`crate::is_interrupted_requested`].
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            config: FlashConfig::default(),
            timing: Timing::native(),
            sleeper: Arc::new(ThreadSleeper),
            cancel: Arc::new(crate::is_interrupted_requested),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: FlashConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the protocol timing.
    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Route every delay through `sleeper`.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the cancellation check evaluated at each page boundary.
    #[must_use]
    pub fn with_cancel_check(mut self, cancel: CancelCheck) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    /// Decode `hex` and write it to the device on `port`.
    pub fn flash_hex<F>(&mut self, hex: &str, port: &str, progress: F) -> Result<()>
    where
        F: FnMut(FlashProgress),
    {
        let image = MemoryImage::from_hex(hex)?;
        debug!(
            "Decoded {} bytes ({} pages)",
            image.len(),
            image.page_count(self.config.page_size.max(1))
        );
        self.flash_image(&image, port, progress)
    }

    /// Write an already decoded image to the device on `port`.
    pub fn flash_image<F>(&mut self, image: &MemoryImage, port: &str, mut progress: F) -> Result<()>
    where
        F: FnMut(FlashProgress),
    {
        self.config.validate()?;
        if image.len() > MAX_PROGRAM_SIZE {
            return Err(Error::Unsupported(format!(
                "image of {} bytes exceeds the {MAX_PROGRAM_SIZE} bytes reachable by LOAD_ADDR",
                image.len()
            )));
        }

        let mut session = self.connect(port)?;
        let result = self.upload(&mut session, image, &mut progress);
        let closed = session.close();
        result.and(closed)
    }

    /// Sync with the device on `port` and read its identity.
    pub fn identify(&mut self, port: &str) -> Result<DeviceIdentity> {
        let mut session = self.connect(port)?;
        let result = session.identify();
        let closed = session.close();
        result.and_then(|id| closed.map(|()| id))
    }

    /// Open and sync, falling back to the second baud rate once.
    fn connect(&mut self, port: &str) -> Result<BootloaderSession<O::Port>> {
        let mut session = self.open_session(port, self.config.baud_rate, 1)?;
        let err = match session.sync() {
            Ok(()) => return Ok(session),
            Err(e) => e,
        };

        let Some(fallback) = self.config.fallback_baud else {
            return Err(err);
        };

        warn!(
            "No sync at {} baud, retrying at {fallback} baud",
            self.config.baud_rate
        );
        if let Err(e) = session.close() {
            debug!("Close before fallback failed: {e}");
        }
        drop(session);
        self.sleeper.sleep(self.timing.fallback_settle.resolve(1));

        let mut session = self.open_session(port, fallback, self.config.fallback_multiplier)?;
        session.sync()?;
        Ok(session)
    }

    fn open_session(
        &mut self,
        port: &str,
        baud: u32,
        multiplier: u32,
    ) -> Result<BootloaderSession<O::Port>> {
        let serial = SerialConfig::new(port, baud).with_timeout(self.config.read_timeout);
        let session = BootloaderSession::open(&mut self.opener, &serial, multiplier, &self.timing)?;
        Ok(session.with_sleeper(Arc::clone(&self.sleeper)))
    }

    fn upload<F>(
        &self,
        session: &mut BootloaderSession<O::Port>,
        image: &MemoryImage,
        progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(FlashProgress),
    {
        session.enter_programming_mode()?;

        let total = image.len();
        let page_size = self.config.page_size;
        let pages = image.page_count(page_size);
        let inter_page = session.delays().inter_page;
        info!(
            "Uploading {total} bytes in {pages} pages (timing x{})",
            session.multiplier()
        );

        let mut written = 0;
        progress(FlashProgress {
            bytes_written: 0,
            total_bytes: total,
        });

        for (index, (offset, page)) in image.pages(page_size).enumerate() {
            if (self.cancel)() {
                warn!("Cancelled after {index}/{pages} pages");
                if let Err(e) = session.exit_programming_mode() {
                    debug!("Leaving programming mode after cancel failed: {e}");
                }
                return Err(Error::Cancelled);
            }

            let word_addr = u16::try_from(offset / 2).map_err(|_| {
                Error::Unsupported(format!("offset 0x{offset:X} beyond LOAD_ADDR range"))
            })?;
            session.load_address(word_addr)?;
            session.program_page(page)?;
            written += page.len();

            debug!(
                "Page {}/{pages} at word 0x{word_addr:04X} ({} bytes)",
                index + 1,
                page.len()
            );
            progress(FlashProgress {
                bytes_written: written,
                total_bytes: total,
            });
            self.sleeper.sleep(inter_page);
        }

        session.exit_programming_mode()?;
        info!("Upload complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::stk500::Command;
    use crate::target::testing::{
        PortLog, RecordingSleeper, ScriptedOpener, healthy, replying, silent, sync_on_attempt,
    };
    use crate::target::timing::PlatformFamily;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SAMPLE: &str = ":10010000214601360121470136007EFE09D21901\n\
                          :100110002146017E17C20001FF5F16002148011C\n\
                          :00000001FF\n";

    fn flasher(opener: ScriptedOpener) -> (Flasher<ScriptedOpener>, RecordingSleeper) {
        let sleeper = RecordingSleeper::default();
        let flasher = Flasher::new(opener)
            .with_timing(Timing::for_family(PlatformFamily::Standard))
            .with_sleeper(Arc::new(sleeper.clone()))
            .with_cancel_check(Arc::new(|| false));
        (flasher, sleeper)
    }

    fn image(len: usize) -> MemoryImage {
        #[allow(clippy::cast_possible_truncation)]
        MemoryImage::from((0..len).map(|i| i as u8).collect::<Vec<u8>>())
    }

    fn pages_written(log: &PortLog) -> Vec<Vec<u8>> {
        log.frames(Command::ProgPage)
    }

    #[test]
    fn test_flash_hex_success() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(healthy()));
        let mut seen = Vec::new();

        f.flash_hex(SAMPLE, "/dev/ttyUSB0", |p| seen.push(p.percent()))
            .unwrap();

        assert_eq!(log.opens(), vec![115200]);
        assert_eq!(log.closes(), 1);
        let pages = pages_written(&log);
        assert_eq!(pages.len(), 2);
        // 0x120 bytes: one full page plus 0x20 trailing bytes.
        assert_eq!(&pages[0][..4], &[0x64, 0x01, 0x00, 0x46]);
        assert_eq!(&pages[1][..4], &[0x64, 0x00, 0x20, 0x46]);
        assert_eq!(
            log.frames(Command::LoadAddress),
            vec![vec![0x55, 0x00, 0x00, 0x20], vec![0x55, 0x80, 0x00, 0x20]]
        );
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_wire_sequence() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(healthy()));
        f.flash_image(&image(4), "ttyS0", |_| {}).unwrap();

        assert_eq!(
            log.writes(),
            vec![
                vec![0x30, 0x20],
                vec![0x30, 0x20],
                vec![0x30, 0x20],
                vec![0x50, 0x20],
                vec![0x55, 0x00, 0x00, 0x20],
                vec![0x64, 0x00, 0x04, 0x46, 0x00, 0x01, 0x02, 0x03, 0x20],
                vec![0x51, 0x20],
            ]
        );
    }

    #[test]
    fn test_chunking() {
        let cases = [
            (1, 1, 1),
            (255, 1, 255),
            (256, 1, 256),
            (257, 2, 1),
            (1000, 4, 232),
            (1024, 4, 256),
        ];
        for (len, pages, last) in cases {
            let (opener, log) = ScriptedOpener::new();
            let (mut f, _) = flasher(opener.then_port(healthy()));
            f.flash_image(&image(len), "ttyS0", |_| {}).unwrap();

            let written = pages_written(&log);
            assert_eq!(written.len(), pages, "len {len}");
            // Frame overhead is 5 bytes.
            assert_eq!(written.last().unwrap().len() - 5, last, "len {len}");
        }
    }

    #[test]
    fn test_word_addresses() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(healthy()));
        f.flash_image(&image(1024), "ttyS0", |_| {}).unwrap();

        let addrs: Vec<u16> = log
            .frames(Command::LoadAddress)
            .iter()
            .map(|w| u16::from_le_bytes([w[1], w[2]]))
            .collect();
        assert_eq!(addrs, vec![0, 128, 256, 384]);
    }

    #[test]
    fn test_inter_page_delay() {
        let (opener, _) = ScriptedOpener::new();
        let (mut f, sleeper) = flasher(opener.then_port(healthy()));
        f.flash_image(&image(512), "ttyS0", |_| {}).unwrap();

        let pauses = sleeper
            .sleeps()
            .iter()
            .filter(|d| **d == Duration::from_millis(3))
            .count();
        assert_eq!(pauses, 2);
    }

    #[test]
    fn test_progress_is_monotonic_floor() {
        let (opener, _) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(healthy()));
        let mut seen = Vec::new();
        f.flash_image(&image(768), "ttyS0", |p| seen.push((p.bytes_written, p.percent())))
            .unwrap();
        assert_eq!(seen, vec![(0, 0), (256, 33), (512, 66), (768, 100)]);
    }

    #[test]
    fn test_fallback_baud() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, sleeper) = flasher(opener.then_port(silent()).then_port(healthy()));
        f.flash_image(&image(16), "ttyS0", |_| {}).unwrap();

        assert_eq!(log.opens(), vec![115200, 57600]);
        assert_eq!(log.closes(), 2);
        let sleeps = sleeper.sleeps();
        assert_eq!(
            sleeps
                .iter()
                .filter(|d| **d == Duration::from_secs(3))
                .count(),
            1
        );
        // Fallback session runs at multiplier 2.
        assert!(sleeps.contains(&Duration::from_millis(800)));
        assert!(sleeps.contains(&Duration::from_millis(100)));
    }

    #[test]
    fn test_fallback_sync_failure() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(silent()).then_port(silent()));
        let err = f.flash_image(&image(16), "ttyS0", |_| {}).unwrap_err();

        assert!(matches!(err, Error::SyncFailed(_)));
        assert_eq!(err.kind(), crate::ErrorKind::Sync);
        assert_eq!(log.opens(), vec![115200, 57600]);
        assert_eq!(log.closes(), 2);
        assert_eq!(
            log.frames(Command::GetSync).len(),
            2 * (crate::target::session::WARMUP_SYNCS + crate::target::session::MAX_SYNC_ATTEMPTS)
        );
    }

    #[test]
    fn test_no_fallback() {
        let (opener, log) = ScriptedOpener::new();
        let (f, sleeper) = flasher(opener.then_port(silent()));
        let mut f = f.with_config(FlashConfig::default().without_fallback());
        let err = f.flash_image(&image(16), "ttyS0", |_| {}).unwrap_err();

        assert!(matches!(err, Error::SyncFailed(_)));
        assert_eq!(log.opens(), vec![115200]);
        assert_eq!(log.closes(), 1);
        assert!(!sleeper.sleeps().contains(&Duration::from_secs(3)));
    }

    #[test]
    fn test_late_sync_on_primary() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(sync_on_attempt(7)));
        f.flash_image(&image(16), "ttyS0", |_| {}).unwrap();
        assert_eq!(log.opens(), vec![115200]);
        assert_eq!(log.closes(), 1);
    }

    #[test]
    fn test_format_error_touches_no_port() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(healthy()));
        let err = f
            .flash_hex(":10010000214601360121470136007EFE09D21901\n", "ttyS0", |_| {})
            .unwrap_err();

        assert!(matches!(err, Error::MissingEof));
        assert!(log.opens().is_empty());
        assert_eq!(log.closes(), 0);
    }

    #[test]
    fn test_open_failure() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_open_failure());
        let err = f.flash_image(&image(16), "ttyS0", |_| {}).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Channel);
        assert_eq!(log.closes(), 0);
    }

    #[test]
    fn test_fallback_open_failure_closes_primary() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(silent()).then_open_failure());
        let err = f.flash_image(&image(16), "ttyS0", |_| {}).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Channel);
        assert_eq!(log.opens(), vec![115200, 57600]);
        assert_eq!(log.closes(), 1);
    }

    #[test]
    fn test_enter_failure_closes_once() {
        let responder = replying(|frame| match frame[0] {
            0x50 => vec![0x14, 0x11],
            _ => vec![0x14, 0x10],
        });
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(responder));
        let err = f.flash_image(&image(16), "ttyS0", |_| {}).unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(log.closes(), 1);
        assert!(pages_written(&log).is_empty());
    }

    #[test]
    fn test_exit_failure_closes_once() {
        let responder = replying(|frame| match frame[0] {
            0x51 => Vec::new(),
            _ => vec![0x14, 0x10],
        });
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(responder));
        let err = f.flash_image(&image(300), "ttyS0", |_| {}).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
        assert_eq!(pages_written(&log).len(), 2);
        assert_eq!(log.closes(), 1);
    }

    #[test]
    fn test_cancel_at_page_boundary() {
        let (opener, log) = ScriptedOpener::new();
        let (f, _) = flasher(opener.then_port(healthy()));
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let mut f = f.with_cancel_check(Arc::new(move || counter.fetch_add(1, Ordering::SeqCst) >= 2));

        let err = f.flash_image(&image(1024), "ttyS0", |_| {}).unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(pages_written(&log).len(), 2);
        assert_eq!(log.frames(Command::LeaveProgMode).len(), 1);
        assert_eq!(log.closes(), 1);
    }

    #[test]
    fn test_oversized_image_rejected() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(healthy()));
        let err = f
            .flash_image(&image(MAX_PROGRAM_SIZE + 1), "ttyS0", |_| {})
            .unwrap_err();

        assert!(matches!(err, Error::Unsupported(_)));
        assert!(log.opens().is_empty());
    }

    #[test]
    fn test_largest_image_accepted() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(healthy()));
        f.flash_image(&image(MAX_PROGRAM_SIZE), "ttyS0", |_| {}).unwrap();
        let last = log.frames(Command::LoadAddress).pop().unwrap();
        assert_eq!(u16::from_le_bytes([last[1], last[2]]), 0xFF80);
    }

    #[test]
    fn test_empty_image() {
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(healthy()));
        let mut seen = Vec::new();
        f.flash_image(&MemoryImage::default(), "ttyS0", |p| seen.push(p.percent()))
            .unwrap();

        assert!(pages_written(&log).is_empty());
        assert_eq!(log.frames(Command::EnterProgMode).len(), 1);
        assert_eq!(log.frames(Command::LeaveProgMode).len(), 1);
        assert_eq!(seen, vec![100]);
        assert_eq!(log.closes(), 1);
    }

    #[test]
    fn test_invalid_page_size() {
        for size in [0, 3, 512] {
            let (opener, log) = ScriptedOpener::new();
            let (f, _) = flasher(opener.then_port(healthy()));
            let mut f = f.with_config(FlashConfig::default().with_page_size(size));
            let err = f.flash_image(&image(16), "ttyS0", |_| {}).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "size {size}");
            assert!(log.opens().is_empty());
        }
    }

    #[test]
    fn test_default_config() {
        let config = FlashConfig::default();
        assert_eq!(config.read_timeout, Duration::from_micros(4500));
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.fallback_baud, Some(57600));
        assert_eq!(config.fallback_multiplier, 2);
        assert_eq!(config.page_size, 256);
    }

    #[test]
    fn test_read_timeout_passed_to_opener() {
        let (opener, log) = ScriptedOpener::new();
        let (f, _) = flasher(opener.then_port(healthy()));
        let mut f = f.with_config(
            FlashConfig::default()
                .with_baud(38400)
                .with_read_timeout(Duration::from_millis(20)),
        );
        f.flash_image(&image(2), "ttyS0", |_| {}).unwrap();

        assert_eq!(log.opens(), vec![38400]);
        assert_eq!(log.last_timeout(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_identify() {
        let responder = replying(|frame| match frame {
            [0x41, 0x81, 0x20] => vec![0x14, 0x06, 0x10],
            [0x41, 0x82, 0x20] => vec![0x14, 0x00, 0x10],
            [0x75, 0x20] => vec![0x14, 0x1E, 0x97, 0x02, 0x10],
            _ => vec![0x14, 0x10],
        });
        let (opener, log) = ScriptedOpener::new();
        let (mut f, _) = flasher(opener.then_port(responder));
        let id = f.identify("ttyS0").unwrap();

        assert_eq!(id.signature, [0x1E, 0x97, 0x02]);
        assert_eq!((id.major, id.minor), (6, 0));
        assert_eq!(log.closes(), 1);
    }

    #[test]
    fn test_percent() {
        let p = |w, t| FlashProgress {
            bytes_written: w,
            total_bytes: t,
        };
        assert_eq!(p(0, 0).percent(), 100);
        assert_eq!(p(0, 300).percent(), 0);
        assert_eq!(p(256, 300).percent(), 85);
        assert_eq!(p(299, 300).percent(), 99);
        assert_eq!(p(300, 300).percent(), 100);
    }
}
