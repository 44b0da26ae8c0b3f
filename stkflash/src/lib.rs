//! # stkflash
//!
//! A library for flashing microcontrollers through an STK500-style serial
//! bootloader.
//!
//! This crate provides:
//!
//! - Intel HEX decoding into a flat, gap-filled memory image
//! - The bootloader session protocol (sync, programming mode, paged writes)
//! - A flash orchestrator with baud-rate fallback and cooperative cancellation
//! - Serial port discovery and controller banner probing
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//! - `serde`: Serialization support for scan results
//!
//! ## Example
//!
//! ```rust,no_run
//! use stkflash::{Flasher, MemoryImage, NativeOpener};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = MemoryImage::from_file("firmware.hex")?;
//!     println!("{} bytes, {} pages", image.len(), image.page_count(256));
//!
//!     let mut flasher = Flasher::new(NativeOpener);
//!     flasher.flash_image(&image, "/dev/ttyUSB0", |p| {
//!         println!("Uploading: {}%", p.percent());
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod device;
pub mod error;
pub mod host;
pub mod image;
pub mod port;
pub mod protocol;
pub mod target;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by long-running library loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications). Only the first
/// registration takes effect.
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

#[cfg(test)]
pub(crate) fn test_set_interrupted(value: bool) {
    use std::sync::atomic::{AtomicBool, Ordering};

    static TEST_INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    let flag = TEST_INTERRUPT_FLAG
        .get_or_init(|| {
            let shared = Arc::new(AtomicBool::new(false));
            let checker = Arc::clone(&shared);
            set_interrupt_checker(move || checker.load(Ordering::Relaxed));
            shared
        })
        .clone();

    flag.store(value, Ordering::Relaxed);
}

#[cfg(feature = "native")]
pub use port::{NativeOpener, NativePort, NativePortEnumerator};
#[cfg(feature = "native")]
pub use host::scan_ports;
pub use {
    device::{DetectedPort, DeviceKind},
    error::{Error, ErrorKind, Result},
    host::{
        ScannedPort, discover_ports, is_status_banner, probe_port, scan_ports_with,
    },
    image::{HexRecord, MemoryImage, RecordType, decode},
    port::{Port, PortEnumerator, PortInfo, PortOpener, SerialConfig},
    protocol::stk500::{Command, CommandFrame, Response},
    target::{
        BootloaderSession, CancelCheck, DeviceIdentity, FlashConfig, FlashProgress, Flasher,
        MAX_PROGRAM_SIZE, PlatformFamily, SessionState, Sleeper, ThreadSleeper, Timing,
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_checker_toggle() {
        test_set_interrupted(true);
        assert!(is_interrupted_requested());

        test_set_interrupted(false);
        assert!(!is_interrupted_requested());
    }
}
