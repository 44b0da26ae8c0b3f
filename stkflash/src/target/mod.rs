//! Bootloader target: timing, session state machine and flash orchestration.

pub mod flasher;
pub mod session;
pub mod timing;

#[cfg(test)]
pub(crate) mod testing;

pub use flasher::{CancelCheck, FlashConfig, FlashProgress, Flasher, MAX_PROGRAM_SIZE};
pub use session::{BootloaderSession, DeviceIdentity, SessionState};
pub use timing::{Delays, PlatformFamily, Sleeper, ThreadSleeper, Timing, Wait};
