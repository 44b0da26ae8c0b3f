//! Protocol pacing.
//!
//! Every delay the bootloader protocol needs lives here, named, and is
//! resolved once per session against the timing multiplier (1 at the primary
//! baud rate, 2 at the fallback rate). USB-serial drivers on some hosts need
//! noticeably longer gaps, so the set depends on a [`PlatformFamily`].

use std::fmt;
use std::thread;
use std::time::Duration;

/// Host family, as far as serial timing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlatformFamily {
    /// Linux, macOS and other hosts with responsive drivers.
    #[default]
    Standard,
    /// Hosts whose USB-serial drivers need longer settle times (Windows).
    SlowUsbSerial,
}

impl PlatformFamily {
    /// Family of the host this binary was built for.
    #[must_use]
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::SlowUsbSerial
        } else {
            Self::Standard
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::SlowUsbSerial => write!(f, "slow-usb-serial"),
        }
    }
}

/// A delay that may or may not scale with the timing multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    base: Duration,
    scaled: bool,
}

impl Wait {
    /// A delay independent of the multiplier.
    #[must_use]
    pub const fn fixed(base: Duration) -> Self {
        Self {
            base,
            scaled: false,
        }
    }

    /// A delay multiplied by the session's timing multiplier.
    #[must_use]
    pub const fn scaled(base: Duration) -> Self {
        Self { base, scaled: true }
    }

    /// Concrete duration for `multiplier`.
    #[must_use]
    pub fn resolve(self, multiplier: u32) -> Duration {
        if self.scaled {
            self.base * multiplier.max(1)
        } else {
            self.base
        }
    }
}

/// Named protocol delays for one platform family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Platform family these delays were chosen for.
    pub family: PlatformFamily,
    /// Pause after each warm-up GET_SYNC.
    pub warmup_pause: Wait,
    /// Wait between a GET_SYNC and reading its answer.
    pub sync_response: Wait,
    /// Wait between ENTER_PGMMODE and reading its answer.
    pub enter_response: Wait,
    /// Settle time (followed by a buffer flush) before EXIT_PGMMODE.
    pub exit_settle: Option<Wait>,
    /// Wait between EXIT_PGMMODE and reading its answer.
    pub exit_response: Wait,
    /// Wait after LOAD_ADDR.
    pub load_address_settle: Wait,
    /// Wait after PROG_PAGE.
    pub program_page_settle: Wait,
    /// Pause after each page.
    pub inter_page: Wait,
    /// Wait for the device to reset before retrying at the fallback rate.
    pub fallback_settle: Wait,
    /// Simple query (version, signature) response wait.
    pub query_response: Wait,
}

impl Timing {
    /// Delays for `family`.
    #[must_use]
    pub fn for_family(family: PlatformFamily) -> Self {
        let slow = family == PlatformFamily::SlowUsbSerial;
        Self {
            family,
            warmup_pause: Wait::fixed(Duration::from_millis(10)),
            sync_response: Wait::scaled(Duration::from_millis(400)),
            enter_response: Wait::fixed(Duration::from_millis(if slow { 200 } else { 50 })),
            exit_settle: slow.then_some(Wait::scaled(Duration::from_millis(300))),
            exit_response: Wait::scaled(Duration::from_millis(50)),
            load_address_settle: Wait::fixed(Duration::from_micros(25)),
            program_page_settle: Wait::fixed(Duration::from_micros(4500)),
            inter_page: if slow {
                Wait::scaled(Duration::from_millis(30))
            } else {
                Wait::fixed(Duration::from_millis(3))
            },
            fallback_settle: Wait::fixed(Duration::from_secs(3)),
            query_response: Wait::scaled(Duration::from_millis(50)),
        }
    }

    /// Delays for the host this binary was built for.
    #[must_use]
    pub fn native() -> Self {
        Self::for_family(PlatformFamily::native())
    }

    /// Resolve every delay for a session running at `multiplier`.
    #[must_use]
    pub fn resolve(&self, multiplier: u32) -> Delays {
        Delays {
            warmup_pause: self.warmup_pause.resolve(multiplier),
            sync_response: self.sync_response.resolve(multiplier),
            enter_response: self.enter_response.resolve(multiplier),
            exit_settle: self.exit_settle.map(|w| w.resolve(multiplier)),
            exit_response: self.exit_response.resolve(multiplier),
            load_address_settle: self.load_address_settle.resolve(multiplier),
            program_page_settle: self.program_page_settle.resolve(multiplier),
            inter_page: self.inter_page.resolve(multiplier),
            query_response: self.query_response.resolve(multiplier),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::native()
    }
}

/// Delays resolved for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    /// See [`Timing::warmup_pause`].
    pub warmup_pause: Duration,
    /// See [`Timing::sync_response`].
    pub sync_response: Duration,
    /// See [`Timing::enter_response`].
    pub enter_response: Duration,
    /// See [`Timing::exit_settle`].
    pub exit_settle: Option<Duration>,
    /// See [`Timing::exit_response`].
    pub exit_response: Duration,
    /// See [`Timing::load_address_settle`].
    pub load_address_settle: Duration,
    /// See [`Timing::program_page_settle`].
    pub program_page_settle: Duration,
    /// See [`Timing::inter_page`].
    pub inter_page: Duration,
    /// See [`Timing::query_response`].
    pub query_response: Duration,
}

/// Something that can block the current thread.
pub trait Sleeper: Send + Sync {
    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}
