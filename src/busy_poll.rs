use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::gpib_bus::{BusError, GpibBus};

/// Bit 4 of the status byte: the instrument is still processing.
pub const BUSY_BIT: u8 = 0x10;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Status byte returned by a serial poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte(u8);

impl StatusByte {
    /// Stand-in for a status response that was empty or unreadable.
    pub const ASSUMED_BUSY: Self = Self(BUSY_BIT);

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Parse a status response line. Empty or non-numeric text counts as busy.
    /// Values wider than a byte are masked to their low eight bits.
    pub fn from_response(response: &str) -> Self {
        response
            .trim()
            .parse::<u32>()
            .map_or(Self::ASSUMED_BUSY, |bits| Self((bits & 0xff) as u8))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_busy(self) -> bool {
        self.0 & BUSY_BIT != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollLimit {
    /// Poll until the busy bit clears, however long it takes.
    #[default]
    Unbounded,
    MaxAttempts(u32),
    Deadline(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub limit: PollLimit,
}

impl PollPolicy {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.limit = PollLimit::MaxAttempts(attempts);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.limit = PollLimit::Deadline(deadline);
        self
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        match self.limit {
            PollLimit::Unbounded => false,
            PollLimit::MaxAttempts(max) => attempts >= max,
            PollLimit::Deadline(deadline) => elapsed >= deadline,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            limit: PollLimit::Unbounded,
        }
    }
}

/// Cooperative cancellation flag for a running busy-wait.
///
/// Clones share the flag, so one clone can be handed to another thread
/// (a watchdog, a UI) while the measuring thread polls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Bus error while polling: {0}")]
    Bus(#[from] BusError),

    #[error("Instrument still busy after {attempts} status polls ({elapsed:?})")]
    Exhausted { attempts: u32, elapsed: Duration },

    #[error("Busy wait cancelled after {attempts} status polls")]
    Cancelled { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: StatusByte,
    pub attempts: u32,
}

/// Serial-poll the addressed device until its busy bit clears.
///
/// Sleeps `policy.interval` between polls. The cancel token is checked
/// before every poll.
pub fn wait_while_busy<B: GpibBus + ?Sized>(
    bus: &mut B,
    policy: &PollPolicy,
    cancel: Option<&CancelToken>,
) -> Result<PollOutcome, PollError> {
    #[cfg(feature = "cpu-profiling")]
    let _span = tracy_client::Client::running()
        .map(|client| client.span(tracy_client::span_location!("wait_while_busy"), 0));

    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            log::debug!("Busy wait cancelled after {} polls", attempts);
            return Err(PollError::Cancelled { attempts });
        }

        bus.request_status_poll()?;
        let response = bus.read()?;
        attempts += 1;

        let status = StatusByte::from_response(&response);
        if !status.is_busy() {
            log::debug!(
                "Instrument ready after {} polls (status 0x{:02x})",
                attempts,
                status.bits()
            );
            return Ok(PollOutcome { status, attempts });
        }
        log::trace!("Instrument busy (response {:?})", response);

        let elapsed = start.elapsed();
        if policy.exhausted(attempts, elapsed) {
            return Err(PollError::Exhausted { attempts, elapsed });
        }

        thread::sleep(policy.interval);
    }
}
