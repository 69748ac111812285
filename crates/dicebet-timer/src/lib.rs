//! Per-room round countdown for Dicebet.
//!
//! A [`RoundTimer`] holds at most one armed deadline. When the deadline
//! passes, [`RoundTimer::expired`] resolves with the round *generation*
//! the timer was armed for, and the timer disarms itself. The owner
//! compares that generation with its own before acting, so an expiry that
//! raced a manual action is recognisably stale.
//!
//! # Integration
//!
//! The timer sits inside a room actor's `tokio::select!` loop, next to
//! the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         expiry = timer.expired() => {
//!             if room.generation() == expiry.generation { /* auto-roll */ }
//!         }
//!     }
//! }
//! ```
//!
//! When disarmed, `expired` pends forever and `select!` simply keeps
//! serving the other branches.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Shortest round countdown a room may configure, in seconds.
pub const MIN_ROUND_SECS: u64 = 10;
/// Longest round countdown a room may configure, in seconds.
pub const MAX_ROUND_SECS: u64 = 120;
/// Countdown used when a room does not choose one.
pub const DEFAULT_ROUND_SECS: u64 = 30;

/// What [`RoundTimer::expired`] reports when the deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    /// The generation passed to [`RoundTimer::arm`].
    pub generation: u64,
    /// How far past the deadline the timer was actually polled.
    pub late_by: Duration,
}

/// Counters kept for the lifetime of one timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Times [`RoundTimer::arm`] was called.
    pub armed: u64,
    /// Arms that overwrote a still-pending deadline.
    pub replaced: u64,
    /// Pending deadlines removed by [`RoundTimer::cancel`].
    pub cancelled: u64,
    /// Deadlines that actually fired.
    pub fired: u64,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    generation: u64,
    deadline: Instant,
}

/// A single-shot, re-armable round countdown.
#[derive(Debug, Default)]
pub struct RoundTimer {
    armed: Option<Armed>,
    stats: TimerStats,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `duration` from now for `generation`,
    /// replacing any pending deadline. Returns the new deadline.
    pub fn arm(&mut self, generation: u64, duration: Duration) -> Instant {
        let deadline = Instant::now() + duration;
        if let Some(previous) = self.armed.replace(Armed { generation, deadline }) {
            self.stats.replaced += 1;
            debug!(
                old_generation = previous.generation,
                generation, "round timer replaced"
            );
        } else {
            debug!(generation, secs = duration.as_secs(), "round timer armed");
        }
        self.stats.armed += 1;
        deadline
    }

    /// Disarms the timer. Returns `true` if a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                self.stats.cancelled += 1;
                debug!(generation = armed.generation, "round timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Waits for the armed deadline and disarms the timer.
    ///
    /// Pends forever while disarmed. Cancel-safe: if the future is
    /// dropped before the deadline, the timer stays armed.
    pub async fn expired(&mut self) -> Expiry {
        let Some(armed) = self.armed else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(armed.deadline).await;

        self.armed = None;
        self.stats.fired += 1;
        let late_by = Instant::now().saturating_duration_since(armed.deadline);
        trace!(generation = armed.generation, ?late_by, "round timer fired");

        Expiry {
            generation: armed.generation,
            late_by,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Generation of the pending deadline, if any.
    pub fn generation(&self) -> Option<u64> {
        self.armed.map(|a| a.generation)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|a| a.deadline)
    }

    /// Time left until the pending deadline (zero once it has passed).
    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .map(|a| a.deadline.saturating_duration_since(Instant::now()))
    }

    pub fn stats(&self) -> &TimerStats {
        &self.stats
    }
}
