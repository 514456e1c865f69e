//! Cancellable round timer for trivia rooms.
//!
//! A room has at most one pending deadline at a time. Arming a new
//! deadline replaces the old one and cancelling clears the slot, so a
//! deadline belonging to a superseded round can never fire.
//!
//! # Integration
//!
//! The timer sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         cmd = commands.recv() => { /* may arm or cancel the timer */ }
//!         deadline = timer.wait() => { /* advance the round, etc. */ }
//!     }
//! }
//! ```
//!
//! When nothing is armed, [`RoundTimer::wait`] pends forever and the
//! command branch keeps running.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// What a deadline stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadlineKind {
    /// Pre-game countdown has elapsed; the first round should be shown.
    Countdown,
    /// The per-round answer window closed.
    RoundTimeout,
    /// Every player answered; the settle delay for feedback has elapsed.
    AllAnswered,
    /// The pre-end notice has been shown long enough; publish results.
    GameEnding,
}

/// A scheduled (or just fired) deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub kind: DeadlineKind,
    /// Round the deadline was armed for. The owner compares this against
    /// its current round before acting.
    pub round: u32,
    pub at: Instant,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters kept by a [`RoundTimer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Deadlines armed.
    pub armed: u64,
    /// Deadlines that reached their instant and were returned by `wait`.
    pub fired: u64,
    /// Deadlines dropped before firing, by re-arming or cancelling.
    pub superseded: u64,
}

// ---------------------------------------------------------------------------
// RoundTimer
// ---------------------------------------------------------------------------

/// Single-slot deadline timer. One per room actor.
#[derive(Debug, Default)]
pub struct RoundTimer {
    slot: Option<Deadline>,
    stats: TimerStats,
}

impl RoundTimer {
    /// Creates a timer with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `kind` to fire `after` from now, replacing whatever was
    /// pending.
    pub fn arm(&mut self, kind: DeadlineKind, round: u32, after: Duration) {
        let deadline = Deadline {
            kind,
            round,
            at: Instant::now() + after,
        };
        if let Some(previous) = self.slot.replace(deadline) {
            self.stats.superseded += 1;
            debug!(
                previous = ?previous.kind,
                previous_round = previous.round,
                next = ?kind,
                round,
                "deadline superseded"
            );
        }
        self.stats.armed += 1;
        trace!(?kind, round, after_ms = after.as_millis() as u64, "deadline armed");
    }

    /// Arms `kind` only if it would fire before the pending deadline (or
    /// nothing is pending). Returns `true` if it was armed.
    pub fn arm_if_sooner(
        &mut self,
        kind: DeadlineKind,
        round: u32,
        after: Duration,
    ) -> bool {
        let at = Instant::now() + after;
        match self.slot {
            Some(pending) if pending.at <= at => {
                trace!(
                    ?kind,
                    pending = ?pending.kind,
                    "pending deadline is sooner, keeping it"
                );
                false
            }
            _ => {
                self.arm(kind, round, after);
                true
            }
        }
    }

    /// Clears the slot. Returns the deadline that was pending, if any.
    pub fn cancel(&mut self) -> Option<Deadline> {
        let cancelled = self.slot.take();
        if let Some(deadline) = cancelled {
            self.stats.superseded += 1;
            debug!(kind = ?deadline.kind, round = deadline.round, "deadline cancelled");
        }
        cancelled
    }

    /// Waits for the pending deadline and clears the slot.
    ///
    /// Pends forever when nothing is armed. Dropping the future (e.g.
    /// when another `select!` branch wins) leaves the slot untouched.
    pub async fn wait(&mut self) -> Deadline {
        let Some(deadline) = self.slot else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(deadline.at).await;

        self.slot = None;
        self.stats.fired += 1;
        trace!(kind = ?deadline.kind, round = deadline.round, "deadline fired");
        deadline
    }

    /// The pending deadline, if any.
    pub fn pending(&self) -> Option<&Deadline> {
        self.slot.as_ref()
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    /// Time left until the pending deadline, saturating at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.slot
            .map(|d| d.at.saturating_duration_since(Instant::now()))
    }

    pub fn stats(&self) -> TimerStats {
        self.stats
    }
}
