//! Timers for Arcade rooms and background tasks.
//!
//! Two primitives:
//!
//! - [`Timer`]: a fire-once, cancellable deadline. Rooms own one per
//!   scheduled transition (countdown, round end, matchmaking auto-start).
//! - [`Sweep`]: a fixed interval that skips missed periods, used by the
//!   cleanup sweeper.
//!
//! # Event-driven waiting
//!
//! An unarmed [`Timer::fired`] pends forever, so a room can keep every
//! timer in its `tokio::select!` loop and only the armed ones ever
//! complete:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         cmd = rx.recv() => { /* handle commands */ }
//!         () = countdown.fired() => { /* begin the round */ }
//!         () = round.fired() => { /* time is up */ }
//!     }
//! }
//! ```
//!
//! Timers are plain values. Dropping the owner drops the deadline with
//! it, so a timer can never fire into a room that no longer exists.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A fire-once, cancellable deadline.
///
/// ```text
///   Disarmed ──arm(d)──→ Armed ──(deadline passes)──→ Disarmed
///       ↑                  │
///       └────cancel()──────┘
/// ```
///
/// Re-arming an armed timer replaces its deadline.
#[derive(Debug)]
pub struct Timer {
    /// Short label for logs, e.g. `"countdown"`.
    label: &'static str,
    deadline: Option<Instant>,
}

impl Timer {
    /// Creates a disarmed timer.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            deadline: None,
        }
    }

    /// Arms the timer to fire `after` from now. Returns the deadline.
    pub fn arm(&mut self, after: Duration) -> Instant {
        let deadline = Instant::now() + after;
        if self.deadline.replace(deadline).is_some() {
            debug!(timer = self.label, "re-armed timer, previous deadline dropped");
        }
        trace!(timer = self.label, after_ms = after.as_millis() as u64, "timer armed");
        deadline
    }

    /// Disarms the timer. Returns `true` if it was armed.
    ///
    /// Idempotent: cancelling a disarmed timer is a no-op.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.deadline.take().is_some();
        if was_armed {
            trace!(timer = self.label, "timer cancelled");
        }
        was_armed
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Completes once the deadline passes, disarming the timer.
    ///
    /// Pends forever while disarmed. Cancel-safe: if the future is dropped
    /// before the deadline (another `select!` branch won), the timer stays
    /// armed and a later call waits for the same deadline.
    pub async fn fired(&mut self) {
        let Some(deadline) = self.deadline else {
            std::future::pending::<()>().await;
            return;
        };

        time::sleep_until(deadline).await;
        self.deadline = None;
        trace!(timer = self.label, "timer fired");
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// A fixed interval for periodic background work.
///
/// The first sweep happens one full period after construction. When a
/// sweep runs late (the previous pass took longer than a period, or the
/// process was descheduled), missed periods are skipped and the cadence
/// restarts from now rather than bursting to catch up.
#[derive(Debug)]
pub struct Sweep {
    period: Duration,
    next: Instant,
    count: u64,
}

impl Sweep {
    /// Creates an interval that first fires one `period` from now.
    ///
    /// A zero period is bumped to one millisecond so the sweep loop can
    /// never spin.
    pub fn new(period: Duration) -> Self {
        let period = if period.is_zero() {
            warn!("sweep period of zero requested, using 1ms");
            Duration::from_millis(1)
        } else {
            period
        };
        Self {
            period,
            next: Instant::now() + period,
            count: 0,
        }
    }

    /// Waits for the next period. Returns the 1-based sweep number.
    pub async fn tick(&mut self) -> u64 {
        time::sleep_until(self.next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next);
        if late_by >= self.period {
            let skipped = late_by.as_nanos() / self.period.as_nanos();
            warn!(skipped = skipped as u64, "sweep overran, skipping missed periods");
        }
        self.next = now + self.period;
        self.count += 1;
        self.count
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }
}
