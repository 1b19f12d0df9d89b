//! Fixed-period "delay-until" tick scheduling.
//!
//! Every worker runs one body per period.  The deadline advances by
//! exactly one period per tick so execution time does not accumulate as
//! drift.  When a body overruns past one or more boundaries, the missed
//! periods are counted and the next deadline snaps to the first boundary
//! not in the past; the worker never runs a burst of catch-up ticks.
//!
//! ```text
//!  deadline:   0        T        2T       3T       4T
//!              │ body │ │ body │  │ body ─────────┼──│ body │
//!              └sleep─┘ └sleep─┘  └─────overrun───┘  (3T missed)
//! ```
//!
//! Pure arithmetic over microsecond timestamps: the caller supplies
//! `now` and performs the sleep.

/// Deadline tracker for one periodic worker.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    period_us: i64,
    next_us: i64,
    missed: u64,
}

impl TickScheduler {
    /// First deadline is one period after `start_us`.  Periods shorter
    /// than 1 µs are raised to 1 µs.
    pub fn new(period_us: i64, start_us: i64) -> Self {
        let period_us = period_us.max(1);
        Self {
            period_us,
            next_us: start_us + period_us,
            missed: 0,
        }
    }

    /// Scheduler for a period given in seconds.
    pub fn from_secs(period_s: f64, start_us: i64) -> Self {
        Self::new((period_s * 1e6).round() as i64, start_us)
    }

    /// Consume the current deadline and return how long to sleep until
    /// it, in µs.  An overrun returns `0` or the distance to the next
    /// future boundary, and adds the skipped periods to [`missed`].
    ///
    /// [`missed`]: Self::missed
    pub fn advance(&mut self, now_us: i64) -> i64 {
        let mut deadline = self.next_us;
        if now_us > deadline {
            let late = now_us - deadline;
            let skipped = (late + self.period_us - 1) / self.period_us;
            deadline += skipped * self.period_us;
            self.missed += skipped as u64;
        }
        self.next_us = deadline + self.period_us;
        deadline - now_us
    }

    /// Deadline the next call to [`advance`](Self::advance) will use.
    pub fn next_deadline_us(&self) -> i64 {
        self.next_us
    }

    pub fn period_us(&self) -> i64 {
        self.period_us
    }

    /// Total periods skipped because of overruns.
    pub fn missed(&self) -> u64 {
        self.missed
    }
}
