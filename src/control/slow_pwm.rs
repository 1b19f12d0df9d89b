//! Software PWM for loads switched too slowly for an LEDC channel.
//!
//! Heating elements sit behind SSRs that should cycle at a few hertz at
//! most.  Instead of a hardware counter, each [`SlowPwm::update`] compares
//! the wall clock against the start of the current cycle:
//!
//! ```text
//!   duty·T        T
//!  ├───────┤      │
//!  ┌───────┐      ┌───────┐
//!  │ HIGH  │ LOW  │ HIGH  │ LOW
//! ─┘       └──────┘       └──────
//!  ^ cycle start  ^ next boundary
//! ```
//!
//! If several periods elapse between calls, the cycle start snaps to the
//! latest period boundary at or before `now` rather than stepping through
//! each missed period.

use log::warn;

use crate::config::SlowPwmConfig;
use crate::error::{Error, InputError, Result};

/// Lowest supported switching frequency (Hz).
pub const MIN_FREQUENCY: f64 = 0.5;
/// Highest supported switching frequency (Hz).
pub const MAX_FREQUENCY: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct SlowPwm {
    frequency: f64,
    period_us: f64,
    duty: f64,
    cycle_start_us: i64,
    output: bool,
    configured: bool,
}

impl SlowPwm {
    pub fn new(cfg: SlowPwmConfig) -> Self {
        let configured = match Self::check(&cfg) {
            Ok(()) => true,
            Err(e) => {
                warn!("SlowPwm: {}", e);
                false
            }
        };
        let period_us = if configured { 1e6 / cfg.frequency } else { 0.0 };

        Self {
            frequency: cfg.frequency,
            period_us,
            duty: 0.0,
            cycle_start_us: 0,
            output: false,
            configured,
        }
    }

    pub fn check(cfg: &SlowPwmConfig) -> Result<()> {
        if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&cfg.frequency) {
            return Err(Error::Config("slow PWM frequency must be within 0.5–60 Hz"));
        }
        Ok(())
    }

    /// Advance to `now_us` and return the resulting output level.
    pub fn update(&mut self, now_us: i64) -> Result<bool> {
        if !self.configured {
            return Err(Error::NotConfigured("slow PWM"));
        }

        let mut elapsed = (now_us - self.cycle_start_us) as f64;
        if elapsed >= self.period_us || elapsed < 0.0 {
            let cycles = (now_us as f64 / self.period_us).floor();
            self.cycle_start_us = (cycles * self.period_us) as i64;
            elapsed = (now_us - self.cycle_start_us) as f64;
        }

        self.output = elapsed <= self.duty * self.period_us;
        Ok(self.output)
    }

    /// Rejects anything outside `[0, 1]` without changing state.
    pub fn set_duty_cycle(&mut self, duty: f64) -> Result<()> {
        if !self.configured {
            return Err(Error::NotConfigured("slow PWM"));
        }
        if !(0.0..=1.0).contains(&duty) {
            warn!("SlowPwm: duty cycle {} rejected", duty);
            return Err(InputError::DutyCycle.into());
        }
        self.duty = duty;
        Ok(())
    }

    pub fn duty_cycle(&self) -> f64 {
        self.duty
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn output(&self) -> bool {
        self.output
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }
}
