//! Direct-form IIR filter engine.
//!
//! ```text
//!   x[n] ──▶ ┌──────────────┐
//!            │ Σ num[i]·x   │──┬──▶ y[n]
//!            │ − Σ den[j]·y │  │
//!            └──────────────┘  │
//!                 ▲            │
//!                 └── y[n-1..] ┘
//! ```
//!
//! `den[0]` multiplies `y[n-1]`: the leading denominator coefficient is
//! implicitly 1 and not stored.  Input and output histories are fixed
//! ring buffers indexed by a cursor, so a sample is inserted in O(1)
//! without shifting.
//!
//! An invalid [`FilterConfig`] does not panic or error at construction:
//! the resulting [`Filter`] reports itself unconfigured and every
//! [`Filter::filter`] call fails.

use heapless::Vec;
use log::warn;

use crate::error::{Error, FilterError, Result};

/// Maximum number of numerator or denominator taps.
pub const MAX_TAPS: usize = 6;

/// Filter coefficients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
    /// Feed-forward coefficients, `num[0]` applies to the newest input.
    pub num: Vec<f64, MAX_TAPS>,
    /// Feedback coefficients, `den[0]` applies to the previous output.
    pub den: Vec<f64, MAX_TAPS>,
}

impl FilterConfig {
    /// Build a config from slices.  Fails if either slice exceeds
    /// [`MAX_TAPS`]; content validity is checked by [`FilterConfig::check`].
    pub fn new(num: &[f64], den: &[f64]) -> Result<Self> {
        let num = Vec::from_slice(num).map_err(|_| Error::Config("too many numerator taps"))?;
        let den = Vec::from_slice(den).map_err(|_| Error::Config("too many denominator taps"))?;
        Ok(Self { num, den })
    }

    /// Validate tap counts and coefficient values.
    pub fn check(&self) -> Result<()> {
        if self.num.is_empty() {
            return Err(Error::Config("numerator must have at least one tap"));
        }
        if self.num.iter().chain(self.den.iter()).any(|c| !c.is_finite()) {
            return Err(Error::Config("filter coefficients must be finite"));
        }
        Ok(())
    }
}

// ── History ring ──────────────────────────────────────────────

/// Fixed-capacity newest-first history.  `get(0)` is the most recent
/// sample; pushing overwrites the oldest.
#[derive(Debug, Clone, Default)]
struct History {
    buf: [f64; MAX_TAPS],
    len: usize,
    head: usize,
}

impl History {
    fn with_len(len: usize) -> Self {
        Self {
            buf: [0.0; MAX_TAPS],
            len: len.min(MAX_TAPS),
            head: 0,
        }
    }

    fn push_front(&mut self, x: f64) {
        if self.len == 0 {
            return;
        }
        self.head = (self.head + self.len - 1) % self.len;
        self.buf[self.head] = x;
    }

    fn get(&self, i: usize) -> f64 {
        self.buf[(self.head + i) % self.len]
    }

    fn clear(&mut self) {
        self.buf = [0.0; MAX_TAPS];
        self.head = 0;
    }
}

// ── Filter ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Filter {
    cfg: FilterConfig,
    inputs: History,
    outputs: History,
    configured: bool,
}

impl Filter {
    pub fn new(cfg: FilterConfig) -> Self {
        let configured = match cfg.check() {
            Ok(()) => true,
            Err(e) => {
                warn!("Filter: {}", e);
                false
            }
        };
        Self {
            inputs: History::with_len(cfg.num.len()),
            outputs: History::with_len(cfg.den.len()),
            cfg,
            configured,
        }
    }

    /// Feed one sample and return the filtered output.
    pub fn filter(&mut self, x: f64) -> Result<f64> {
        if !self.configured {
            return Err(FilterError::Unconfigured.into());
        }
        if !x.is_finite() {
            return Err(FilterError::NonFiniteInput.into());
        }

        self.inputs.push_front(x);

        let mut y = 0.0;
        for (i, b) in self.cfg.num.iter().enumerate() {
            y += b * self.inputs.get(i);
        }
        for (j, a) in self.cfg.den.iter().enumerate() {
            y -= a * self.outputs.get(j);
        }

        self.outputs.push_front(y);
        Ok(y)
    }

    /// Zero both histories, keeping the coefficients.
    pub fn reset(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn config(&self) -> &FilterConfig {
        &self.cfg
    }
}
