//! Second-order low-pass filter designed from a cutoff and sampling frequency.
//!
//! Coefficients follow the RBJ audio-EQ biquad with a fixed Q of 0.707,
//! normalised by `a0`.  Changing either frequency redesigns the filter and
//! zeroes its history.

use core::f64::consts::PI;

use log::warn;
use serde::{Deserialize, Serialize};

use super::filter::{Filter, FilterConfig};
use crate::error::{Error, Result};

const Q: f64 = 0.707;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowpassConfig {
    /// Sampling frequency (Hz).
    pub sample_freq: f64,
    /// -3 dB cutoff frequency (Hz).
    pub cutoff_freq: f64,
}

impl LowpassConfig {
    pub fn new(sample_freq: f64, cutoff_freq: f64) -> Self {
        Self {
            sample_freq,
            cutoff_freq,
        }
    }

    pub fn check(&self) -> Result<()> {
        let (fs, fc) = (self.sample_freq, self.cutoff_freq);
        if !fs.is_finite() || fs <= 0.0 {
            return Err(Error::Config("sample frequency must be finite and positive"));
        }
        if !fc.is_finite() || fc <= 0.0 {
            return Err(Error::Config("cutoff frequency must be finite and positive"));
        }
        if fc >= fs / 2.0 {
            return Err(Error::Config("cutoff frequency must be below Nyquist"));
        }
        Ok(())
    }

    /// Biquad coefficients for this design.
    pub fn design(&self) -> Result<FilterConfig> {
        self.check()?;

        let w0 = 2.0 * PI * self.cutoff_freq / self.sample_freq;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * Q);
        let a0 = 1.0 + alpha;

        let b1 = (1.0 - cos_w0) / a0;
        let b0 = b1 / 2.0;
        let num = [b0, b1, b0];
        let den = [-2.0 * cos_w0 / a0, (1.0 - alpha) / a0];

        FilterConfig::new(&num, &den)
    }
}

#[derive(Debug, Clone)]
pub struct IirLowpassFilter {
    cfg: LowpassConfig,
    filter: Filter,
}

impl IirLowpassFilter {
    /// An invalid design leaves the filter unconfigured; the requested
    /// frequencies are kept so a later setter can complete the design.
    pub fn new(cfg: LowpassConfig) -> Self {
        let filter = match cfg.design() {
            Ok(coeffs) => Filter::new(coeffs),
            Err(e) => {
                warn!("IirLowpassFilter: {}", e);
                Filter::default()
            }
        };
        Self { cfg, filter }
    }

    pub fn filter(&mut self, x: f64) -> Result<f64> {
        self.filter.filter(x)
    }

    pub fn set_cutoff_freq(&mut self, cutoff_freq: f64) -> Result<()> {
        self.redesign(LowpassConfig::new(self.cfg.sample_freq, cutoff_freq))
    }

    pub fn set_sample_freq(&mut self, sample_freq: f64) -> Result<()> {
        self.redesign(LowpassConfig::new(sample_freq, self.cfg.cutoff_freq))
    }

    fn redesign(&mut self, cfg: LowpassConfig) -> Result<()> {
        let coeffs = cfg.design()?;
        self.cfg = cfg;
        self.filter = Filter::new(coeffs);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.filter.is_configured()
    }

    pub fn lowpass_config(&self) -> LowpassConfig {
        self.cfg
    }

    pub fn coefficients(&self) -> &FilterConfig {
        self.filter.config()
    }
}
