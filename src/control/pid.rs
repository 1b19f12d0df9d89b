//! PID law for reflux pump speed.
//!
//! Head temperature above the setpoint means too much vapour is reaching
//! the product take-off, so the error is `temp − setpoint` and a positive
//! output drives more reflux.
//!
//! - Integral: trapezoidal, `I += ½·Ki·dt·(e + e_prev)`.
//! - Anti-windup: every tick `I` is clamped to
//!   `[max(0, idle − P), max(0, max − P)]` from the *current* `P`, so
//!   `P + I` alone never leaves the actuator band.
//! - Derivative: on measurement, smoothed by a biquad low-pass.  If the
//!   filter cannot produce a value the raw term is used for that tick.

use log::warn;

use super::lowpass::IirLowpassFilter;
use crate::config::ControllerTuning;
use crate::error::{InputError, Result};

/// Output of one [`PidController::compute`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidTerms {
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
    pub total: f64,
}

/// Actuator band the law works within.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputLimits {
    /// Hard floor of the output.
    pub off: f64,
    /// Lowest useful running speed; floor for `P + I`.
    pub idle: f64,
    /// Hard ceiling of the output and of `P + I`.
    pub max: f64,
}

pub struct PidController {
    tuning: ControllerTuning,
    dt: f64,
    limits: OutputLimits,
    deriv_filter: IirLowpassFilter,
    integral: f64,
    prev: Option<(f64, f64)>,
    last: PidTerms,
}

impl PidController {
    pub fn new(tuning: ControllerTuning, dt: f64, limits: OutputLimits) -> Self {
        Self {
            deriv_filter: IirLowpassFilter::new(tuning.lowpass()),
            tuning,
            dt,
            limits,
            integral: 0.0,
            prev: None,
            last: PidTerms::default(),
        }
    }

    /// Replace gains, setpoint and derivative filter.  Rejected tuning
    /// leaves the controller untouched.
    pub fn retune(&mut self, tuning: ControllerTuning) -> Result<()> {
        let values = [tuning.setpoint, tuning.kp, tuning.ki, tuning.kd];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(InputError::NonFinite.into());
        }
        tuning.lowpass().check()?;

        self.deriv_filter = IirLowpassFilter::new(tuning.lowpass());
        self.tuning = tuning;
        Ok(())
    }

    pub fn compute(&mut self, temp: f64) -> PidTerms {
        let t = &self.tuning;
        let error = temp - t.setpoint;
        // First sample primes the history: no derivative kick from zero.
        // Unlike a zeroed history, the first trapezoid is a full `Ki·dt·e`.
        let (prev_error, prev_temp) = self.prev.unwrap_or((error, temp));

        let proportional = t.kp * error;

        self.integral += 0.5 * t.ki * self.dt * (error + prev_error);
        let lo = (self.limits.idle - proportional).max(0.0);
        let hi = (self.limits.max - proportional).max(0.0);
        self.integral = self.integral.clamp(lo, hi);

        let raw = t.kd * (temp - prev_temp) / self.dt;
        let derivative = match self.deriv_filter.filter(raw) {
            Ok(d) => d,
            Err(e) => {
                warn!("PID: derivative filter failed ({}), using raw term", e);
                raw
            }
        };

        let total = (proportional + self.integral + derivative).clamp(self.limits.off, self.limits.max);

        self.prev = Some((error, temp));
        self.last = PidTerms {
            proportional,
            integral: self.integral,
            derivative,
            total,
        };
        self.last
    }

    pub fn tuning(&self) -> &ControllerTuning {
        &self.tuning
    }

    pub fn last(&self) -> PidTerms {
        self.last
    }
}
