//! Port traits: the boundary between control logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Adapters (LEDC/GPIO hardware, NVS, system timer) implement these
//! traits; the controller and the worker runtime consume them through
//! generics, so the control core never touches hardware directly and runs
//! unchanged against the mocks in `tests/`.

use log::warn;

use crate::config::ControllerTuning;
use crate::error::{ActuatorError, StorageError};

// ───────────────────────────────────────────────────────────────
// Actuator port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Binary outputs driven by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Fan,
    LpElement,
    HpElement,
}

pub trait ActuatorPort {
    /// Write a raw duty to an LEDC channel (10-bit, `0..=1024`).
    fn set_pwm_duty(&mut self, channel: u8, duty: u32) -> Result<(), ActuatorError>;

    /// Drive a binary output.
    fn set_output(&mut self, output: Output, on: bool) -> Result<(), ActuatorError>;

    /// De-energise every binary output, carrying on past failures.
    fn all_off(&mut self) {
        for output in [Output::Fan, Output::LpElement, Output::HpElement] {
            if let Err(e) = self.set_output(output, false) {
                warn!("ActuatorPort: could not switch {:?} off: {}", output, e);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tuning persistence (domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Durable storage for the controller tuning record.
///
/// `load_tuning` returning [`StorageError::NotFound`] is the normal
/// first-boot case; callers fall back to defaults.
pub trait TuningStore {
    fn load_tuning(&self) -> Result<ControllerTuning, StorageError>;

    fn save_tuning(&mut self, tuning: &ControllerTuning) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Monotonic microsecond clock shared by all workers.
pub trait Clock {
    fn now_us(&self) -> i64;
}
