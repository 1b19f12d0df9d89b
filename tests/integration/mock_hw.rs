//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real LEDC/GPIO registers, and keeps the
//! tuning record in memory with switchable failures.

use std::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use stillctl::app::ports::{ActuatorPort, Output, TuningStore};
use stillctl::config::ControllerTuning;
use stillctl::error::{ActuatorError, StorageError};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Duty { channel: u8, duty: u32 },
    Output { output: Output, on: bool },
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    /// LEDC channels whose writes fail.
    pub failing_channels: Vec<u8>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Duties written to `channel`, oldest first.
    pub fn duties(&self, channel: u8) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                ActuatorCall::Duty { channel: ch, duty } if ch == channel => Some(duty),
                _ => None,
            })
            .collect()
    }

    pub fn last_duty(&self, channel: u8) -> Option<u32> {
        self.duties(channel).last().copied()
    }

    pub fn last_output(&self, output: Output) -> Option<bool> {
        self.calls.iter().rev().find_map(|c| match *c {
            ActuatorCall::Output { output: o, on } if o == output => Some(on),
            _ => None,
        })
    }

    pub fn duty_writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ActuatorCall::Duty { .. }))
            .count()
    }
}

impl ActuatorPort for MockHardware {
    fn set_pwm_duty(&mut self, channel: u8, duty: u32) -> Result<(), ActuatorError> {
        if self.failing_channels.contains(&channel) {
            return Err(ActuatorError::PwmWriteFailed(-1));
        }
        self.calls.push(ActuatorCall::Duty { channel, duty });
        Ok(())
    }

    fn set_output(&mut self, output: Output, on: bool) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::Output { output, on });
        Ok(())
    }
}

// ── MockStore ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStore {
    pub tuning: Option<ControllerTuning>,
    pub load_error: Option<StorageError>,
    pub fail_saves: bool,
    pub saves: u32,
}

#[allow(dead_code)]
impl MockStore {
    pub fn with_tuning(tuning: ControllerTuning) -> Self {
        Self {
            tuning: Some(tuning),
            ..Self::default()
        }
    }

    pub fn corrupted() -> Self {
        Self {
            load_error: Some(StorageError::Corrupted),
            ..Self::default()
        }
    }
}

impl TuningStore for MockStore {
    fn load_tuning(&self) -> Result<ControllerTuning, StorageError> {
        if let Some(e) = self.load_error {
            return Err(e);
        }
        self.tuning.ok_or(StorageError::NotFound)
    }

    fn save_tuning(&mut self, tuning: &ControllerTuning) -> Result<(), StorageError> {
        if self.fail_saves {
            return Err(StorageError::IoError);
        }
        self.tuning = Some(*tuning);
        self.saves += 1;
        Ok(())
    }
}

// ── MockPin ───────────────────────────────────────────────────

/// Output pin that remembers its level and how often it was written.
#[derive(Debug, Default)]
pub struct MockPin {
    pub high: bool,
    pub writes: u32,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}
