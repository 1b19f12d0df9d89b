//! Hardware adapter: bridges real peripherals to the [`ActuatorPort`].
//!
//! Pump duties go straight to the LEDC channels configured by
//! [`hw_init`](crate::drivers::hw_init); the fan and element outputs are
//! generic [`OutputPin`]s so the same adapter runs against
//! [`RawOutput`](crate::drivers::gpio::RawOutput) on the target and mock
//! pins on the host.

use embedded_hal::digital::{OutputPin, PinState};

use crate::app::ports::{ActuatorPort, Output};
use crate::drivers::gpio::RawOutput;
use crate::drivers::hw_init;
use crate::config::ControllerConfig;
use crate::error::ActuatorError;

/// Concrete adapter that combines all actuators behind the port trait.
pub struct HardwareAdapter<P: OutputPin> {
    fan: P,
    lp_element: P,
    hp_element: P,
}

impl HardwareAdapter<RawOutput> {
    /// Adapter over the pins named in `cfg`.  Call after
    /// [`hw_init::init_peripherals`].
    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self::new(
            RawOutput::new(cfg.fan_gpio),
            RawOutput::new(cfg.lp_element_gpio),
            RawOutput::new(cfg.hp_element_gpio),
        )
    }
}

impl<P: OutputPin> HardwareAdapter<P> {
    pub fn new(fan: P, lp_element: P, hp_element: P) -> Self {
        Self {
            fan,
            lp_element,
            hp_element,
        }
    }

    fn pin(&mut self, output: Output) -> &mut P {
        match output {
            Output::Fan => &mut self.fan,
            Output::LpElement => &mut self.lp_element,
            Output::HpElement => &mut self.hp_element,
        }
    }

    pub fn release(self) -> (P, P, P) {
        (self.fan, self.lp_element, self.hp_element)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<P: OutputPin> ActuatorPort for HardwareAdapter<P> {
    fn set_pwm_duty(&mut self, channel: u8, duty: u32) -> Result<(), ActuatorError> {
        hw_init::ledc_set(channel, duty)
    }

    fn set_output(&mut self, output: Output, on: bool) -> Result<(), ActuatorError> {
        self.pin(output)
            .set_state(PinState::from(on))
            .map_err(|_| ActuatorError::GpioWriteFailed)
    }
}
