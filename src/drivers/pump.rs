//! Variable-speed pump driver.
//!
//! Each pump is a brushless DC pump whose speed input is fed from one LEDC
//! channel (10-bit, 5 kHz).  The driver validates its [`PumpConfig`],
//! saturates requested speeds into `[PUMP_OFF, PUMP_MAX_SPEED]` and only
//! records a speed once the hardware write succeeded, so [`Pump::speed`]
//! is always the last speed actually applied.

use crate::app::ports::ActuatorPort;
use crate::config::PumpConfig;
use crate::error::Result;

pub const PUMP_OFF: u32 = 0;
pub const PUMP_IDLE_SPEED: u32 = 50;
pub const PUMP_MAX_SPEED: u32 = 1024;
pub const FLUSH_SPEED: u32 = 1024;

#[derive(Debug, Clone)]
pub struct Pump {
    cfg: PumpConfig,
    speed: u32,
}

impl Pump {
    pub fn new(cfg: PumpConfig) -> Result<Self> {
        cfg.check()?;
        Ok(Self {
            cfg,
            speed: PUMP_OFF,
        })
    }

    pub fn set_speed(&mut self, speed: u32, hw: &mut impl ActuatorPort) -> Result<()> {
        let speed = speed.min(PUMP_MAX_SPEED);
        hw.set_pwm_duty(self.cfg.pwm_channel, speed)?;
        self.speed = speed;
        Ok(())
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn config(&self) -> &PumpConfig {
        &self.cfg
    }
}
