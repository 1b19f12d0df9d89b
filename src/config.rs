//! Controller configuration, tuning and operating settings.
//!
//! `ControllerConfig` is the static hardware setup, fixed at boot.
//! `ControllerTuning` and `ControllerSettings` are runtime parameters that
//! arrive as bus messages; tuning is also persisted through
//! [`TuningStore`](crate::app::ports::TuningStore).
//!
//! JSON field names match the on-device configuration file.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::control::lowpass::LowpassConfig;
use crate::error::{Error, Result};
use crate::pins;

/// LEDC channels available on the ESP32 low-speed group.
pub const LEDC_CHANNEL_COUNT: u8 = 8;
/// LEDC timers available on the ESP32 low-speed group.
pub const LEDC_TIMER_COUNT: u8 = 4;

fn check_gpio(gpio: i32, what: &'static str) -> Result<()> {
    if !(0..=pins::GPIO_MAX).contains(&gpio) {
        warn!("{} GPIO {} is out of range", what, gpio);
        return Err(Error::Config(what));
    }
    Ok(())
}

// ── Pump ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpConfig {
    #[serde(rename = "GPIO")]
    pub gpio: i32,
    #[serde(rename = "PWMChannel")]
    pub pwm_channel: u8,
    #[serde(rename = "timerChannel")]
    pub timer_channel: u8,
}

impl PumpConfig {
    pub fn check(&self) -> Result<()> {
        check_gpio(self.gpio, "pump GPIO out of range")?;
        if self.pwm_channel >= LEDC_CHANNEL_COUNT {
            return Err(Error::Config("pump PWM channel out of range"));
        }
        if self.timer_channel >= LEDC_TIMER_COUNT {
            return Err(Error::Config("pump timer channel out of range"));
        }
        Ok(())
    }
}

// ── Slow PWM ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlowPwmConfig {
    /// Switching frequency (Hz).
    #[serde(rename = "PWMFreq")]
    pub frequency: f64,
}

// ── Controller ────────────────────────────────────────────────

/// Static controller hardware setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Control loop period (seconds).
    pub dt: f64,
    #[serde(rename = "GPIO_fan")]
    pub fan_gpio: i32,
    #[serde(rename = "GPIO_element1")]
    pub lp_element_gpio: i32,
    #[serde(rename = "GPIO_element2")]
    pub hp_element_gpio: i32,
    #[serde(rename = "RefluxPump")]
    pub reflux_pump: PumpConfig,
    #[serde(rename = "ProductPump")]
    pub product_pump: PumpConfig,
    #[serde(rename = "slowPMWLPElement")]
    pub lp_element_pwm: SlowPwmConfig,
    #[serde(rename = "slowPMWHPElement")]
    pub hp_element_pwm: SlowPwmConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            dt: 0.2,
            fan_gpio: pins::FAN_GPIO,
            lp_element_gpio: pins::LP_ELEMENT_GPIO,
            hp_element_gpio: pins::HP_ELEMENT_GPIO,
            reflux_pump: PumpConfig {
                gpio: pins::REFLUX_PUMP_GPIO,
                pwm_channel: pins::REFLUX_PUMP_LEDC_CHANNEL,
                timer_channel: pins::REFLUX_PUMP_LEDC_TIMER,
            },
            product_pump: PumpConfig {
                gpio: pins::PRODUCT_PUMP_GPIO,
                pwm_channel: pins::PRODUCT_PUMP_LEDC_CHANNEL,
                timer_channel: pins::PRODUCT_PUMP_LEDC_TIMER,
            },
            lp_element_pwm: SlowPwmConfig { frequency: 5.0 },
            hp_element_pwm: SlowPwmConfig { frequency: 5.0 },
        }
    }
}

impl ControllerConfig {
    /// Parse and validate the `ControllerConfig` JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| {
            warn!("ControllerConfig: {}", e);
            Error::Config("malformed controller config")
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(Error::Config("loop period must be positive"));
        }

        self.reflux_pump.check()?;
        self.product_pump.check()?;
        if self.reflux_pump.gpio == self.product_pump.gpio
            || self.reflux_pump.pwm_channel == self.product_pump.pwm_channel
        {
            return Err(Error::Config("pumps must use separate GPIOs and PWM channels"));
        }

        check_gpio(self.fan_gpio, "fan GPIO out of range")?;
        check_gpio(self.lp_element_gpio, "LP element GPIO out of range")?;
        check_gpio(self.hp_element_gpio, "HP element GPIO out of range")?;
        if self.fan_gpio == self.lp_element_gpio
            || self.fan_gpio == self.hp_element_gpio
            || self.lp_element_gpio == self.hp_element_gpio
        {
            return Err(Error::Config("fan and element GPIOs must be distinct"));
        }
        Ok(())
    }
}

// ── Tuning ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerTuning {
    /// Head temperature target (°C).
    pub setpoint: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Derivative low-pass cutoff (Hz).
    pub lpf_cutoff_hz: f64,
    /// Derivative low-pass sampling frequency (Hz).
    pub lpf_sample_hz: f64,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            setpoint: 0.0,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            lpf_cutoff_hz: 1.0,
            lpf_sample_hz: 5.0,
        }
    }
}

impl ControllerTuning {
    pub fn lowpass(&self) -> LowpassConfig {
        LowpassConfig::new(self.lpf_sample_hz, self.lpf_cutoff_hz)
    }
}

// ── Settings ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpMode {
    #[default]
    Off,
    Manual,
    ActiveControl,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSettings {
    pub reflux_mode: PumpMode,
    pub product_mode: PumpMode,
    pub manual_reflux_speed: u32,
    pub manual_product_speed: u32,
}
