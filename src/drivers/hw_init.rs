//! One-shot hardware peripheral initialization.
//!
//! Configures the pump LEDC timers/channels (10-bit, 5 kHz) and the
//! fan/element GPIO outputs from a validated [`ControllerConfig`], using
//! raw ESP-IDF sys calls.  Called once from `main()` before any worker
//! is spawned.  On the host every function is a no-op so the adapters
//! above it run unchanged in simulation.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

use crate::config::ControllerConfig;
use crate::error::ActuatorError;

/// LEDC duty resolution used for both pumps.
pub const PUMP_DUTY_BITS: u32 = 10;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcTimerFailed(i32),
    LedcChannelFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcTimerFailed(rc) => write!(f, "LEDC timer config failed (rc={})", rc),
            Self::LedcChannelFailed(rc) => write!(f, "LEDC channel config failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(cfg: &ControllerConfig) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any worker exists.
    unsafe {
        init_gpio_outputs(cfg)?;
        init_ledc(cfg)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(cfg: &ControllerConfig) -> Result<(), HwInitError> {
    log::info!(
        "hw_init(sim): peripheral init skipped (pumps on LEDC {}/{})",
        cfg.reflux_pump.pwm_channel,
        cfg.product_pump.pwm_channel
    );
    Ok(())
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs(cfg: &ControllerConfig) -> Result<(), HwInitError> {
    let output_pins = [cfg.fan_gpio, cfg.lp_element_gpio, cfg.hp_element_gpio];

    for &pin in &output_pins {
        let io = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&io) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // Elements and fan start de-energised.
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured (fan={}, lp={}, hp={})", output_pins[0], output_pins[1], output_pins[2]);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), ActuatorError> {
    // SAFETY: gpio_set_level writes to an output pin configured in
    // init_gpio_outputs(); the register write is atomic.
    let ret = unsafe { gpio_set_level(pin, u32::from(high)) };
    if ret != ESP_OK as i32 {
        return Err(ActuatorError::GpioWriteFailed);
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) -> Result<(), ActuatorError> {
    Ok(())
}

// ── LEDC PWM ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc(cfg: &ControllerConfig) -> Result<(), HwInitError> {
    for pump in [cfg.reflux_pump, cfg.product_pump] {
        let timer = ledc_timer_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            timer_num: u32::from(pump.timer_channel),
            duty_resolution: ledc_timer_bit_t_LEDC_TIMER_10_BIT,
            freq_hz: crate::pins::PUMP_PWM_FREQ_HZ,
            clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
            ..Default::default()
        };
        let ret = unsafe { ledc_timer_config(&timer) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::LedcTimerFailed(ret));
        }

        let ret = unsafe {
            ledc_channel_config(&ledc_channel_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel: u32::from(pump.pwm_channel),
                timer_sel: u32::from(pump.timer_channel),
                gpio_num: pump.gpio,
                duty: 0,
                hpoint: 0,
                ..Default::default()
            })
        };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::LedcChannelFailed(ret));
        }
    }

    info!(
        "hw_init: LEDC configured (reflux=CH{}, product=CH{}, {} Hz, {}-bit)",
        cfg.reflux_pump.pwm_channel,
        cfg.product_pump.pwm_channel,
        crate::pins::PUMP_PWM_FREQ_HZ,
        PUMP_DUTY_BITS
    );
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u8, duty: u32) -> Result<(), ActuatorError> {
    // SAFETY: the channel was configured in init_ledc(); each channel is
    // written by one worker only.
    unsafe {
        let ret = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, u32::from(channel), duty);
        if ret != ESP_OK as i32 {
            return Err(ActuatorError::PwmWriteFailed(ret));
        }
        let ret = ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, u32::from(channel));
        if ret != ESP_OK as i32 {
            return Err(ActuatorError::PwmWriteFailed(ret));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(channel: u8, _duty: u32) -> Result<(), ActuatorError> {
    if channel >= crate::config::LEDC_CHANNEL_COUNT {
        return Err(ActuatorError::ChannelUnavailable);
    }
    Ok(())
}
