//! GPIO / peripheral assignments for the still controller board.
//!
//! Only defaults: the deployed mapping comes from [`ControllerConfig`]
//! (see [`crate::config`]), which starts from these values.
//!
//! [`ControllerConfig`]: crate::config::ControllerConfig

// ---------------------------------------------------------------------------
// Pumps (LEDC PWM into the pump driver boards)
// ---------------------------------------------------------------------------

/// Reflux return pump PWM output.
pub const REFLUX_PUMP_GPIO: i32 = 23;
pub const REFLUX_PUMP_LEDC_CHANNEL: u8 = 0;
pub const REFLUX_PUMP_LEDC_TIMER: u8 = 0;

/// Product draw-off pump PWM output.
pub const PRODUCT_PUMP_GPIO: i32 = 22;
pub const PRODUCT_PUMP_LEDC_CHANNEL: u8 = 1;
pub const PRODUCT_PUMP_LEDC_TIMER: u8 = 1;

/// Pump PWM carrier frequency.
pub const PUMP_PWM_FREQ_HZ: u32 = 5_000;

// ---------------------------------------------------------------------------
// Switched outputs
// ---------------------------------------------------------------------------

/// Radiator fan relay (active HIGH).
pub const FAN_GPIO: i32 = 21;
/// Low-power boiler element SSR (slow PWM).
pub const LP_ELEMENT_GPIO: i32 = 13;
/// High-power boiler element SSR (slow PWM).
pub const HP_ELEMENT_GPIO: i32 = 32;

/// Highest usable GPIO number on the ESP32.
pub const GPIO_MAX: i32 = 39;
