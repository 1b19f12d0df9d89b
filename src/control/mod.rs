//! Control core: the reflux controller and the numeric building blocks it
//! is made of.
//!
//! ```text
//!   TemperatureData ──▶ Controller ──▶ PidController ──▶ reflux Pump
//!                          │               └─ IirLowpassFilter (D term)
//!                          ├─ hysteresis ──────────────▶ product Pump
//!                          └─ SlowPwm ×2 ──────────────▶ element SSRs
//! ```
//!
//! Everything here is pure logic over ports: no sys calls, no globals.

pub mod controller;
pub mod filter;
pub mod lowpass;
pub mod pid;
pub mod slow_pwm;
