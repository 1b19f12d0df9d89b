//! Actuator drivers, hardware initialisation, and task helpers.

pub mod gpio;
pub mod hw_init;
pub mod pump;
pub mod task_pin;
pub mod watchdog;
