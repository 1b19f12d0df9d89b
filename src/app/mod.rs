//! Application layer.
//!
//! [`ports`] defines the traits the control core talks through;
//! [`runtime`] owns the bus and spawns the worker threads that drive it.
//! All interaction with hardware happens through the port traits, keeping
//! the core fully testable without real peripherals.

pub mod ports;
pub mod runtime;
