//! Push-pull GPIO output behind the `embedded-hal` digital traits.
//!
//! The fan and the element SSRs are plain on/off loads.  Wrapping the raw
//! pin number in an [`OutputPin`] lets the hardware adapter stay generic,
//! so host tests drive it with recording mock pins instead.

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use super::hw_init;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError {
    pub pin: i32,
}

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin configured by [`hw_init::init_peripherals`].
#[derive(Debug)]
pub struct RawOutput {
    pin: i32,
    high: bool,
}

impl RawOutput {
    /// The pin must already be configured as an output.
    pub fn new(pin: i32) -> Self {
        Self { pin, high: false }
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    pub fn is_set_high(&self) -> bool {
        self.high
    }

    fn write(&mut self, high: bool) -> Result<(), GpioError> {
        hw_init::gpio_write(self.pin, high).map_err(|_| GpioError { pin: self.pin })?;
        self.high = high;
        Ok(())
    }
}

impl ErrorType for RawOutput {
    type Error = GpioError;
}

impl OutputPin for RawOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}
