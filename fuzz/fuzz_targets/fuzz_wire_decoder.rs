//! Fuzz target: `Message::from_wire` / `MessageBus::broadcast_frame`
//!
//! Drives arbitrary byte sequences into the wire decoder and asserts that
//! it never panics, that anything it accepts re-encodes to a frame it
//! accepts again, and that rejected frames reach no inbox.  Accepted
//! frames are then handled and ticked by a live controller.
//!
//! cargo fuzz run fuzz_wire_decoder

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use stillctl::app::ports::{ActuatorPort, Output, TuningStore};
use stillctl::bus::message::{Message, MessageKind};
use stillctl::bus::{MessageBus, Subscriber};
use stillctl::config::{ControllerConfig, ControllerTuning};
use stillctl::control::controller::Controller;
use stillctl::drivers::pump::PUMP_MAX_SPEED;
use stillctl::error::{ActuatorError, StorageError};

#[derive(Default)]
struct Sink {
    max_duty: u32,
}

impl ActuatorPort for Sink {
    fn set_pwm_duty(&mut self, _: u8, duty: u32) -> Result<(), ActuatorError> {
        self.max_duty = self.max_duty.max(duty);
        Ok(())
    }

    fn set_output(&mut self, _: Output, _: bool) -> Result<(), ActuatorError> {
        Ok(())
    }
}

struct NoStore;

impl TuningStore for NoStore {
    fn load_tuning(&self) -> Result<ControllerTuning, StorageError> {
        Err(StorageError::NotFound)
    }

    fn save_tuning(&mut self, _: &ControllerTuning) -> Result<(), StorageError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let decoded = Message::from_wire(data);

    if let Ok(msg) = &decoded {
        // Whatever decodes must survive its own encoding.
        let frame = msg.to_wire().expect("decoded message must re-encode");
        let again = Message::from_wire(&frame).expect("re-encoded frame must decode");
        assert_eq!(again.kind(), msg.kind());
        assert_eq!(again.timestamp_us, msg.timestamp_us);
    }

    let bus = Arc::new(MessageBus::new());
    let all = Subscriber::new("fuzz", MessageKind::ALL);
    bus.register(all.clone()).expect("empty registry");
    let mut controller = Controller::new(ControllerConfig::default(), NoStore, bus.clone());

    match bus.broadcast_frame(data) {
        Ok(d) => assert!(d.delivered >= 1),
        Err(_) => {
            assert!(decoded.is_err());
            assert!(all.inbox().is_empty());
        }
    }

    // Handlers and the tick must absorb any decoded payload and stamp.
    let mut hw = Sink::default();
    for now in [0, 1_000_000, i64::MAX] {
        controller.process_inbox(now);
        let _ = controller.tick(now, &mut hw);
    }
    controller.shutdown(&mut hw);
    assert!(hw.max_duty <= PUMP_MAX_SPEED);
});
