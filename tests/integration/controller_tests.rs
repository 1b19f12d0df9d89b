//! Controller worker driven entirely through the bus and mock adapters.

use std::sync::Arc;

use stillctl::app::ports::Output;
use stillctl::bus::message::{
    ControllerState, DataRequest, Message, MessageKind, Origin, Payload, PeripheralCommand,
    TemperatureData,
};
use stillctl::bus::{Inbox, MessageBus, Subscriber};
use stillctl::config::{ControllerConfig, ControllerSettings, ControllerTuning, PumpMode};
use stillctl::control::controller::Controller;
use stillctl::drivers::pump::{FLUSH_SPEED, PUMP_IDLE_SPEED, PUMP_MAX_SPEED, PUMP_OFF};
use stillctl::error::{Error, InputError};

use crate::mock_hw::{MockHardware, MockStore};

const REFLUX: u8 = 0;
const PRODUCT: u8 = 1;

struct Rig {
    ctrl: Controller<MockStore>,
    bus: Arc<MessageBus>,
    probe: Inbox,
    hw: MockHardware,
}

impl Rig {
    fn new(store: MockStore) -> Self {
        Self::with_config(ControllerConfig::default(), store)
    }

    fn with_config(cfg: ControllerConfig, store: MockStore) -> Self {
        let bus = Arc::new(MessageBus::new());
        let probe = Subscriber::new(
            "probe",
            [
                MessageKind::ControllerState,
                MessageKind::ControlTuning,
                MessageKind::ControlSettings,
                MessageKind::ControlCommand,
            ],
        );
        let probe_inbox = probe.inbox().clone();
        bus.register(probe).unwrap();
        let ctrl = Controller::new(cfg, store, bus.clone());
        Self {
            ctrl,
            bus,
            probe: probe_inbox,
            hw: MockHardware::new(),
        }
    }

    /// Broadcast from the webserver and let the controller drain it.
    fn send(&mut self, now: i64, payload: Payload) {
        self.bus.broadcast(&Message::new(Origin::Webserver, now, payload));
        self.ctrl.process_inbox(now);
    }

    fn temperature(&mut self, head: f64, stamp: i64) {
        let reading = TemperatureData {
            head,
            ..TemperatureData::default()
        };
        self.bus.broadcast(&Message::new(
            Origin::SensorManager,
            stamp,
            Payload::TemperatureData(reading),
        ));
        self.ctrl.process_inbox(stamp);
    }

    fn tick(&mut self, now: i64) -> Result<(), Error> {
        self.ctrl.tick(now, &mut self.hw)
    }

    /// Everything the controller sent except telemetry.
    fn replies(&self) -> Vec<Message> {
        let mut out = Vec::new();
        self.probe.drain(|m| {
            if m.origin == Origin::Controller && m.kind() != MessageKind::ControllerState {
                out.push(m);
            }
        });
        out
    }
}

fn tuning(setpoint: f64, kp: f64, ki: f64, kd: f64) -> ControllerTuning {
    ControllerTuning {
        setpoint,
        kp,
        ki,
        kd,
        ..ControllerTuning::default()
    }
}

// ── Input validation ──────────────────────────────────────────

#[test]
fn stale_reading_holds_pumps_but_keeps_peripherals_running() {
    let mut rig = Rig::new(MockStore::default());
    rig.temperature(60.0, 0);
    rig.tick(100_000).unwrap();
    assert_eq!(rig.hw.duty_writes(), 2);

    rig.hw.clear();
    assert_eq!(rig.tick(1_200_000), Err(Error::Input(InputError::Stale)));
    assert_eq!(rig.hw.duty_writes(), 0);
    assert_eq!(rig.hw.last_output(Output::Fan), Some(false));
}

#[test]
fn reading_exactly_at_timeout_is_fresh() {
    let mut rig = Rig::new(MockStore::default());
    rig.temperature(60.0, 500_000);
    assert!(rig.tick(1_500_000).is_ok());
    assert_eq!(rig.tick(1_500_001), Err(Error::Input(InputError::Stale)));
}

#[test]
fn extreme_wire_timestamps_count_as_stale() {
    for stamp in [i64::MIN, i64::MIN + 1, i64::MAX] {
        let mut rig = Rig::new(MockStore::default());
        let reading = TemperatureData {
            head: 60.0,
            ..TemperatureData::default()
        };
        let frame = Message::new(Origin::SensorManager, stamp, Payload::TemperatureData(reading))
            .to_wire()
            .unwrap();
        rig.bus.broadcast_frame(&frame).unwrap();
        assert_eq!(rig.ctrl.process_inbox(5_000_000), 1);

        assert_eq!(
            rig.tick(5_000_000),
            Err(Error::Input(InputError::Stale)),
            "stamp {}",
            stamp
        );
        assert_eq!(rig.hw.duty_writes(), 0);
    }
}

#[test]
fn reading_slightly_ahead_of_controller_clock_is_fresh() {
    let mut rig = Rig::new(MockStore::default());
    rig.temperature(60.0, 1_500_000);
    assert!(rig.tick(500_000).is_ok());
    assert_eq!(rig.tick(499_999), Err(Error::Input(InputError::Stale)));
}

#[test]
fn out_of_range_and_non_finite_readings_rejected() {
    let mut rig = Rig::new(MockStore::default());

    rig.temperature(105.5, 0);
    assert_eq!(rig.tick(0), Err(Error::Input(InputError::OutOfRange)));
    rig.temperature(-5.1, 0);
    assert_eq!(rig.tick(0), Err(Error::Input(InputError::OutOfRange)));
    rig.temperature(f64::NAN, 0);
    assert_eq!(rig.tick(0), Err(Error::Input(InputError::NonFinite)));
    assert_eq!(rig.hw.duty_writes(), 0);

    rig.temperature(-5.0, 0);
    assert!(rig.tick(0).is_ok());
    rig.temperature(105.0, 0);
    assert!(rig.tick(0).is_ok());
}

// ── Actuation ─────────────────────────────────────────────────

#[test]
fn reflux_pump_follows_pid_output() {
    let mut rig = Rig::new(MockStore::default());
    rig.send(0, Payload::ControlTuning(tuning(50.0, 10.0, 0.0, 0.0)));
    rig.temperature(60.0, 0);
    rig.tick(0).unwrap();

    assert_eq!(rig.ctrl.last_terms().proportional, 100.0);
    assert_eq!(rig.ctrl.last_terms().total, 100.0);
    assert_eq!(rig.hw.last_duty(REFLUX), Some(100));
}

#[test]
fn reflux_saturates_at_max_speed() {
    let mut rig = Rig::new(MockStore::default());
    rig.send(0, Payload::ControlTuning(tuning(0.0, 100.0, 0.0, 0.0)));
    rig.temperature(100.0, 0);
    rig.tick(0).unwrap();
    assert_eq!(rig.hw.last_duty(REFLUX), Some(PUMP_MAX_SPEED));
}

#[test]
fn product_pump_hysteresis() {
    let mut rig = Rig::new(MockStore::default());
    let steps = [
        (65.0, PUMP_IDLE_SPEED),
        (69.0, PUMP_IDLE_SPEED),
        (70.0, FLUSH_SPEED),
        (69.0, FLUSH_SPEED),
        (68.0, FLUSH_SPEED),
        (67.9, PUMP_IDLE_SPEED),
        (69.5, PUMP_IDLE_SPEED),
    ];
    for (i, (temp, want)) in steps.into_iter().enumerate() {
        let now = i as i64 * 200_000;
        rig.temperature(temp, now);
        rig.tick(now).unwrap();
        assert_eq!(rig.hw.last_duty(PRODUCT), Some(want), "at {} °C", temp);
    }
}

#[test]
fn manual_and_off_modes() {
    let mut rig = Rig::new(MockStore::default());
    rig.send(
        0,
        Payload::ControlSettings(ControllerSettings {
            reflux_mode: PumpMode::Manual,
            product_mode: PumpMode::Off,
            manual_reflux_speed: 300,
            manual_product_speed: 900,
        }),
    );
    rig.temperature(75.0, 0);
    rig.tick(0).unwrap();
    assert_eq!(rig.hw.last_duty(REFLUX), Some(300));
    assert_eq!(rig.hw.last_duty(PRODUCT), Some(PUMP_OFF));

    rig.send(
        0,
        Payload::ControlSettings(ControllerSettings {
            reflux_mode: PumpMode::Off,
            product_mode: PumpMode::Manual,
            manual_reflux_speed: 300,
            manual_product_speed: 5_000,
        }),
    );
    rig.tick(100_000).unwrap();
    assert_eq!(rig.hw.last_duty(REFLUX), Some(PUMP_OFF));
    assert_eq!(rig.hw.last_duty(PRODUCT), Some(PUMP_MAX_SPEED));
}

#[test]
fn failed_pump_write_keeps_last_speed() {
    let mut rig = Rig::new(MockStore::default());
    rig.send(0, Payload::ControlTuning(tuning(50.0, 10.0, 0.0, 0.0)));
    rig.temperature(60.0, 0);
    rig.tick(0).unwrap();
    assert_eq!(rig.ctrl.pump_speeds(), Some((100, PUMP_IDLE_SPEED)));

    rig.hw.failing_channels.push(REFLUX);
    rig.temperature(70.0, 200_000);
    rig.tick(200_000).unwrap();
    assert_eq!(rig.ctrl.pump_speeds(), Some((100, FLUSH_SPEED)));
}

#[test]
fn peripheral_command_drives_fan_and_elements() {
    let mut rig = Rig::new(MockStore::default());
    rig.send(
        0,
        Payload::ControlCommand(PeripheralCommand {
            fan_on: true,
            lp_element_duty: 1.0,
            hp_element_duty: 0.0,
        }),
    );
    // Off a 5 Hz cycle boundary so a zero duty reads LOW.
    let _ = rig.tick(1_050_000);
    assert_eq!(rig.hw.last_output(Output::Fan), Some(true));
    assert_eq!(rig.hw.last_output(Output::LpElement), Some(true));
    assert_eq!(rig.hw.last_output(Output::HpElement), Some(false));
}

#[test]
fn element_duty_cycles_out_of_phase() {
    let mut rig = Rig::new(MockStore::default());
    rig.send(
        0,
        Payload::ControlCommand(PeripheralCommand {
            fan_on: false,
            lp_element_duty: 0.25,
            hp_element_duty: 0.75,
        }),
    );
    // 5 Hz: 200 ms period, LP high for 50 ms, HP for 150 ms.
    let _ = rig.tick(2_100_000);
    assert_eq!(rig.hw.last_output(Output::LpElement), Some(false));
    assert_eq!(rig.hw.last_output(Output::HpElement), Some(true));
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn every_tick_publishes_state_even_when_skipped() {
    let mut rig = Rig::new(MockStore::default());
    let _ = rig.tick(300_000);
    rig.temperature(60.0, 400_000);
    rig.tick(400_000).unwrap();

    let mut states: Vec<ControllerState> = Vec::new();
    rig.probe.drain(|m| {
        assert_eq!(m.origin, Origin::Controller);
        if let Payload::ControllerState(s) = m.payload {
            states.push(s);
        }
    });
    assert_eq!(states.len(), 2);
    assert_eq!(states[0].uptime_us, 300_000);
    assert_eq!(states[1].uptime_us, 400_000);
    assert_eq!(states[1].total, PUMP_IDLE_SPEED as f64);
}

// ── Tuning ────────────────────────────────────────────────────

#[test]
fn tuning_update_is_persisted_and_echoed() {
    let mut rig = Rig::new(MockStore::default());
    let t = tuning(78.0, 5.0, 0.1, 2.0);
    rig.send(0, Payload::ControlTuning(t));

    assert_eq!(*rig.ctrl.tuning(), t);
    assert_eq!(rig.ctrl.store().tuning, Some(t));
    assert_eq!(rig.ctrl.store().saves, 1);

    let replies = rig.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].origin, Origin::Controller);
    assert_eq!(replies[0].payload, Payload::ControlTuning(t));
}

#[test]
fn invalid_filter_tuning_rejected_without_side_effects() {
    let mut rig = Rig::new(MockStore::default());
    let mut t = tuning(78.0, 5.0, 0.1, 2.0);
    t.lpf_cutoff_hz = 3.0; // above Nyquist at 5 Hz
    rig.send(0, Payload::ControlTuning(t));

    assert_eq!(*rig.ctrl.tuning(), ControllerTuning::default());
    assert_eq!(rig.ctrl.store().saves, 0);
    assert!(rig.replies().is_empty());
}

#[test]
fn failed_save_still_applies_tuning() {
    let store = MockStore {
        fail_saves: true,
        ..MockStore::default()
    };
    let mut rig = Rig::new(store);
    let t = tuning(80.0, 1.0, 0.0, 0.0);
    rig.send(0, Payload::ControlTuning(t));
    assert_eq!(*rig.ctrl.tuning(), t);
    assert_eq!(rig.replies().len(), 1);
}

#[test]
fn stored_tuning_loaded_at_startup() {
    let t = tuning(78.4, 12.0, 0.4, 3.5);
    let rig = Rig::new(MockStore::with_tuning(t));
    assert_eq!(*rig.ctrl.tuning(), t);

    let rig = Rig::new(MockStore::corrupted());
    assert_eq!(*rig.ctrl.tuning(), ControllerTuning::default());
}

// ── Data requests ─────────────────────────────────────────────

#[test]
fn data_requests_answered_by_broadcast() {
    let mut rig = Rig::new(MockStore::default());
    let cmd = PeripheralCommand {
        fan_on: true,
        lp_element_duty: 0.5,
        hp_element_duty: 0.25,
    };
    rig.send(0, Payload::ControlCommand(cmd));

    rig.send(0, Payload::DataRequest(DataRequest::Tuning));
    rig.send(0, Payload::DataRequest(DataRequest::Settings));
    rig.send(0, Payload::DataRequest(DataRequest::PeripheralState));
    rig.send(0, Payload::DataRequest(DataRequest::None));

    let replies: Vec<Payload> = rig.replies().into_iter().map(|m| m.payload).collect();
    assert_eq!(
        replies,
        [
            Payload::ControlTuning(ControllerTuning::default()),
            Payload::ControlSettings(*rig.ctrl.settings()),
            Payload::ControlCommand(cmd),
        ]
    );
}

#[test]
fn own_messages_are_ignored() {
    let mut rig = Rig::new(MockStore::default());
    let settings = ControllerSettings {
        reflux_mode: PumpMode::Off,
        ..ControllerSettings::default()
    };
    rig.bus
        .broadcast(&Message::new(Origin::Controller, 0, Payload::ControlSettings(settings)));
    assert_eq!(rig.ctrl.process_inbox(0), 0);
    assert_eq!(rig.ctrl.settings().reflux_mode, PumpMode::ActiveControl);
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn shutdown_stops_pumps_and_clears_outputs() {
    let mut rig = Rig::new(MockStore::default());
    rig.send(
        0,
        Payload::ControlCommand(PeripheralCommand {
            fan_on: true,
            lp_element_duty: 1.0,
            hp_element_duty: 1.0,
        }),
    );
    rig.temperature(75.0, 0);
    rig.tick(0).unwrap();
    assert_eq!(rig.hw.last_duty(PRODUCT), Some(FLUSH_SPEED));
    assert_eq!(rig.hw.last_output(Output::Fan), Some(true));

    rig.ctrl.shutdown(&mut rig.hw);
    assert_eq!(rig.ctrl.pump_speeds(), Some((PUMP_OFF, PUMP_OFF)));
    assert_eq!(rig.hw.last_duty(REFLUX), Some(PUMP_OFF));
    assert_eq!(rig.hw.last_duty(PRODUCT), Some(PUMP_OFF));
    for output in [Output::Fan, Output::LpElement, Output::HpElement] {
        assert_eq!(rig.hw.last_output(output), Some(false));
    }
}

#[test]
fn shutdown_of_unconfigured_controller_only_clears_outputs() {
    let cfg = ControllerConfig {
        dt: -1.0,
        ..ControllerConfig::default()
    };
    let mut rig = Rig::with_config(cfg, MockStore::default());
    rig.ctrl.shutdown(&mut rig.hw);
    assert_eq!(rig.hw.duty_writes(), 0);
    assert_eq!(rig.hw.last_output(Output::HpElement), Some(false));
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn misconfigured_controller_is_inert() {
    let cfg = ControllerConfig {
        fan_gpio: 13, // clashes with the LP element
        ..ControllerConfig::default()
    };
    let mut rig = Rig::with_config(cfg, MockStore::default());
    assert!(!rig.ctrl.is_configured());

    rig.send(0, Payload::DataRequest(DataRequest::Tuning));
    rig.temperature(60.0, 0);
    assert_eq!(rig.tick(0), Err(Error::NotConfigured("controller")));
    assert!(rig.hw.calls.is_empty());
    assert!(rig.replies().is_empty());
    assert_eq!(rig.ctrl.pump_speeds(), None);
}

#[test]
fn json_configuration_builds_a_working_controller() {
    let json = r#"{
        "dt": 0.2,
        "GPIO_fan": 21,
        "GPIO_element1": 13,
        "GPIO_element2": 32,
        "RefluxPump": { "GPIO": 23, "PWMChannel": 2, "timerChannel": 0 },
        "ProductPump": { "GPIO": 22, "PWMChannel": 3, "timerChannel": 1 },
        "slowPMWLPElement": { "PWMFreq": 5 },
        "slowPMWHPElement": { "PWMFreq": 5 }
    }"#;
    let cfg = ControllerConfig::from_json(json).unwrap();
    let mut rig = Rig::with_config(cfg, MockStore::default());
    rig.temperature(60.0, 0);
    rig.tick(0).unwrap();
    assert_eq!(rig.hw.last_duty(2), Some(PUMP_IDLE_SPEED));
    assert_eq!(rig.hw.last_duty(3), Some(PUMP_IDLE_SPEED));
}
