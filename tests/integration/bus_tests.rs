//! Bus fan-out, wire frames and the workers that sit on it.

use std::sync::Arc;

use stillctl::adapters::hardware::HardwareAdapter;
use stillctl::adapters::log_sink::TelemetryLog;
use stillctl::app::ports::{ActuatorPort, Output};
use stillctl::bus::message::{
    DataRequest, FlowrateData, Message, MessageKind, Origin, Payload, Text,
};
use stillctl::bus::{MessageBus, Subscriber, INBOX_DEPTH};
use stillctl::config::{ControllerConfig, ControllerSettings, PumpMode};
use stillctl::control::controller::Controller;
use stillctl::error::{BusError, Error};

use crate::mock_hw::{MockPin, MockStore};

#[test]
fn each_subscriber_of_a_kind_gets_one_copy() {
    let bus = MessageBus::new();
    let subs: Vec<Subscriber> = (0..3)
        .map(|_| Subscriber::new("flow", [MessageKind::FlowrateData]))
        .collect();
    let other = Subscriber::new("other", [MessageKind::SocketLog, MessageKind::General]);
    for s in subs.iter().chain([&other]) {
        bus.register(s.clone()).unwrap();
    }

    let msg = Message::new(
        Origin::SensorManager,
        7,
        Payload::FlowrateData(FlowrateData {
            reflux: 0.4,
            product: 0.1,
        }),
    );
    let d = bus.broadcast(&msg);
    assert_eq!((d.delivered, d.dropped), (3, 0));

    for s in &subs {
        assert_eq!(s.inbox().len(), 1);
        assert_eq!(s.inbox().try_pop(), Some(msg.clone()));
    }
    assert!(other.inbox().is_empty());
}

#[test]
fn slow_subscriber_does_not_block_others() {
    let bus = MessageBus::new();
    let slow = Subscriber::new("slow", [MessageKind::General]);
    let fast = Subscriber::new("fast", [MessageKind::General]);
    bus.register(slow.clone()).unwrap();
    bus.register(fast.clone()).unwrap();

    let mut dropped = 0;
    for ts in 0..(INBOX_DEPTH as i64 + 4) {
        let d = bus.broadcast(&Message::new(Origin::Webserver, ts, Payload::General(Text::new())));
        dropped += d.dropped;
        // The fast worker keeps up.
        fast.inbox().drain(|_| {});
    }
    assert_eq!(dropped, 4);
    assert_eq!(slow.inbox().len(), INBOX_DEPTH);
    assert!(fast.inbox().is_empty());
}

#[test]
fn wire_frame_reaches_controller() {
    let bus = Arc::new(MessageBus::new());
    let mut ctrl = Controller::new(ControllerConfig::default(), MockStore::default(), bus.clone());

    let settings = ControllerSettings {
        reflux_mode: PumpMode::Manual,
        product_mode: PumpMode::Off,
        manual_reflux_speed: 120,
        manual_product_speed: 0,
    };
    let frame = Message::new(Origin::Webserver, 10, Payload::ControlSettings(settings))
        .to_wire()
        .unwrap();
    assert_eq!(bus.broadcast_frame(&frame).unwrap().delivered, 1);

    assert_eq!(ctrl.process_inbox(10), 1);
    assert_eq!(*ctrl.settings(), settings);
}

#[test]
fn bad_frames_rejected_before_delivery() {
    let bus = MessageBus::new();
    let all = Subscriber::new("all", MessageKind::ALL);
    bus.register(all.clone()).unwrap();

    let mut frame = Message::new(Origin::Webserver, 1, Payload::DataRequest(DataRequest::Tuning))
        .to_wire()
        .unwrap();
    frame[0] = 0xEE;
    assert_eq!(
        bus.broadcast_frame(&frame),
        Err(Error::Bus(BusError::UnknownKind(0xEE)))
    );
    assert_eq!(bus.broadcast_frame(&[]), Err(Error::Bus(BusError::Malformed)));
    assert!(all.inbox().is_empty());
}

#[test]
fn telemetry_sink_ignores_its_own_origin() {
    let bus = MessageBus::new();
    let mut sink = TelemetryLog::new(&bus).unwrap();

    let mut text = Text::new();
    text.push_str("boiler at 92.1").unwrap();
    bus.broadcast(&Message::new(Origin::Telemetry, 0, Payload::SocketLog(text.clone())));
    bus.broadcast(&Message::new(Origin::DistillerManager, 0, Payload::General(text)));

    assert_eq!(sink.process_inbox(), 1);
    assert_eq!(sink.lines(), 1);
}

#[test]
fn hardware_adapter_over_mock_pins() {
    let mut hw = HardwareAdapter::new(MockPin::default(), MockPin::default(), MockPin::default());
    hw.set_output(Output::Fan, true).unwrap();
    hw.set_output(Output::LpElement, true).unwrap();
    hw.set_output(Output::LpElement, false).unwrap();

    let (fan, lp, hp) = hw.release();
    assert!(fan.high);
    assert!(!lp.high);
    assert_eq!(lp.writes, 2);
    assert_eq!(hp.writes, 0);
}
