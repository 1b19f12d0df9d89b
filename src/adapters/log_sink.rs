//! Log-based telemetry sink.
//!
//! A bus worker that writes controller telemetry and relayed log text to
//! the ESP-IDF logger (UART / USB-CDC in production).  Each
//! `ControllerState` becomes one `TELEM | ...` line.  A network sink
//! would subscribe to the same kinds.

use log::info;

use crate::bus::dispatch::{process_inbox, HandlerTable};
use crate::bus::message::{ControllerState, Message, MessageKind, Origin, Payload};
use crate::bus::{Inbox, MessageBus};
use crate::error::{BusError, Result};

pub const NAME: &str = "telemetry";

pub struct TelemetryLog {
    inbox: Inbox,
    lines: u32,
}

impl TelemetryLog {
    /// Register the sink on `bus`.
    pub fn new(bus: &MessageBus) -> Result<Self> {
        let sub = Self::handlers().subscriber(NAME);
        let inbox = sub.inbox().clone();
        bus.register(sub)?;
        Ok(Self { inbox, lines: 0 })
    }

    pub fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on(MessageKind::ControllerState, Self::on_state)
            .on(MessageKind::SocketLog, Self::on_text)
            .on(MessageKind::General, Self::on_text)
    }

    pub fn process_inbox(&mut self) -> usize {
        let inbox = self.inbox.clone();
        process_inbox(NAME, Origin::Telemetry, &inbox, &Self::handlers(), self)
    }

    /// Lines written so far.
    pub fn lines(&self) -> u32 {
        self.lines
    }

    fn on_state(&mut self, msg: &Message) -> Result<()> {
        let Payload::ControllerState(state) = msg.payload else {
            return Err(BusError::Malformed.into());
        };
        info!("{}", format_state(&state));
        self.lines += 1;
        Ok(())
    }

    fn on_text(&mut self, msg: &Message) -> Result<()> {
        match &msg.payload {
            Payload::SocketLog(text) => info!("LOG   | {:?} | {}", msg.origin, text),
            Payload::General(text) => info!("MSG   | {:?} | {}", msg.origin, text),
            _ => return Err(BusError::Malformed.into()),
        }
        self.lines += 1;
        Ok(())
    }
}

pub fn format_state(s: &ControllerState) -> String {
    format!(
        "TELEM | t={:.1}s | P={:.1} I={:.1} D={:.1} | out={:.0}",
        s.uptime_us as f64 / 1e6,
        s.proportional,
        s.integral,
        s.derivative,
        s.total,
    )
}
