//! Typed bus messages and their wire framing.
//!
//! Every message is a closed [`Payload`] variant plus the producing
//! worker's [`Origin`] and a monotonic timestamp.  Handlers match on the
//! payload exhaustively; there is no downcasting.
//!
//! ## Wire frame
//!
//! ```text
//! ┌──────┬────────┬────────────────┬──────────────────────┐
//! │ kind │ origin │ timestamp (LE) │ postcard(payload)    │
//! │  u8  │   u8   │      i64       │ variable             │
//! └──────┴────────┴────────────────┴──────────────────────┘
//! ```
//!
//! Network adapters hand frames to [`MessageBus::broadcast_frame`]; an
//! unknown kind tag is rejected before anything is delivered.
//!
//! [`MessageBus::broadcast_frame`]: super::MessageBus::broadcast_frame

use serde::{Deserialize, Serialize};

use crate::config::{ControllerSettings, ControllerTuning};
use crate::error::{BusError, Result};

/// Short text carried by `General` and `SocketLog` messages.
pub type Text = heapless::String<96>;

const HEADER_LEN: usize = 10;

// ── Kinds ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    General = 1,
    TemperatureData = 2,
    FlowrateData = 3,
    ControlTuning = 4,
    ControlCommand = 5,
    ControlSettings = 6,
    DataRequest = 7,
    ControllerState = 8,
    ConcentrationData = 9,
    SocketLog = 10,
}

impl MessageKind {
    pub const ALL: [Self; 10] = [
        Self::General,
        Self::TemperatureData,
        Self::FlowrateData,
        Self::ControlTuning,
        Self::ControlCommand,
        Self::ControlSettings,
        Self::DataRequest,
        Self::ControllerState,
        Self::ConcentrationData,
        Self::SocketLog,
    ];

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| *k as u8 == tag)
    }

    const fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

/// Set of message kinds a subscriber listens to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindSet(u16);

impl KindSet {
    pub fn contains(self, kind: MessageKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: MessageKind) {
        self.0 |= kind.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<MessageKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = MessageKind>>(iter: I) -> Self {
        let mut set = Self::default();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

// ── Origin ────────────────────────────────────────────────────

/// Worker that produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Origin {
    Unknown = 0,
    Controller = 1,
    SensorManager = 2,
    Webserver = 3,
    DistillerManager = 4,
    Telemetry = 5,
}

impl Origin {
    pub fn from_u8(tag: u8) -> Self {
        match tag {
            1 => Self::Controller,
            2 => Self::SensorManager,
            3 => Self::Webserver,
            4 => Self::DistillerManager,
            5 => Self::Telemetry,
            _ => Self::Unknown,
        }
    }
}

// ── Payloads ──────────────────────────────────────────────────

/// Column temperatures (°C).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureData {
    pub head: f64,
    pub reflux_condensor: f64,
    pub product_condensor: f64,
    pub radiator: f64,
    pub boiler: f64,
}

/// Pump flow rates (L/min).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowrateData {
    pub reflux: f64,
    pub product: f64,
}

/// Estimated ethanol concentration (fraction by volume).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationData {
    pub vapour: f64,
    pub boiler: f64,
}

/// Requested fan state and element duty cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeripheralCommand {
    pub fan_on: bool,
    /// Low-power element duty in `[0, 1]`.
    pub lp_element_duty: f64,
    /// High-power element duty in `[0, 1]`.
    pub hp_element_duty: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRequest {
    #[default]
    None,
    Tuning,
    Settings,
    PeripheralState,
}

/// Controller telemetry, one per control tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
    pub total: f64,
    pub uptime_us: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    General(Text),
    TemperatureData(TemperatureData),
    FlowrateData(FlowrateData),
    ControlTuning(ControllerTuning),
    ControlCommand(PeripheralCommand),
    ControlSettings(ControllerSettings),
    DataRequest(DataRequest),
    ControllerState(ControllerState),
    ConcentrationData(ConcentrationData),
    SocketLog(Text),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::General(_) => MessageKind::General,
            Self::TemperatureData(_) => MessageKind::TemperatureData,
            Self::FlowrateData(_) => MessageKind::FlowrateData,
            Self::ControlTuning(_) => MessageKind::ControlTuning,
            Self::ControlCommand(_) => MessageKind::ControlCommand,
            Self::ControlSettings(_) => MessageKind::ControlSettings,
            Self::DataRequest(_) => MessageKind::DataRequest,
            Self::ControllerState(_) => MessageKind::ControllerState,
            Self::ConcentrationData(_) => MessageKind::ConcentrationData,
            Self::SocketLog(_) => MessageKind::SocketLog,
        }
    }
}

// ── Message ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub origin: Origin,
    /// Monotonic time of creation (µs since boot).
    pub timestamp_us: i64,
    pub payload: Payload,
}

impl Message {
    pub fn new(origin: Origin, timestamp_us: i64, payload: Payload) -> Self {
        Self {
            origin,
            timestamp_us,
            payload,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let body = match &self.payload {
            Payload::General(t) | Payload::SocketLog(t) => postcard::to_allocvec(t),
            Payload::TemperatureData(p) => postcard::to_allocvec(p),
            Payload::FlowrateData(p) => postcard::to_allocvec(p),
            Payload::ControlTuning(p) => postcard::to_allocvec(p),
            Payload::ControlCommand(p) => postcard::to_allocvec(p),
            Payload::ControlSettings(p) => postcard::to_allocvec(p),
            Payload::DataRequest(p) => postcard::to_allocvec(p),
            Payload::ControllerState(p) => postcard::to_allocvec(p),
            Payload::ConcentrationData(p) => postcard::to_allocvec(p),
        }
        .map_err(|_| BusError::Encode)?;

        let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
        frame.push(self.kind() as u8);
        frame.push(self.origin as u8);
        frame.extend_from_slice(&self.timestamp_us.to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    pub fn from_wire(frame: &[u8]) -> Result<Self> {
        let (&tag, rest) = frame.split_first().ok_or(BusError::Malformed)?;
        let kind = MessageKind::from_u8(tag).ok_or(BusError::UnknownKind(tag))?;
        if rest.len() < HEADER_LEN - 1 {
            return Err(BusError::Malformed.into());
        }

        let origin = Origin::from_u8(rest[0]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&rest[1..9]);
        let timestamp_us = i64::from_le_bytes(ts);
        let body = &rest[9..];

        let payload = decode_payload(kind, body).ok_or(BusError::Malformed)?;
        Ok(Self::new(origin, timestamp_us, payload))
    }
}

fn decode_payload(kind: MessageKind, body: &[u8]) -> Option<Payload> {
    let payload = match kind {
        MessageKind::General => Payload::General(postcard::from_bytes(body).ok()?),
        MessageKind::SocketLog => Payload::SocketLog(postcard::from_bytes(body).ok()?),
        MessageKind::TemperatureData => Payload::TemperatureData(postcard::from_bytes(body).ok()?),
        MessageKind::FlowrateData => Payload::FlowrateData(postcard::from_bytes(body).ok()?),
        MessageKind::ControlTuning => Payload::ControlTuning(postcard::from_bytes(body).ok()?),
        MessageKind::ControlCommand => Payload::ControlCommand(postcard::from_bytes(body).ok()?),
        MessageKind::ControlSettings => Payload::ControlSettings(postcard::from_bytes(body).ok()?),
        MessageKind::DataRequest => Payload::DataRequest(postcard::from_bytes(body).ok()?),
        MessageKind::ControllerState => Payload::ControllerState(postcard::from_bytes(body).ok()?),
        MessageKind::ConcentrationData => {
            Payload::ConcentrationData(postcard::from_bytes(body).ok()?)
        }
    };
    Some(payload)
}
