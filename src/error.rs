//! Unified error types for the still controller.
//!
//! A single `Error` enum that every subsystem converts into, so worker
//! loops and message handlers report failures uniformly.  All variants
//! are `Copy`: handlers return them by value and the dispatch loop logs
//! them without allocation.
//!
//! | Variant        | Meaning                                   | Scope of failure      |
//! |----------------|-------------------------------------------|-----------------------|
//! | `Config`       | invalid static configuration              | component, permanent  |
//! | `NotConfigured`| operation on an unconfigured component    | call                  |
//! | `Input`        | stale / out-of-range / non-finite input   | tick                  |
//! | `Actuator`     | driver rejected a command                 | call, state retained  |
//! | `Bus`          | message could not be routed or decoded    | message               |
//! | `Filter`       | filter evaluation failed                  | call                  |
//! | `Storage`      | tuning record could not be read/written   | call                  |
//! | `Spawn`        | worker thread could not be created        | boot                  |

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Static configuration failed validation.
    Config(&'static str),
    /// The named component never completed configuration.
    NotConfigured(&'static str),
    /// A runtime input was rejected.
    Input(InputError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// A message could not be routed or decoded.
    Bus(BusError),
    /// A filter could not produce an output.
    Filter(FilterError),
    /// Persistent storage failed.
    Storage(StorageError),
    /// The named worker thread could not be created.
    Spawn(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::NotConfigured(what) => write!(f, "{what} is not configured"),
            Self::Input(e) => write!(f, "input rejected: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Filter(e) => write!(f, "filter: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Spawn(name) => write!(f, "failed to spawn worker '{name}'"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Input errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// Value lies outside the accepted control range.
    OutOfRange,
    /// Reading is older than the staleness bound.
    Stale,
    /// NaN or infinite value.
    NonFinite,
    /// Duty cycle outside `[0, 1]`.
    DutyCycle,
    /// Request variant the receiver cannot answer.
    Unsupported,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "value out of range"),
            Self::Stale => write!(f, "reading is stale"),
            Self::NonFinite => write!(f, "value is not finite"),
            Self::DutyCycle => write!(f, "duty cycle outside [0, 1]"),
            Self::Unsupported => write!(f, "unsupported request"),
        }
    }
}

impl From<InputError> for Error {
    fn from(e: InputError) -> Self {
        Self::Input(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// LEDC duty write failed (carries the ESP-IDF return code).
    PwmWriteFailed(i32),
    /// GPIO level write failed.
    GpioWriteFailed,
    /// LEDC channel has not been set up.
    ChannelUnavailable,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed(rc) => write!(f, "PWM write failed (rc={rc})"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::ChannelUnavailable => write!(f, "PWM channel unavailable"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Frame carried a kind tag outside the known set.
    UnknownKind(u8),
    /// Frame was truncated or its payload failed to decode.
    Malformed,
    /// Payload could not be encoded into a frame.
    Encode,
    /// No room for another subscriber.
    RegistryFull,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(tag) => write!(f, "unknown message kind {tag}"),
            Self::Malformed => write!(f, "malformed frame"),
            Self::Encode => write!(f, "frame encoding failed"),
            Self::RegistryFull => write!(f, "subscriber registry full"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Filter errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    /// Coefficients (or design frequencies) were never valid.
    Unconfigured,
    /// Input sample was NaN or infinite.
    NonFiniteInput,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "filter not configured"),
            Self::NonFiniteInput => write!(f, "non-finite input sample"),
        }
    }
}

impl From<FilterError> for Error {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested record does not exist (first boot).
    NotFound,
    /// Stored blob failed to deserialize.
    Corrupted,
    /// Storage partition is full.
    Full,
    /// Generic I/O error from the backend.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Corrupted => write!(f, "record corrupted"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
