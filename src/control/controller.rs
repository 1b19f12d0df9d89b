//! Reflux controller worker.
//!
//! Owns the PID law, both pump drivers and the two element PWM
//! generators.  Inputs arrive only as bus messages; outputs leave through
//! an [`ActuatorPort`] passed into [`Controller::tick`] and as
//! `ControllerState` broadcasts.
//!
//! ## Tick
//!
//! 1. validate the latest head temperature (range, finiteness, age)
//! 2. PID step
//! 3. pump actuation per [`PumpMode`]
//! 4. element PWM and fan outputs
//! 5. `ControllerState` telemetry
//!
//! A rejected temperature skips 2 and 3; pumps keep their last speed.
//!
//! A controller whose [`ControllerConfig`] fails validation is built
//! anyway, in the unconfigured state.  Every tick and every inbox drain
//! is then a logged no-op.

use std::sync::Arc;

use log::{debug, error, info, warn};

use super::pid::{OutputLimits, PidController, PidTerms};
use super::slow_pwm::SlowPwm;
use crate::app::ports::{ActuatorPort, Output, TuningStore};
use crate::bus::dispatch::{process_inbox, HandlerTable};
use crate::bus::message::{
    ControllerState, DataRequest, Message, MessageKind, Origin, Payload, PeripheralCommand,
    TemperatureData,
};
use crate::bus::{Inbox, MessageBus, Subscriber};
use crate::config::{ControllerConfig, ControllerSettings, ControllerTuning, PumpMode};
use crate::drivers::pump::{Pump, FLUSH_SPEED, PUMP_IDLE_SPEED, PUMP_MAX_SPEED, PUMP_OFF};
use crate::error::{BusError, Error, InputError, Result, StorageError};

/// Lowest head temperature the law acts on (°C).
pub const MIN_CONTROL_TEMP: f64 = -5.0;
/// Highest head temperature the law acts on (°C).
pub const MAX_CONTROL_TEMP: f64 = 105.0;
/// Age after which a temperature reading is stale.  Readings stamped
/// more than this far ahead of the controller clock are stale too.
pub const TEMP_MESSAGE_TIMEOUT_US: i64 = 1_000_000;

/// Product pump flushes at or above this head temperature.
pub const HYSTERESIS_UPPER: f64 = 70.0;
/// Product pump returns to idle below this head temperature.
pub const HYSTERESIS_LOWER: f64 = 68.0;

pub const NAME: &str = "controller";

const LIMITS: OutputLimits = OutputLimits {
    off: PUMP_OFF as f64,
    idle: PUMP_IDLE_SPEED as f64,
    max: PUMP_MAX_SPEED as f64,
};

/// Hardware-facing state that only exists once configuration succeeded.
struct Drivers {
    reflux: Pump,
    product: Pump,
    lp_element: SlowPwm,
    hp_element: SlowPwm,
}

impl Drivers {
    fn new(cfg: &ControllerConfig) -> Result<Self> {
        cfg.validate()?;
        let lp_element = SlowPwm::new(cfg.lp_element_pwm);
        let hp_element = SlowPwm::new(cfg.hp_element_pwm);
        if !lp_element.is_configured() || !hp_element.is_configured() {
            return Err(Error::Config("element PWM frequency out of range"));
        }
        Ok(Self {
            reflux: Pump::new(cfg.reflux_pump)?,
            product: Pump::new(cfg.product_pump)?,
            lp_element,
            hp_element,
        })
    }
}

pub struct Controller<S: TuningStore> {
    cfg: ControllerConfig,
    drivers: Option<Drivers>,
    store: S,
    bus: Arc<MessageBus>,
    inbox: Inbox,
    pid: PidController,
    settings: ControllerSettings,
    peripheral: PeripheralCommand,
    temperature: Option<(TemperatureData, i64)>,
    flushing: bool,
    now_us: i64,
}

impl<S: TuningStore> Controller<S> {
    /// Build the controller and register its subscriber on `bus`.
    pub fn new(cfg: ControllerConfig, store: S, bus: Arc<MessageBus>) -> Self {
        let mut drivers = match Drivers::new(&cfg) {
            Ok(d) => Some(d),
            Err(e) => {
                error!("Controller: configuration rejected: {}", e);
                None
            }
        };

        let subscriber = Self::subscriber();
        let inbox = subscriber.inbox().clone();
        if let Err(e) = bus.register(subscriber) {
            error!("Controller: cannot subscribe: {}", e);
            drivers = None;
        }

        let mut pid = PidController::new(ControllerTuning::default(), cfg.dt, LIMITS);
        match store.load_tuning() {
            Ok(tuning) => {
                if let Err(e) = pid.retune(tuning) {
                    warn!("Controller: stored tuning rejected ({}), using defaults", e);
                }
            }
            Err(StorageError::NotFound) => info!("Controller: no stored tuning, using defaults"),
            Err(e) => warn!("Controller: tuning load failed ({}), using defaults", e),
        }

        if drivers.is_some() {
            info!(
                "Controller: configured (dt={}s, setpoint={})",
                cfg.dt,
                pid.tuning().setpoint
            );
        }

        Self {
            cfg,
            drivers,
            store,
            bus,
            inbox,
            pid,
            settings: ControllerSettings {
                reflux_mode: PumpMode::ActiveControl,
                product_mode: PumpMode::ActiveControl,
                manual_reflux_speed: PUMP_IDLE_SPEED,
                manual_product_speed: PUMP_IDLE_SPEED,
            },
            peripheral: PeripheralCommand::default(),
            temperature: None,
            flushing: false,
            now_us: 0,
        }
    }

    pub fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on(MessageKind::TemperatureData, Self::on_temperature)
            .on(MessageKind::ControlTuning, Self::on_tuning)
            .on(MessageKind::ControlCommand, Self::on_command)
            .on(MessageKind::ControlSettings, Self::on_settings)
            .on(MessageKind::DataRequest, Self::on_data_request)
    }

    pub fn subscriber() -> Subscriber {
        Self::handlers().subscriber(NAME)
    }

    // ── Worker entry points ───────────────────────────────────

    /// Handle every message queued at entry.  Returns how many were
    /// dispatched.
    pub fn process_inbox(&mut self, now_us: i64) -> usize {
        self.now_us = now_us;
        let inbox = self.inbox.clone();
        if self.drivers.is_none() {
            let dropped = inbox.drain(|_| {});
            debug!("Controller: not configured, discarded {} messages", dropped);
            return 0;
        }
        process_inbox(NAME, Origin::Controller, &inbox, &Self::handlers(), self)
    }

    /// Run one control period.  `Err` reports why the control step was
    /// skipped; peripheral outputs and telemetry still ran unless the
    /// controller is unconfigured.
    pub fn tick(&mut self, now_us: i64, hw: &mut impl ActuatorPort) -> Result<()> {
        self.now_us = now_us;
        if self.drivers.is_none() {
            debug!("Controller: not configured, tick skipped");
            return Err(Error::NotConfigured("controller"));
        }

        let control = self.checked_temperature(now_us).map(|temp| {
            let terms = self.pid.compute(temp);
            self.actuate_pumps(temp, terms, hw);
        });
        if let Err(e) = control {
            warn!("Controller: control step skipped: {}", e);
        }

        self.update_peripherals(now_us, hw);
        self.publish_state(now_us);
        control
    }

    /// Stop both pumps and de-energise every binary output.  Run once when
    /// the worker exits; an unconfigured controller only clears outputs.
    pub fn shutdown(&mut self, hw: &mut impl ActuatorPort) {
        if let Some(d) = self.drivers.as_mut() {
            for (name, pump) in [("reflux", &mut d.reflux), ("product", &mut d.product)] {
                if let Err(e) = pump.set_speed(PUMP_OFF, hw) {
                    warn!("Controller: {} pump not stopped: {}", name, e);
                }
            }
        }
        hw.all_off();
        info!("Controller: outputs off");
    }

    // ── Tick steps ────────────────────────────────────────────

    fn checked_temperature(&self, now_us: i64) -> Result<f64> {
        let Some((reading, stamp)) = self.temperature else {
            return Err(InputError::Stale.into());
        };
        let head = reading.head;
        if !head.is_finite() {
            return Err(InputError::NonFinite.into());
        }
        if !(MIN_CONTROL_TEMP..=MAX_CONTROL_TEMP).contains(&head) {
            return Err(InputError::OutOfRange.into());
        }
        // Stamps come off the wire: an age that overflows, or one further
        // than the timeout either side of `now`, is stale.
        match now_us.checked_sub(stamp) {
            Some(age) if age.unsigned_abs() <= TEMP_MESSAGE_TIMEOUT_US.unsigned_abs() => Ok(head),
            _ => Err(InputError::Stale.into()),
        }
    }

    fn actuate_pumps(&mut self, temp: f64, terms: PidTerms, hw: &mut impl ActuatorPort) {
        if temp >= HYSTERESIS_UPPER {
            self.flushing = true;
        } else if temp < HYSTERESIS_LOWER {
            self.flushing = false;
        }

        let s = self.settings;
        let reflux = match s.reflux_mode {
            PumpMode::ActiveControl => terms.total as u32,
            PumpMode::Manual => s.manual_reflux_speed,
            PumpMode::Off => PUMP_OFF,
        };
        let product = match s.product_mode {
            PumpMode::ActiveControl if self.flushing => FLUSH_SPEED,
            PumpMode::ActiveControl => PUMP_IDLE_SPEED,
            PumpMode::Manual => s.manual_product_speed,
            PumpMode::Off => PUMP_OFF,
        };

        let Some(d) = self.drivers.as_mut() else { return };
        if let Err(e) = d.reflux.set_speed(reflux, hw) {
            warn!("Controller: reflux pump: {} (holding {})", e, d.reflux.speed());
        }
        if let Err(e) = d.product.set_speed(product, hw) {
            warn!("Controller: product pump: {} (holding {})", e, d.product.speed());
        }
    }

    fn update_peripherals(&mut self, now_us: i64, hw: &mut impl ActuatorPort) {
        let Some(d) = self.drivers.as_mut() else { return };
        let lp = d.lp_element.update(now_us).unwrap_or(false);
        let hp = d.hp_element.update(now_us).unwrap_or(false);

        let outputs = [
            (Output::Fan, self.peripheral.fan_on),
            (Output::LpElement, lp),
            (Output::HpElement, hp),
        ];
        for (output, on) in outputs {
            if let Err(e) = hw.set_output(output, on) {
                warn!("Controller: {:?} output: {}", output, e);
            }
        }
    }

    fn publish_state(&self, now_us: i64) {
        let t = self.pid.last();
        self.broadcast(Payload::ControllerState(ControllerState {
            proportional: t.proportional,
            integral: t.integral,
            derivative: t.derivative,
            total: t.total,
            uptime_us: now_us,
        }));
    }

    fn broadcast(&self, payload: Payload) {
        self.bus
            .broadcast(&Message::new(Origin::Controller, self.now_us, payload));
    }

    // ── Handlers ──────────────────────────────────────────────

    fn on_temperature(&mut self, msg: &Message) -> Result<()> {
        let Payload::TemperatureData(reading) = msg.payload else {
            return Err(BusError::Malformed.into());
        };
        self.temperature = Some((reading, msg.timestamp_us));
        Ok(())
    }

    fn on_tuning(&mut self, msg: &Message) -> Result<()> {
        let Payload::ControlTuning(tuning) = msg.payload else {
            return Err(BusError::Malformed.into());
        };
        self.pid.retune(tuning)?;
        info!(
            "Controller: tuning updated (sp={} kp={} ki={} kd={} lpf={}/{}Hz)",
            tuning.setpoint, tuning.kp, tuning.ki, tuning.kd, tuning.lpf_cutoff_hz, tuning.lpf_sample_hz
        );
        if let Err(e) = self.store.save_tuning(&tuning) {
            warn!("Controller: tuning not persisted: {}", e);
        }
        self.broadcast(Payload::ControlTuning(tuning));
        Ok(())
    }

    fn on_settings(&mut self, msg: &Message) -> Result<()> {
        let Payload::ControlSettings(settings) = msg.payload else {
            return Err(BusError::Malformed.into());
        };
        info!("Controller: settings {:?}", settings);
        self.settings = settings;
        Ok(())
    }

    fn on_command(&mut self, msg: &Message) -> Result<()> {
        let Payload::ControlCommand(cmd) = msg.payload else {
            return Err(BusError::Malformed.into());
        };
        let duties = [cmd.lp_element_duty, cmd.hp_element_duty];
        if !duties.iter().all(|d| (0.0..=1.0).contains(d)) {
            return Err(InputError::DutyCycle.into());
        }
        let d = self
            .drivers
            .as_mut()
            .ok_or(Error::NotConfigured("controller"))?;
        d.lp_element.set_duty_cycle(cmd.lp_element_duty)?;
        d.hp_element.set_duty_cycle(cmd.hp_element_duty)?;
        self.peripheral = cmd;
        Ok(())
    }

    fn on_data_request(&mut self, msg: &Message) -> Result<()> {
        let Payload::DataRequest(request) = msg.payload else {
            return Err(BusError::Malformed.into());
        };
        let reply = match request {
            DataRequest::Tuning => Payload::ControlTuning(*self.pid.tuning()),
            DataRequest::Settings => Payload::ControlSettings(self.settings),
            DataRequest::PeripheralState => Payload::ControlCommand(self.peripheral),
            DataRequest::None => return Err(InputError::Unsupported.into()),
        };
        self.broadcast(reply);
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn is_configured(&self) -> bool {
        self.drivers.is_some()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.cfg
    }

    pub fn tuning(&self) -> &ControllerTuning {
        self.pid.tuning()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn peripheral(&self) -> &PeripheralCommand {
        &self.peripheral
    }

    pub fn last_terms(&self) -> PidTerms {
        self.pid.last()
    }

    /// Last applied `(reflux, product)` pump speeds.
    pub fn pump_speeds(&self) -> Option<(u32, u32)> {
        self.drivers
            .as_ref()
            .map(|d| (d.reflux.speed(), d.product.speed()))
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
