//! Worker runtime: the explicitly constructed owner of the bus and every
//! worker thread.
//!
//! ```text
//!            Distiller
//!        ┌──────┴────────────────┐
//!   Arc<MessageBus>        Vec<Worker>
//!        │                   ├─ controller  (Core::App, every dt)
//!        │                   └─ telemetry   (Core::Pro, every 200 ms)
//!        └── cloned into each worker; nothing is global
//! ```
//!
//! Each worker is a delay-until loop driven by a [`TickScheduler`]: drain
//! the inbox, run the tick body, feed the watchdog, sleep to the next
//! deadline.  On shutdown the controller worker stops both pumps and
//! switches every output off before its thread exits.  Subscribers are registered before the thread starts, so no
//! message broadcast after a `spawn_*` call returns can be missed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use crate::adapters::log_sink::TelemetryLog;
use crate::app::ports::{ActuatorPort, Clock, TuningStore};
use crate::bus::MessageBus;
use crate::config::ControllerConfig;
use crate::control::controller::Controller;
use crate::drivers::task_pin::{spawn_on_core, Core, TaskSpec};
use crate::drivers::watchdog::Watchdog;
use crate::error::{Error, Result};
use crate::scheduler::TickScheduler;

/// Period used when the configured `dt` is unusable.
pub const FALLBACK_PERIOD_S: f64 = 0.2;
pub const TELEMETRY_PERIOD_S: f64 = 0.2;

const CONTROLLER_TASK: TaskSpec = TaskSpec {
    name: "controller\0",
    core: Core::App,
    priority: 5,
    stack_kb: 8,
};

const TELEMETRY_TASK: TaskSpec = TaskSpec {
    name: "telemetry\0",
    core: Core::Pro,
    priority: 2,
    stack_kb: 6,
};

struct Worker {
    name: &'static str,
    thread: JoinHandle<()>,
}

pub struct Distiller<C: Clock + Clone + Send + 'static> {
    bus: Arc<MessageBus>,
    clock: C,
    running: Arc<AtomicBool>,
    workers: Vec<Worker>,
}

impl<C: Clock + Clone + Send + 'static> Distiller<C> {
    pub fn new(clock: C) -> Self {
        Self {
            bus: Arc::new(MessageBus::new()),
            clock,
            running: Arc::new(AtomicBool::new(true)),
            workers: Vec::new(),
        }
    }

    /// Shared bus handle for producers outside the worker set (sensor
    /// managers, network adapters).
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Build the controller, subscribe it and start its loop at `cfg.dt`.
    /// An invalid `cfg` still spawns the worker, in its inert state.
    pub fn spawn_controller<S, A>(&mut self, cfg: ControllerConfig, store: S, hw: A) -> Result<()>
    where
        S: TuningStore + Send + 'static,
        A: ActuatorPort + Send + 'static,
    {
        let controller = Controller::new(cfg, store, self.bus.clone());
        let period = if cfg.dt.is_finite() && cfg.dt > 0.0 {
            cfg.dt
        } else {
            FALLBACK_PERIOD_S
        };

        self.spawn(CONTROLLER_TASK, period, ControllerWorker { controller, hw })
    }

    /// Start the telemetry log sink.
    pub fn spawn_telemetry_log(&mut self) -> Result<()> {
        let sink = TelemetryLog::new(&self.bus)?;
        self.spawn(TELEMETRY_TASK, TELEMETRY_PERIOD_S, sink)
    }

    fn spawn(&mut self, spec: TaskSpec, period_s: f64, worker: impl Periodic + Send + 'static) -> Result<()> {
        let clock = self.clock.clone();
        let running = self.running.clone();
        let name = spec.display_name();

        let thread = spawn_on_core(spec, move || run_periodic(name, period_s, &clock, &running, worker))
            .map_err(|e| {
                warn!("Distiller: spawn '{}' failed: {}", name, e);
                Error::Spawn(name)
            })?;
        self.workers.push(Worker { name, thread });
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop every worker after its current tick and wait for it.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);
        for w in self.workers.drain(..) {
            if w.thread.join().is_err() {
                warn!("Distiller: worker '{}' panicked", w.name);
            } else {
                info!("Distiller: worker '{}' stopped", w.name);
            }
        }
    }
}

/// Body of one worker thread.
trait Periodic {
    fn tick(&mut self, now_us: i64);

    /// Runs once after the last tick.
    fn stop(&mut self) {}
}

struct ControllerWorker<S: TuningStore, A: ActuatorPort> {
    controller: Controller<S>,
    hw: A,
}

impl<S: TuningStore, A: ActuatorPort> Periodic for ControllerWorker<S, A> {
    fn tick(&mut self, now_us: i64) {
        self.controller.process_inbox(now_us);
        if let Err(e) = self.controller.tick(now_us, &mut self.hw) {
            debug!("controller: {}", e);
        }
    }

    fn stop(&mut self) {
        self.controller.shutdown(&mut self.hw);
    }
}

impl Periodic for TelemetryLog {
    fn tick(&mut self, _now_us: i64) {
        self.process_inbox();
    }
}

fn run_periodic<C: Clock>(
    name: &'static str,
    period_s: f64,
    clock: &C,
    running: &AtomicBool,
    mut worker: impl Periodic,
) {
    let watchdog = Watchdog::subscribe(name);
    let mut sched = TickScheduler::from_secs(period_s, clock.now_us());
    info!("{}: running every {} us", name, sched.period_us());

    while running.load(Ordering::Acquire) {
        worker.tick(clock.now_us());
        watchdog.feed();

        let missed = sched.missed();
        let sleep_us = sched.advance(clock.now_us());
        if sched.missed() > missed {
            warn!("{}: overran, {} periods skipped", name, sched.missed() - missed);
        }
        if sleep_us > 0 {
            std::thread::sleep(Duration::from_micros(sleep_us as u64));
        }
    }
    worker.stop();
}
