//! stillctl Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter  NvsAdapter     Esp32TimeAdapter  TelemetryLog │
//! │  (ActuatorPort)   (TuningStore)  (Clock)           (bus sink)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        Controller (PID · hysteresis · slow PWM)        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Distiller: MessageBus + delay-until worker threads            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{anyhow, Result};
use log::{error, info};

use stillctl::adapters::hardware::HardwareAdapter;
use stillctl::adapters::nvs::NvsAdapter;
use stillctl::adapters::time::Esp32TimeAdapter;
use stillctl::app::runtime::Distiller;
use stillctl::config::ControllerConfig;
use stillctl::drivers::{hw_init, watchdog};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  stillctl v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = ControllerConfig::default();
    if let Err(e) = config.validate() {
        // The controller still starts, inert, so the rest of the
        // system keeps reporting.
        error!("Board configuration invalid: {}", e);
    }

    // ── 3. Hardware ───────────────────────────────────────────
    hw_init::init_peripherals(&config)?;
    watchdog::configure();
    let hw = HardwareAdapter::from_config(&config);

    // ── 4. Persistence ────────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {e}"))?;

    // ── 5. Workers ────────────────────────────────────────────
    let mut distiller = Distiller::new(Esp32TimeAdapter::new());
    distiller.spawn_telemetry_log()?;
    distiller.spawn_controller(config, nvs, hw)?;

    info!("System ready: {} workers running", distiller.worker_count());

    // Workers own all state; the main task only keeps the owner alive.
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}
