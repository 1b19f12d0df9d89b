//! Task Watchdog Timer (TWDT) driver.
//!
//! [`configure`] sets the global timeout once at boot; each worker then
//! creates its own [`Watchdog`], which subscribes the *calling* task, and
//! feeds it once per tick.  A worker that stalls for longer than the
//! timeout resets the device.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Stall timeout before the TWDT panics.
pub const WATCHDOG_TIMEOUT_MS: u32 = 10_000;

/// Reconfigure the TWDT.  Call once from `main()`.
pub fn configure() {
    #[cfg(target_os = "espidf")]
    {
        let cfg = esp_task_wdt_config_t {
            timeout_ms: WATCHDOG_TIMEOUT_MS,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: called from main before any worker subscribes.
        let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
        if ret != ESP_OK {
            log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    log::info!("Watchdog(sim): {} ms timeout not armed", WATCHDOG_TIMEOUT_MS);
}

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Subscribe the current task.  `name` is only used for logging.
    pub fn subscribe(name: &str) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: a null handle subscribes the calling task.
            let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
            let subscribed = ret == ESP_OK;
            if subscribed {
                log::info!("Watchdog: '{}' subscribed", name);
            } else {
                log::warn!("Watchdog: '{}' failed to subscribe ({})", name, ret);
            }
            Self { subscribed }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::debug!("Watchdog(sim): '{}' no-op", name);
            Self {}
        }
    }

    /// Feed the watchdog.  Must be called at least every timeout period.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: the calling task is subscribed.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: the task unsubscribes itself before it exits.
                unsafe {
                    esp_task_wdt_delete(core::ptr::null_mut());
                }
            }
        }
    }
}
