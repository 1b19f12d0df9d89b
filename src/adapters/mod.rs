//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements     | Connects to                    |
//! |-------------|----------------|--------------------------------|
//! | `hardware`  | ActuatorPort   | ESP32 LEDC, GPIO (`OutputPin`) |
//! | `log_sink`  | bus worker     | Serial log output              |
//! | `nvs`       | TuningStore    | NVS / in-memory store          |
//! | `time`      | Clock          | ESP32 system timer             |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
