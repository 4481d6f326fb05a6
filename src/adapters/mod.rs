//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                 |
//! |----------------|--------------------|-----------------------------|
//! | `hardware`     | InputPort          | ESP32 GPIO inputs           |
//! |                | MotorLines         | GPIO + LEDC step channel    |
//! | `log_sink`     | EventSink          | Serial log output           |
//! | `nvs`          | ConfigPort         | NVS / in-memory store       |
//! |                | StoragePort        |                             |
//! | `target_store` | (over StoragePort) | Durable door target         |
//! | `time`         | Clock              | ESP32 system timer, RTC     |
//! | `sleep`        | PowerPort          | Deep-sleep controller       |
//! | `sun_api`      | SunTimesPort       | api.sunrise-sunset.org      |
//! | `pushover`     | NotifyTransport    | api.pushover.net            |
//! | `wifi`         | (station + SNTP)   | ESP-IDF WiFi STA            |

pub mod hardware;
#[cfg(target_os = "espidf")]
pub(crate) mod http;
pub mod log_sink;
pub mod nvs;
pub mod pushover;
pub mod sleep;
pub mod sun_api;
pub mod target_store;
pub mod time;
pub mod wifi;
