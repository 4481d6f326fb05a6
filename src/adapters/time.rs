//! ESP32 time adapter.
//!
//! Implements [`Clock`]:
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for the monotonic
//!   millisecond counter and `gettimeofday()` for wall time (set by SNTP).
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `SystemTime` for host-side testing and simulation.

use crate::app::ports::Clock;

/// Anything earlier than 2020-01-01 means SNTP has not run yet.
const EPOCH_2020: i64 = 1_577_836_800;

#[derive(Clone, Copy)]
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    #[cfg(target_os = "espidf")]
    fn wall_secs(&self) -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        Some(tv.tv_sec as i64)
    }

    #[cfg(not(target_os = "espidf"))]
    fn wall_secs(&self) -> Option<i64> {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs() as i64)
    }
}

impl Clock for Esp32TimeAdapter {
    fn now_ms(&self) -> u32 {
        (self.uptime_us() / 1_000) as u32
    }

    fn unix_time(&self) -> Option<i64> {
        self.wall_secs().filter(|&t| t >= EPOCH_2020)
    }
}

/// ISR timestamp without an adapter instance.
#[cfg(target_os = "espidf")]
pub fn isr_now_ms() -> u32 {
    ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1_000) as u32
}
