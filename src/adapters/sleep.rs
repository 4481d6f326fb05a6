//! Deep-sleep adapter.
//!
//! Implements [`PowerPort`] on the ESP32 sleep controller: ext0 wakes on
//! the manual-open button, ext1 on the manual-close button, the RTC timer
//! on the next scheduled operation.  The host twin records every call so
//! the power manager can be tested without sleeping.

use crate::app::ports::{PowerPort, WakeCause};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
#[derive(Debug, Default)]
pub struct EspSleepAdapter;

#[cfg(target_os = "espidf")]
impl EspSleepAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl PowerPort for EspSleepAdapter {
    fn arm_wake_sources(&mut self) {
        // SAFETY: plain register configuration, called from one thread
        // just before esp_deep_sleep_start().
        unsafe {
            for pin in [pins::MANUAL_OPEN_GPIO, pins::MANUAL_CLOSE_GPIO] {
                rtc_gpio_pullup_en(pin);
                rtc_gpio_pulldown_dis(pin);
            }
            let ret = esp_sleep_enable_ext0_wakeup(pins::MANUAL_OPEN_GPIO, 0);
            if ret != ESP_OK {
                warn!("POWER | ext0 wake arm failed ({})", ret);
            }
            let ret = esp_sleep_enable_ext1_wakeup(
                1u64 << pins::MANUAL_CLOSE_GPIO,
                esp_sleep_ext1_wakeup_mode_t_ESP_EXT1_WAKEUP_ALL_LOW,
            );
            if ret != ESP_OK {
                warn!("POWER | ext1 wake arm failed ({})", ret);
            }
        }
    }

    fn deep_sleep(&mut self, duration_ms: Option<u64>) {
        // SAFETY: esp_deep_sleep_start never returns; the chip reboots on wake.
        unsafe {
            if let Some(ms) = duration_ms {
                esp_sleep_enable_timer_wakeup(ms.saturating_mul(1_000));
            }
            info!("POWER | entering deep sleep");
            esp_deep_sleep_start();
        }
    }

    fn restart(&mut self) {
        // SAFETY: esp_restart never returns.
        unsafe { esp_restart() };
    }

    fn wake_cause(&self) -> WakeCause {
        // SAFETY: read-only query of the RTC wake reason.
        let cause = unsafe { esp_sleep_get_wakeup_cause() };
        #[allow(non_upper_case_globals)]
        match cause {
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED => WakeCause::PowerOn,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => WakeCause::Timer,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT0 => WakeCause::Ext0,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT1 => WakeCause::Ext1,
            other => WakeCause::Other(other as u32),
        }
    }
}

/// Host twin: records what the firmware asked the sleep controller to do.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug)]
pub struct EspSleepAdapter {
    cause: WakeCause,
    pub armed: u32,
    pub sleeps: Vec<Option<u64>>,
    pub restarts: u32,
}

#[cfg(not(target_os = "espidf"))]
impl Default for EspSleepAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl EspSleepAdapter {
    pub fn new() -> Self {
        Self::with_cause(WakeCause::PowerOn)
    }

    pub fn with_cause(cause: WakeCause) -> Self {
        Self {
            cause,
            armed: 0,
            sleeps: Vec::new(),
            restarts: 0,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl PowerPort for EspSleepAdapter {
    fn arm_wake_sources(&mut self) {
        self.armed += 1;
    }

    fn deep_sleep(&mut self, duration_ms: Option<u64>) {
        log::info!("POWER | (sim) deep sleep {:?}", duration_ms);
        self.sleeps.push(duration_ms);
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn wake_cause(&self) -> WakeCause {
        self.cause
    }
}
