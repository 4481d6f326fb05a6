//! Heartbeat LEDs.
//!
//! The status LED and the enclosure activity LED blink together: fast
//! while the firmware is booting or the door is moving, slow when idle.
//! The blink engine is pure; [`Heartbeat::run`] is the thread body that
//! drives the pins.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::drivers::hw_init::gpio_write;
use crate::fsm::context::SharedDoorState;
use crate::pins;

/// Half-period for the current activity level.
pub fn half_period_ms(booting: bool, moving: bool, active_ms: u32, idle_ms: u32) -> u32 {
    if booting || moving { active_ms } else { idle_ms }
}

pub struct Heartbeat {
    shared: Arc<SharedDoorState>,
    booting: Arc<AtomicBool>,
    active_ms: u32,
    idle_ms: u32,
    lit: bool,
    since_toggle_ms: u32,
}

impl Heartbeat {
    /// `booting` starts `true`; main clears it once the door has synced.
    pub fn new(shared: Arc<SharedDoorState>, booting: Arc<AtomicBool>, active_ms: u32, idle_ms: u32) -> Self {
        Self {
            shared,
            booting,
            active_ms: active_ms.max(1),
            idle_ms: idle_ms.max(1),
            lit: false,
            since_toggle_ms: 0,
        }
    }

    pub fn half_period(&self) -> u32 {
        let moving = self.shared.operation().is_moving() || self.shared.pending().active;
        half_period_ms(self.booting.load(Ordering::Acquire), moving, self.active_ms, self.idle_ms)
    }

    /// Advance by `elapsed_ms`.  Returns the new LED level on a toggle.
    pub fn tick(&mut self, elapsed_ms: u32) -> Option<bool> {
        self.since_toggle_ms = self.since_toggle_ms.saturating_add(elapsed_ms);
        if self.since_toggle_ms < self.half_period() {
            return None;
        }
        self.since_toggle_ms = 0;
        self.lit = !self.lit;
        Some(self.lit)
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Thread body.  Polls often enough that a switch to the fast rate
    /// shows within one fast half-period.
    pub fn run(mut self) -> ! {
        let poll_ms = (self.active_ms / 2).clamp(10, 50);
        loop {
            std::thread::sleep(std::time::Duration::from_millis(poll_ms as u64));
            if let Some(level) = self.tick(poll_ms) {
                gpio_write(pins::STATUS_LED_GPIO, level);
                gpio_write(pins::ACTIVITY_LED_GPIO, level);
            }
        }
    }
}
