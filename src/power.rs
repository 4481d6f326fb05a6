//! Power manager: the sleep / wake half of the duty cycle.
//!
//! Deep sleep is a full power cycle.  Nothing in RAM survives; the next
//! wake re-runs `main` from the top and only the durable door target
//! carries over.  The manager therefore refuses to sleep while the
//! controller is moving or the motor is still on, and lets queued
//! notifications finish first.
//!
//! ```text
//!   maybe_sleep(Some(secs))            maybe_sleep(None)
//!     busy? ──▶ Deferred                 busy? ──▶ Deferred
//!     arm buttons                        arm buttons
//!     grace period                       notifications (bounded)
//!     notifications (bounded)            deep sleep (until a button)
//!     busy? ──▶ Deferred
//!     deep sleep (secs, or a button)
//! ```

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, PowerPort, WakeCause};
use crate::fsm::context::SharedDoorState;
use crate::notifier::NotificationQueue;

const NOTIFY_POLL_MS: u32 = 500;

/// Why the chip booted, in door terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    PowerOn,
    /// The scheduled sleep ran out.
    Timer,
    /// Manual open button (ext0).
    ManualOpen,
    /// Manual close button (ext1).
    ManualClose,
    Other,
}

impl From<WakeCause> for WakeReason {
    fn from(cause: WakeCause) -> Self {
        match cause {
            WakeCause::PowerOn => Self::PowerOn,
            WakeCause::Timer => Self::Timer,
            WakeCause::Ext0 => Self::ManualOpen,
            WakeCause::Ext1 => Self::ManualClose,
            WakeCause::Other(_) => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The door was busy; still awake.
    Deferred,
    /// Sleep was entered.  Only observable off-target.
    Slept,
}

pub struct PowerManager<'a, P, D> {
    port: P,
    delay: D,
    shared: Arc<SharedDoorState>,
    grace_ms: u32,
    notifications: Option<&'a NotificationQueue>,
    notify_wait_ms: u32,
}

impl<'a, P: PowerPort, D: DelayNs> PowerManager<'a, P, D> {
    pub fn new(port: P, delay: D, shared: Arc<SharedDoorState>, grace_secs: u32) -> Self {
        Self {
            port,
            delay,
            shared,
            grace_ms: grace_secs.saturating_mul(1_000),
            notifications: None,
            notify_wait_ms: 0,
        }
    }

    /// Hold sleep for up to `max_wait_ms` while `queue` has requests
    /// queued or in delivery.
    pub fn with_notifications<'q>(self, queue: &'q NotificationQueue, max_wait_ms: u32) -> PowerManager<'q, P, D> {
        PowerManager {
            port: self.port,
            delay: self.delay,
            shared: self.shared,
            grace_ms: self.grace_ms,
            notifications: Some(queue),
            notify_wait_ms: max_wait_ms,
        }
    }

    pub fn wake_reason(&self) -> WakeReason {
        self.port.wake_cause().into()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Sleep for `duration_secs`, or until a button when `None`.
    ///
    /// A timed sleep waits out the grace period first so background
    /// work (a queued notification, a late limit edge) can finish.
    /// Outstanding notifications are then given up to the configured
    /// wait before sleep cuts them off.
    pub fn maybe_sleep(&mut self, duration_secs: Option<u64>, sink: &mut impl EventSink) -> SleepOutcome {
        if !self.shared.is_idle() {
            info!("POWER | door busy, sleep deferred");
            sink.emit(&AppEvent::SleepDeferred);
            return SleepOutcome::Deferred;
        }
        self.port.arm_wake_sources();

        let duration_ms = match duration_secs {
            Some(secs) => {
                info!("POWER | sleeping in {} s", self.grace_ms / 1_000);
                self.delay.delay_ms(self.grace_ms);
                self.wait_for_notifications();
                if !self.shared.is_idle() {
                    warn!("POWER | door started moving during grace, sleep deferred");
                    sink.emit(&AppEvent::SleepDeferred);
                    return SleepOutcome::Deferred;
                }
                Some(secs.saturating_mul(1_000))
            }
            None => {
                self.wait_for_notifications();
                None
            }
        };

        sink.emit(&AppEvent::Sleeping { duration_ms });
        self.port.deep_sleep(duration_ms);
        SleepOutcome::Slept
    }

    fn wait_for_notifications(&mut self) {
        let Some(queue) = self.notifications else {
            return;
        };
        let mut waited = 0u32;
        while queue.outstanding() > 0 {
            if waited >= self.notify_wait_ms {
                warn!("POWER | {} notification(s) still pending, sleeping anyway", queue.outstanding());
                return;
            }
            if waited == 0 {
                info!("POWER | waiting for {} notification(s)", queue.outstanding());
            }
            self.delay.delay_ms(NOTIFY_POLL_MS);
            waited = waited.saturating_add(NOTIFY_POLL_MS);
        }
    }

    /// Unrecoverable fault: sleep with no wake source armed.  Only a
    /// reset brings the board back.
    pub fn halt(&mut self) {
        warn!("POWER | halting");
        self.port.deep_sleep(None);
    }

    pub fn restart(&mut self) {
        info!("POWER | restarting");
        self.port.restart();
    }
}
