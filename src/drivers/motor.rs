//! Door motor driver.
//!
//! Two board variants share one interface:
//!
//! - **Stepper** (A4988 / DRV8825 style): STEP pulses from LEDC, a DIR
//!   line, and an active-high enable.  Every move ramps the step rate
//!   linearly between `min_freq` and `max_freq`.
//! - **DC** (L298N style H-bridge): two direction inputs and an enable.
//!   No ramp; the bridge switches directly.
//!
//! The controller only sees [`MotorDrive`].  Which variant runs is picked
//! at boot from `tuning.motor_kind`.
//!
//! ## Invariants
//!
//! - `enable` never returns before the step rate reaches `max_freq`.
//! - `disable` always ramps down to `min_freq` before the pulse train is
//!   stopped and power is cut, on every path including faults.
//! - Direction is only changed while the driver is disabled.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{Clock, MotorLines};
use crate::fsm::context::SharedDoorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Open,
    Close,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Self::Open => Self::Close,
            Self::Close => Self::Open,
        }
    }
}

/// Which driver board is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorKind {
    #[default]
    Stepper,
    Dc,
}

/// Linear step-rate ramp.  Built once from config by
/// [`CoopConfig::ramp_profile`](crate::config::CoopConfig::ramp_profile).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampProfile {
    pub min_freq: u32,
    pub max_freq: u32,
    /// Hz added or removed per ramp step.  Never zero.
    pub step: u32,
    pub step_interval_ms: u32,
}

/// What the door controller needs from a motor.
///
/// Not reentrant: the controller checks its operation state before every
/// call so only one `enable`/`disable` is ever in flight.
pub trait MotorDrive {
    /// Power up and start moving toward `direction`.
    fn enable(&mut self, direction: Direction);

    /// Stop and power down.  Harmless when already disabled.
    fn disable(&mut self);

    fn is_enabled(&self) -> bool;

    /// Last direction requested, `None` before the first move.
    fn direction(&self) -> Option<Direction>;

    /// Blocking pause used between back-off phases.
    fn pause_ms(&mut self, ms: u32);
}

// ── Stepper ───────────────────────────────────────────────────

pub struct RampedMotor<L, D, C> {
    lines: L,
    delay: D,
    clock: C,
    profile: RampProfile,
    shared: Arc<SharedDoorState>,
    enabled: bool,
    direction: Option<Direction>,
    current_freq: u32,
}

impl<L: MotorLines, D: DelayNs, C: Clock> RampedMotor<L, D, C> {
    pub fn new(lines: L, delay: D, clock: C, profile: RampProfile, shared: Arc<SharedDoorState>) -> Self {
        Self {
            lines,
            delay,
            clock,
            profile,
            shared,
            enabled: false,
            direction: None,
            current_freq: 0,
        }
    }

    pub fn current_freq(&self) -> u32 {
        self.current_freq
    }

    pub fn profile(&self) -> RampProfile {
        self.profile
    }

    fn set_freq(&mut self, hz: u32) {
        self.current_freq = hz;
        self.lines.set_step_frequency(hz);
    }

    fn ramp_up(&mut self) {
        let RampProfile { max_freq, step, step_interval_ms, .. } = self.profile;
        let step = step.max(1);
        while self.current_freq < max_freq {
            self.delay.delay_ms(step_interval_ms);
            let next = self.current_freq.saturating_add(step).min(max_freq);
            self.set_freq(next);
        }
    }

    fn ramp_down(&mut self) {
        let RampProfile { min_freq, step, step_interval_ms, .. } = self.profile;
        let step = step.max(1);
        while self.current_freq > min_freq {
            self.delay.delay_ms(step_interval_ms);
            let next = self.current_freq.saturating_sub(step).max(min_freq);
            self.set_freq(next);
        }
        // Below-min start (or min already reached): land exactly on min.
        if self.current_freq != min_freq {
            self.set_freq(min_freq);
        }
    }
}

impl<L: MotorLines, D: DelayNs, C: Clock> MotorDrive for RampedMotor<L, D, C> {
    fn enable(&mut self, direction: Direction) {
        if self.enabled {
            warn!("motor: enable({:?}) while already enabled, ignored", direction);
            return;
        }
        self.lines.set_direction(direction);
        self.lines.set_power(true);
        self.set_freq(self.profile.min_freq);
        self.enabled = true;
        self.direction = Some(direction);
        self.shared.begin_pending(self.clock.now_ms());
        self.ramp_up();
        debug!("motor: {:?} at {} Hz", direction, self.current_freq);
    }

    fn disable(&mut self) {
        if !self.enabled {
            self.lines.set_power(false);
            self.shared.end_pending();
            return;
        }
        self.ramp_down();
        self.set_freq(0);
        self.lines.set_power(false);
        self.enabled = false;
        self.shared.end_pending();
        debug!("motor: disabled");
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn direction(&self) -> Option<Direction> {
        self.direction
    }

    fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

// ── DC ────────────────────────────────────────────────────────

pub struct DirectMotor<L, D, C> {
    lines: L,
    delay: D,
    clock: C,
    shared: Arc<SharedDoorState>,
    enabled: bool,
    direction: Option<Direction>,
}

impl<L: MotorLines, D: DelayNs, C: Clock> DirectMotor<L, D, C> {
    pub fn new(lines: L, delay: D, clock: C, shared: Arc<SharedDoorState>) -> Self {
        Self {
            lines,
            delay,
            clock,
            shared,
            enabled: false,
            direction: None,
        }
    }
}

impl<L: MotorLines, D: DelayNs, C: Clock> MotorDrive for DirectMotor<L, D, C> {
    fn enable(&mut self, direction: Direction) {
        if self.enabled {
            warn!("motor: enable({:?}) while already enabled, ignored", direction);
            return;
        }
        self.lines.set_direction(direction);
        self.lines.set_power(true);
        self.enabled = true;
        self.direction = Some(direction);
        self.shared.begin_pending(self.clock.now_ms());
    }

    fn disable(&mut self) {
        self.lines.set_power(false);
        self.enabled = false;
        self.shared.end_pending();
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn direction(&self) -> Option<Direction> {
        self.direction
    }

    fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

// ── Runtime selection ─────────────────────────────────────────

/// The fitted motor, chosen at boot.
pub enum Motor<L, D, C> {
    Ramped(RampedMotor<L, D, C>),
    Direct(DirectMotor<L, D, C>),
}

impl<L: MotorLines, D: DelayNs, C: Clock> Motor<L, D, C> {
    pub fn from_kind(
        kind: MotorKind,
        lines: L,
        delay: D,
        clock: C,
        profile: RampProfile,
        shared: Arc<SharedDoorState>,
    ) -> Self {
        match kind {
            MotorKind::Stepper => Self::Ramped(RampedMotor::new(lines, delay, clock, profile, shared)),
            MotorKind::Dc => Self::Direct(DirectMotor::new(lines, delay, clock, shared)),
        }
    }

    pub fn kind(&self) -> MotorKind {
        match self {
            Self::Ramped(_) => MotorKind::Stepper,
            Self::Direct(_) => MotorKind::Dc,
        }
    }

    fn inner(&self) -> &dyn MotorDrive {
        match self {
            Self::Ramped(m) => m,
            Self::Direct(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MotorDrive {
        match self {
            Self::Ramped(m) => m,
            Self::Direct(m) => m,
        }
    }
}

impl<L: MotorLines, D: DelayNs, C: Clock> MotorDrive for Motor<L, D, C> {
    fn enable(&mut self, direction: Direction) {
        self.inner_mut().enable(direction);
    }

    fn disable(&mut self) {
        self.inner_mut().disable();
    }

    fn is_enabled(&self) -> bool {
        self.inner().is_enabled()
    }

    fn direction(&self) -> Option<Direction> {
        self.inner().direction()
    }

    fn pause_ms(&mut self, ms: u32) {
        self.inner_mut().pause_ms(ms);
    }
}
