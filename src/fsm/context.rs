//! Door state shared between the controller, ISRs and background loops.
//!
//! The controller is the only writer.  ISRs, the clock loop, the heartbeat
//! and the power manager only read.  Every field is a single atomic word,
//! so no reader ever sees a half-updated value and nobody holds a lock
//! across a blocking call.  Handed out as `Arc<SharedDoorState>`.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use super::states::{DoorTarget, OperationState};

/// Motor-on bookkeeping: set by `enable`, cleared by `disable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingOperation {
    pub active: bool,
    pub started_at_ms: u32,
}

impl PendingOperation {
    /// Milliseconds since the motor was enabled (rollover-safe).
    pub fn elapsed_ms(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.started_at_ms)
    }

    /// Motor still on after `timeout_ms`.
    pub fn is_overdue(&self, now_ms: u32, timeout_ms: u32) -> bool {
        self.active && self.elapsed_ms(now_ms) >= timeout_ms
    }
}

pub struct SharedDoorState {
    operation: AtomicU8,
    target: AtomicU8,
    pending_active: AtomicBool,
    pending_started_ms: AtomicU32,
    obstruction_attempts: AtomicU8,
    notification_sent: AtomicBool,
    /// Events the controller has finished handling since boot.
    handled: AtomicU32,
}

impl SharedDoorState {
    pub const fn new() -> Self {
        Self {
            operation: AtomicU8::new(OperationState::Idle as u8),
            target: AtomicU8::new(DoorTarget::Unknown as u8),
            pending_active: AtomicBool::new(false),
            pending_started_ms: AtomicU32::new(0),
            obstruction_attempts: AtomicU8::new(0),
            notification_sent: AtomicBool::new(false),
            handled: AtomicU32::new(0),
        }
    }

    // -- Operation state --

    pub fn operation(&self) -> OperationState {
        OperationState::from_index(self.operation.load(Ordering::Acquire))
    }

    pub fn set_operation(&self, state: OperationState) {
        self.operation.store(state as u8, Ordering::Release);
    }

    // -- Target mirror (durable copy lives in the target store) --

    pub fn target(&self) -> DoorTarget {
        DoorTarget::from_index(self.target.load(Ordering::Acquire))
    }

    pub fn set_target(&self, target: DoorTarget) {
        self.target.store(target as u8, Ordering::Release);
    }

    // -- Pending operation --

    pub fn pending(&self) -> PendingOperation {
        // Timestamp first: `active` is published last in begin_pending.
        let started_at_ms = self.pending_started_ms.load(Ordering::Acquire);
        let active = self.pending_active.load(Ordering::Acquire);
        PendingOperation { active, started_at_ms }
    }

    pub fn begin_pending(&self, now_ms: u32) {
        self.pending_started_ms.store(now_ms, Ordering::Release);
        self.pending_active.store(true, Ordering::Release);
    }

    pub fn end_pending(&self) {
        self.pending_active.store(false, Ordering::Release);
    }

    // -- Obstruction counter --

    pub fn obstruction_attempts(&self) -> u8 {
        self.obstruction_attempts.load(Ordering::Relaxed)
    }

    pub fn reset_obstruction_attempts(&self) {
        self.obstruction_attempts.store(0, Ordering::Relaxed);
    }

    /// Returns the new count.
    pub fn bump_obstruction_attempts(&self) -> u8 {
        self.obstruction_attempts.fetch_add(1, Ordering::Relaxed).saturating_add(1)
    }

    // -- Once-per-operation notification guard --

    pub fn rearm_notification(&self) {
        self.notification_sent.store(false, Ordering::Release);
    }

    /// `true` exactly once per operation.
    pub fn claim_notification(&self) -> bool {
        !self.notification_sent.swap(true, Ordering::AcqRel)
    }

    // -- Progress --

    pub fn mark_handled(&self) {
        self.handled.fetch_add(1, Ordering::AcqRel);
    }

    pub fn handled(&self) -> u32 {
        self.handled.load(Ordering::Acquire)
    }

    /// Not moving and the motor is off.  Safe to sleep.
    pub fn is_idle(&self) -> bool {
        self.operation() == OperationState::Idle && !self.pending().active
    }
}

impl Default for SharedDoorState {
    fn default() -> Self {
        Self::new()
    }
}
