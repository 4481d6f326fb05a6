//! Door operation controller.
//!
//! Owns the motor and the durable target and is the only writer of
//! [`SharedDoorState`].  Runs on the main loop: every switch edge and
//! every scheduled operation reaches it through the event queue, one at
//! a time, so check-then-act on the operation state can never interleave.
//!
//! Completion is edge driven.  A limit edge only finishes a move when the
//! state matches and a level re-read confirms the switch, which filters
//! stray edges left over from the debounce window.

use std::sync::Arc;

use log::{debug, error, info, warn};

use super::context::SharedDoorState;
use super::states::{check_limits, DoorStatus, DoorTarget, LimitReading, OperatingMode, OperationState};
use super::{can_transition, state_name};
use crate::adapters::target_store::TargetStore;
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, InputPort, NotificationSink, Priority, StoragePort};
use crate::config::CoopConfig;
use crate::drivers::motor::{Direction, MotorDrive};
use crate::drivers::switches::{SwitchEvent, SwitchId};
use crate::error::WiringFault;
use crate::scheduler::Operation;

pub const MSG_OPENED: &str = "Door Opened!";
pub const MSG_CLOSED: &str = "Door Closed!";
pub const MSG_CHECK_DOOR: &str = "Check the door!";
pub const MSG_TIMED_OUT: &str = "Door operation timed out";

/// Behaviour knobs, fixed at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorPolicy {
    pub mode: OperatingMode,
    /// Back-off cycles before an obstruction escalates to opening.
    pub max_obstruction_retries: u8,
    pub backoff_ms: u32,
    pub operation_timeout_ms: u32,
}

impl DoorPolicy {
    pub fn from_config(config: &CoopConfig, mode: OperatingMode) -> Self {
        Self {
            mode,
            max_obstruction_retries: config.tuning.obstruction_retries,
            backoff_ms: config.tuning.backoff_ms,
            operation_timeout_ms: config.operation_timeout_ms(),
        }
    }
}

pub struct DoorController<M, I, S, N> {
    motor: M,
    inputs: I,
    store: TargetStore<S>,
    notifier: N,
    shared: Arc<SharedDoorState>,
    policy: DoorPolicy,
    open_armed: bool,
    close_armed: bool,
}

impl<M, I, S, N> DoorController<M, I, S, N>
where
    M: MotorDrive,
    I: InputPort,
    S: StoragePort,
    N: NotificationSink,
{
    /// Seeds the shared target from durable storage.
    pub fn new(
        motor: M,
        inputs: I,
        store: TargetStore<S>,
        notifier: N,
        shared: Arc<SharedDoorState>,
        policy: DoorPolicy,
    ) -> Self {
        shared.set_target(store.read());
        shared.set_operation(OperationState::Idle);
        Self {
            motor,
            inputs,
            store,
            notifier,
            shared,
            policy,
            open_armed: false,
            close_armed: false,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn shared(&self) -> &Arc<SharedDoorState> {
        &self.shared
    }

    pub fn policy(&self) -> DoorPolicy {
        self.policy
    }

    pub fn state(&self) -> OperationState {
        self.shared.operation()
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn store(&self) -> &TargetStore<S> {
        &self.store
    }

    pub fn armed(&self) -> (bool, bool) {
        (self.open_armed, self.close_armed)
    }

    /// Stored target against the live limit switches.
    pub fn status(&mut self) -> Result<DoorStatus, WiringFault> {
        check_limits(self.shared.target(), self.inputs.limits())
    }

    // ── Operations ────────────────────────────────────────────

    pub fn open(&mut self, sink: &mut impl EventSink) -> bool {
        self.start(Direction::Open, true, sink)
    }

    pub fn close(&mut self, sink: &mut impl EventSink) -> bool {
        self.start(Direction::Close, true, sink)
    }

    /// Run a scheduled operation exactly as a button would.
    pub fn execute(&mut self, op: Operation, sink: &mut impl EventSink) -> bool {
        match op {
            Operation::Open => self.open(sink),
            Operation::Close => self.close(sink),
        }
    }

    /// Start a move.  Returns `false` when the door is already at that
    /// limit (the stored target is resynced if it disagrees).
    fn start(&mut self, direction: Direction, notify: bool, sink: &mut impl EventSink) -> bool {
        let (target, moving) = match direction {
            Direction::Open => (DoorTarget::Open, OperationState::Opening),
            Direction::Close => (DoorTarget::Closed, OperationState::Closing),
        };
        let limits = self.inputs.limits();
        if at_limit(limits, direction) {
            if self.shared.target() != target {
                info!("door: already {:?}, resyncing stored target", target);
                self.persist_target(target, sink);
            }
            sink.emit(&AppEvent::AlreadyAtTarget { target });
            return false;
        }
        let current = self.shared.operation();
        if current == moving {
            debug!("door: already {}", state_name(moving));
            return true;
        }

        if self.motor.is_enabled() {
            self.motor.disable();
        }
        if direction == Direction::Close {
            self.shared.reset_obstruction_attempts();
        }
        // Write-before-move.
        self.persist_target(target, sink);
        if notify {
            self.shared.rearm_notification();
        } else {
            self.shared.claim_notification();
        }
        self.transition(moving, sink);
        sink.emit(&AppEvent::OperationStarted { target });
        info!("door: {}", state_name(moving));
        self.motor.enable(direction);
        true
    }

    /// Ramp down and go idle.  Used on mode change and before halting.
    pub fn shutdown(&mut self, sink: &mut impl EventSink) {
        if self.motor.is_enabled() {
            self.motor.disable();
        }
        if self.shared.operation().is_moving() {
            self.transition(OperationState::Idle, sink);
        }
        self.disarm();
    }

    /// Discard the stored target.  The next boot closes the door; until
    /// then the in-memory target keeps driving limit interpretation.
    pub fn reset_target(&mut self, sink: &mut impl EventSink) {
        info!("door: reset requested, clearing stored target");
        self.shutdown(sink);
        if let Err(e) = self.store.clear() {
            error!("door: clearing target failed: {}", e);
            sink.emit(&AppEvent::TargetWriteFailed);
        }
        sink.emit(&AppEvent::TargetReset);
    }

    /// Bring the door to its stored target after boot.
    ///
    /// Unknown resolves to Closed.  A door at the wrong limit or
    /// mid-travel is driven to the stored target.
    pub fn sync_to_target(&mut self, sink: &mut impl EventSink) -> Result<bool, WiringFault> {
        let status = self.status()?;
        info!("door: boot status target={:?} actual={:?}", status.target, status.actual);
        if status.target == DoorTarget::Unknown {
            return Ok(self.close(sink));
        }
        if status.at_target() {
            return Ok(false);
        }
        Ok(match status.target {
            DoorTarget::Open => self.open(sink),
            _ => self.close(sink),
        })
    }

    // ── Switch events ─────────────────────────────────────────

    pub fn handle_switch(&mut self, ev: SwitchEvent, sink: &mut impl EventSink) -> Result<(), WiringFault> {
        let limits = self.inputs.limits();
        if limits.open_triggered && limits.close_triggered {
            self.shutdown(sink);
            return Err(WiringFault::BothLimitsTriggered);
        }
        let state = self.shared.operation();
        match ev.switch {
            SwitchId::OpenLimit if state == OperationState::Opening && limits.open_triggered => {
                self.complete(DoorTarget::Open, sink);
            }
            SwitchId::CloseLimit if state == OperationState::Closing && limits.close_triggered => {
                self.complete(DoorTarget::Closed, sink);
            }
            SwitchId::ObstructionLimit if state == OperationState::Closing => {
                if self.inputs.obstruction_triggered() {
                    self.handle_obstruction(sink);
                }
            }
            SwitchId::ManualOpen | SwitchId::ManualClose => self.handle_button(ev.switch, sink),
            other => debug!("door: {:?} ignored while {}", other, state_name(state)),
        }
        Ok(())
    }

    fn complete(&mut self, target: DoorTarget, sink: &mut impl EventSink) {
        self.motor.disable();
        self.transition(OperationState::Idle, sink);
        self.disarm();
        sink.emit(&AppEvent::OperationCompleted { target });
        info!("door: {:?}", target);
        if self.policy.mode == OperatingMode::Auto && self.shared.claim_notification() {
            let msg = if target == DoorTarget::Open { MSG_OPENED } else { MSG_CLOSED };
            self.notifier.notify(msg, Priority::Normal);
        }
    }

    /// Back off and retry while the obstruction switch stays tripped,
    /// then give up and reopen.  Iterative; depth never grows.
    fn handle_obstruction(&mut self, sink: &mut impl EventSink) {
        loop {
            let attempts = self.shared.obstruction_attempts();
            if attempts >= self.policy.max_obstruction_retries {
                warn!("door: obstruction persists after {} retries, reopening", attempts);
                self.motor.disable();
                sink.emit(&AppEvent::ObstructionEscalated { attempts });
                self.notifier.notify(MSG_CHECK_DOOR, Priority::High);
                if !self.start(Direction::Open, false, sink) {
                    self.transition(OperationState::Idle, sink);
                }
                return;
            }

            self.motor.disable();
            self.motor.enable(Direction::Close.reversed());
            self.motor.pause_ms(self.policy.backoff_ms);
            self.motor.disable();
            self.motor.enable(Direction::Close);
            let attempt = self.shared.bump_obstruction_attempts();
            self.transition(OperationState::Closing, sink);
            sink.emit(&AppEvent::ObstructionRetry { attempt });
            info!("door: obstruction retry {}/{}", attempt, self.policy.max_obstruction_retries);

            if !self.inputs.obstruction_triggered() {
                return;
            }
        }
    }

    fn handle_button(&mut self, button: SwitchId, sink: &mut impl EventSink) {
        let (open_held, close_held) = self.inputs.buttons_held();
        if open_held && close_held {
            self.reset_target(sink);
            return;
        }

        let state = self.shared.operation();
        if state.is_moving() {
            // A press during any move is a deliberate stop.
            info!("door: {} interrupted by {:?}", state_name(state), button);
            self.motor.disable();
            self.transition(OperationState::Idle, sink);
            self.disarm();
            sink.emit(&AppEvent::Interrupted { during: state });
            return;
        }

        if self.policy.mode != OperatingMode::Manual {
            debug!("door: {:?} ignored in auto mode", button);
            return;
        }
        match button {
            SwitchId::ManualOpen => {
                self.close_armed = false;
                self.open_armed = self.open(sink);
            }
            SwitchId::ManualClose => {
                self.open_armed = false;
                self.close_armed = self.close(sink);
            }
            _ => {}
        }
    }

    // ── Stuck-motor guard ─────────────────────────────────────

    /// Force the motor off once a move outlives the operation timeout.
    pub fn check_timeout(&mut self, now_ms: u32, sink: &mut impl EventSink) -> bool {
        let pending = self.shared.pending();
        if !pending.is_overdue(now_ms, self.policy.operation_timeout_ms) {
            return false;
        }
        let during = self.shared.operation();
        let elapsed_ms = pending.elapsed_ms(now_ms);
        error!("door: {} still running after {} ms, stopping", state_name(during), elapsed_ms);
        self.motor.disable();
        if during.is_moving() {
            self.transition(OperationState::Idle, sink);
        }
        self.disarm();
        sink.emit(&AppEvent::OperationTimedOut { during, elapsed_ms });
        self.notifier.notify(MSG_TIMED_OUT, Priority::High);
        true
    }

    // ── Internal ──────────────────────────────────────────────

    fn transition(&mut self, to: OperationState, sink: &mut impl EventSink) {
        let from = self.shared.operation();
        if !can_transition(from, to) {
            warn!("door: refused transition {} -> {}", state_name(from), state_name(to));
            return;
        }
        self.shared.set_operation(to);
        sink.emit(&AppEvent::StateChanged { from, to });
    }

    fn persist_target(&mut self, target: DoorTarget, sink: &mut impl EventSink) {
        self.shared.set_target(target);
        if let Err(e) = self.store.write(target) {
            error!("door: writing target {:?} failed: {}", target, e);
            sink.emit(&AppEvent::TargetWriteFailed);
        }
    }

    fn disarm(&mut self) {
        self.open_armed = false;
        self.close_armed = false;
    }
}

fn at_limit(limits: LimitReading, direction: Direction) -> bool {
    match direction {
        Direction::Open => limits.open_triggered,
        Direction::Close => limits.close_triggered,
    }
}
