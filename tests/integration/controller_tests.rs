//! Door controller against mock motor, inputs, storage and notifier.

use crate::mock_hw::{BACKOFF_MS, MemStorage, MotorCall, RETRIES, Rig, TIMEOUT_MS};

use coopdoor::app::events::AppEvent;
use coopdoor::app::ports::Priority;
use coopdoor::drivers::motor::Direction;
use coopdoor::drivers::switches::SwitchId;
use coopdoor::error::WiringFault;
use coopdoor::fsm::controller::{MSG_CHECK_DOOR, MSG_CLOSED, MSG_OPENED, MSG_TIMED_OUT};
use coopdoor::fsm::states::{DoorTarget, LimitReading, OperatingMode, OperationState};

fn auto_rig(limits: LimitReading, stored: DoorTarget) -> Rig {
    Rig::new(OperatingMode::Auto, limits, stored)
}

// ── open / close ──────────────────────────────────────────────

#[test]
fn close_at_close_limit_is_a_no_op() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);

    assert!(!rig.controller.close(&mut rig.sink));

    assert!(rig.controller.motor().calls.is_empty());
    assert_eq!(rig.controller.state(), OperationState::Idle);
    assert!(rig.sink.contains(&AppEvent::AlreadyAtTarget { target: DoorTarget::Closed }));
}

#[test]
fn no_op_resyncs_a_stale_target() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Closed);

    assert!(!rig.controller.open(&mut rig.sink));

    assert_eq!(rig.shared.target(), DoorTarget::Open);
    assert_eq!(rig.stored(), DoorTarget::Open);
}

#[test]
fn close_persists_target_before_moving() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Open);

    assert!(rig.controller.close(&mut rig.sink));

    assert_eq!(rig.stored(), DoorTarget::Closed);
    assert_eq!(rig.controller.state(), OperationState::Closing);
    assert_eq!(rig.controller.motor().calls, vec![MotorCall::Enable(Direction::Close)]);
    assert!(rig.shared.pending().active);
}

#[test]
fn close_limit_completes_and_notifies_once() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Open);
    rig.controller.close(&mut rig.sink);

    rig.inputs.set_limits(LimitReading::CLOSED);
    rig.switch(SwitchId::CloseLimit).unwrap();
    // A bounce that slipped past the debounce window.
    rig.switch(SwitchId::CloseLimit).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Idle);
    assert!(!rig.controller.motor().is_enabled_now());
    assert_eq!(rig.notifications(), &[(MSG_CLOSED.to_string(), Priority::Normal)]);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::OperationCompleted { .. })),
        1
    );
}

#[test]
fn limit_edge_without_level_confirmation_is_ignored() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);
    rig.controller.open(&mut rig.sink);

    // Edge arrives but the switch has already released.
    rig.inputs.set_limits(LimitReading::MID_TRAVEL);
    rig.switch(SwitchId::OpenLimit).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Opening);
}

#[test]
fn wrong_limit_edge_is_ignored() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Open);
    rig.controller.close(&mut rig.sink);

    rig.switch(SwitchId::OpenLimit).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Closing);
}

#[test]
fn repeated_request_does_not_restart_motor() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);

    assert!(rig.controller.open(&mut rig.sink));
    assert!(rig.controller.open(&mut rig.sink));

    assert_eq!(rig.controller.motor().enables(), vec![Direction::Open]);
}

#[test]
fn reversing_mid_travel_stops_first() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);
    rig.controller.open(&mut rig.sink);
    rig.inputs.set_limits(LimitReading::MID_TRAVEL);

    rig.controller.close(&mut rig.sink);

    assert_eq!(
        rig.controller.motor().calls,
        vec![
            MotorCall::Enable(Direction::Open),
            MotorCall::Disable,
            MotorCall::Enable(Direction::Close),
        ]
    );
    assert_eq!(rig.controller.state(), OperationState::Closing);
}

#[test]
fn target_write_failure_does_not_stop_the_move() {
    let mut storage = MemStorage::with_target(DoorTarget::Closed);
    storage.fail_writes = true;
    let mut rig = Rig::with_storage(OperatingMode::Auto, LimitReading::CLOSED, storage);

    assert!(rig.controller.open(&mut rig.sink));

    assert!(rig.sink.contains(&AppEvent::TargetWriteFailed));
    assert_eq!(rig.shared.target(), DoorTarget::Open);
    assert_eq!(rig.controller.state(), OperationState::Opening);
}

// ── obstruction ───────────────────────────────────────────────

#[test]
fn obstruction_backs_off_and_resumes_closing() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Open);
    rig.controller.close(&mut rig.sink);
    rig.inputs.set_limits(LimitReading::MID_TRAVEL);
    rig.inputs.script_obstruction(&[true, false]);

    rig.switch(SwitchId::ObstructionLimit).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Closing);
    assert_eq!(rig.shared.obstruction_attempts(), 1);
    assert_eq!(
        rig.controller.motor().calls,
        vec![
            MotorCall::Enable(Direction::Close),
            MotorCall::Disable,
            MotorCall::Enable(Direction::Open),
            MotorCall::Pause(BACKOFF_MS),
            MotorCall::Disable,
            MotorCall::Enable(Direction::Close),
        ]
    );
    assert!(rig.notifications().is_empty());
}

#[test]
fn persistent_obstruction_escalates_to_open() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Open);
    rig.controller.close(&mut rig.sink);
    rig.inputs.set_limits(LimitReading::MID_TRAVEL);
    rig.inputs.set_obstruction(true);

    rig.switch(SwitchId::ObstructionLimit).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Opening);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::ObstructionRetry { .. })),
        usize::from(RETRIES)
    );
    assert!(rig.sink.contains(&AppEvent::ObstructionEscalated { attempts: RETRIES }));
    assert_eq!(rig.notifications(), &[(MSG_CHECK_DOOR.to_string(), Priority::High)]);
    assert_eq!(rig.controller.motor().enables().last(), Some(&Direction::Open));
    assert_eq!(rig.stored(), DoorTarget::Open);

    // The reopen finishes quietly: the warning already went out.
    rig.inputs.set_limits(LimitReading::OPEN);
    rig.switch(SwitchId::OpenLimit).unwrap();
    assert_eq!(rig.controller.state(), OperationState::Idle);
    assert_eq!(rig.notifications().len(), 1);
}

#[test]
fn obstruction_while_opening_is_ignored() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);
    rig.controller.open(&mut rig.sink);
    rig.inputs.set_obstruction(true);

    rig.switch(SwitchId::ObstructionLimit).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Opening);
    assert_eq!(rig.shared.obstruction_attempts(), 0);
}

#[test]
fn new_close_resets_obstruction_count() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Open);
    rig.controller.close(&mut rig.sink);
    rig.inputs.set_limits(LimitReading::MID_TRAVEL);
    rig.inputs.script_obstruction(&[true, false]);
    rig.switch(SwitchId::ObstructionLimit).unwrap();
    assert_eq!(rig.shared.obstruction_attempts(), 1);

    rig.controller.open(&mut rig.sink);
    rig.controller.close(&mut rig.sink);

    assert_eq!(rig.shared.obstruction_attempts(), 0);
}

// ── buttons ───────────────────────────────────────────────────

#[test]
fn manual_button_starts_and_arms() {
    let mut rig = Rig::new(OperatingMode::Manual, LimitReading::CLOSED, DoorTarget::Closed);

    rig.switch(SwitchId::ManualOpen).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Opening);
    assert_eq!(rig.controller.armed(), (true, false));
}

#[test]
fn second_press_stops_the_move() {
    let mut rig = Rig::new(OperatingMode::Manual, LimitReading::CLOSED, DoorTarget::Closed);
    rig.switch(SwitchId::ManualOpen).unwrap();
    rig.inputs.set_limits(LimitReading::MID_TRAVEL);

    rig.switch(SwitchId::ManualClose).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Idle);
    assert_eq!(rig.controller.armed(), (false, false));
    assert!(rig.sink.contains(&AppEvent::Interrupted { during: OperationState::Opening }));
    assert_eq!(rig.controller.motor().enables(), vec![Direction::Open]);
}

#[test]
fn manual_completion_sends_nothing() {
    let mut rig = Rig::new(OperatingMode::Manual, LimitReading::OPEN, DoorTarget::Open);
    rig.switch(SwitchId::ManualClose).unwrap();
    rig.inputs.set_limits(LimitReading::CLOSED);

    rig.switch(SwitchId::CloseLimit).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Idle);
    assert!(rig.notifications().is_empty());
}

#[test]
fn auto_mode_ignores_idle_button() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);

    rig.switch(SwitchId::ManualOpen).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Idle);
    assert!(rig.controller.motor().calls.is_empty());
}

#[test]
fn auto_mode_button_still_stops_a_move() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);
    rig.controller.open(&mut rig.sink);

    rig.switch(SwitchId::ManualClose).unwrap();

    assert_eq!(rig.controller.state(), OperationState::Idle);
}

#[test]
fn both_buttons_reset_the_target() {
    let mut rig = Rig::new(OperatingMode::Manual, LimitReading::OPEN, DoorTarget::Open);
    rig.inputs.set_buttons(true, true);

    rig.switch(SwitchId::ManualClose).unwrap();

    assert_eq!(rig.shared.target(), DoorTarget::Open);
    assert_eq!(rig.stored(), DoorTarget::Unknown);
    assert!(rig.sink.contains(&AppEvent::TargetReset));
    assert!(rig.controller.motor().enables().is_empty());
}

// ── faults and timeouts ───────────────────────────────────────

#[test]
fn both_limits_is_a_wiring_fault() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);
    rig.controller.open(&mut rig.sink);
    rig.inputs.set_limits(LimitReading::new(true, true));

    assert_eq!(rig.switch(SwitchId::OpenLimit), Err(WiringFault::BothLimitsTriggered));
    assert_eq!(rig.controller.state(), OperationState::Idle);
    assert!(!rig.controller.motor().is_enabled_now());
}

#[test]
fn stuck_move_times_out() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Open);
    rig.controller.close(&mut rig.sink);

    assert!(!rig.controller.check_timeout(TIMEOUT_MS - 1, &mut rig.sink));
    assert!(rig.controller.check_timeout(TIMEOUT_MS, &mut rig.sink));

    assert_eq!(rig.controller.state(), OperationState::Idle);
    assert!(!rig.shared.pending().active);
    assert!(rig.sink.contains(&AppEvent::OperationTimedOut {
        during: OperationState::Closing,
        elapsed_ms: TIMEOUT_MS,
    }));
    assert_eq!(rig.notifications(), &[(MSG_TIMED_OUT.to_string(), Priority::High)]);

    // Already stopped: nothing more to do.
    assert!(!rig.controller.check_timeout(TIMEOUT_MS * 2, &mut rig.sink));
}

// ── boot sync ─────────────────────────────────────────────────

#[test]
fn unknown_target_closes_on_boot() {
    let mut rig = auto_rig(LimitReading::MID_TRAVEL, DoorTarget::Unknown);

    assert!(rig.controller.sync_to_target(&mut rig.sink).unwrap());

    assert_eq!(rig.controller.state(), OperationState::Closing);
    assert_eq!(rig.stored(), DoorTarget::Closed);
}

#[test]
fn unknown_target_at_close_limit_just_records_closed() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Unknown);

    assert!(!rig.controller.sync_to_target(&mut rig.sink).unwrap());

    assert_eq!(rig.stored(), DoorTarget::Closed);
    assert!(rig.controller.motor().calls.is_empty());
}

#[test]
fn wrong_side_on_boot_drives_to_target() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Open);

    assert!(rig.controller.sync_to_target(&mut rig.sink).unwrap());

    assert_eq!(rig.controller.motor().enables(), vec![Direction::Open]);
}

#[test]
fn at_target_on_boot_stays_put() {
    let mut rig = auto_rig(LimitReading::OPEN, DoorTarget::Open);

    assert!(!rig.controller.sync_to_target(&mut rig.sink).unwrap());

    assert!(rig.controller.motor().calls.is_empty());
}

#[test]
fn opened_notification_in_auto_mode() {
    let mut rig = auto_rig(LimitReading::CLOSED, DoorTarget::Closed);
    rig.controller.open(&mut rig.sink);
    rig.inputs.set_limits(LimitReading::OPEN);

    rig.switch(SwitchId::OpenLimit).unwrap();

    assert_eq!(rig.notifications(), &[(MSG_OPENED.to_string(), Priority::Normal)]);
    assert_eq!(rig.stored(), DoorTarget::Open);
}
