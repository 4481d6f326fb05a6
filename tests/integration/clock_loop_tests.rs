//! Clock loop: sun-time refresh, due operations, corrections and the
//! wait for the controller to settle.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::mock_hw::{FakeSunTimes, RecordingDelegate, Rig, ScriptedInputs, SimTime};

use coopdoor::app::ports::DueReason;
use coopdoor::drivers::switches::SwitchId;
use coopdoor::error::WiringFault;
use coopdoor::fsm::context::SharedDoorState;
use coopdoor::fsm::states::{DoorTarget, LimitReading, OperatingMode, OperationState};
use coopdoor::scheduler::{ClockDecision, ClockLoop, Operation, Scheduler, wait_for_idle};

const MIDNIGHT_20: i64 = 1_718_841_600; // 2024-06-20T00:00:00Z
const DAY: i64 = 86_400;
const SUNRISE: i64 = 5 * 3_600;
const SUNSET: i64 = 21 * 3_600;
const SUNSET_OFFSET: i64 = 1_800;

fn midnight(day: u32) -> i64 {
    MIDNIGHT_20 + i64::from(day - 20) * DAY
}

fn source() -> FakeSunTimes {
    let mut src = FakeSunTimes::new();
    for day in 20..=23 {
        let date = NaiveDate::from_ymd_opt(2024, 6, day).unwrap();
        src = src.with_day(date, midnight(day) + SUNRISE, midnight(day) + SUNSET);
    }
    src
}

struct Loop {
    clock_loop: ClockLoop<FakeSunTimes, ScriptedInputs>,
    inputs: ScriptedInputs,
    shared: Arc<SharedDoorState>,
}

fn rig(src: FakeSunTimes, limits: LimitReading, target: DoorTarget) -> Loop {
    let shared = Arc::new(SharedDoorState::new());
    shared.set_target(target);
    let inputs = ScriptedInputs::new(limits, OperatingMode::Auto);
    let clock_loop = ClockLoop::new(
        Scheduler::new(0, SUNSET_OFFSET),
        src,
        inputs.clone(),
        shared.clone(),
        51.5,
        -0.12,
    );
    Loop { clock_loop, inputs, shared }
}

#[test]
fn prime_picks_offset_sunset_at_noon() {
    let mut l = rig(source(), LimitReading::OPEN, DoorTarget::Open);
    let noon = midnight(21) + 12 * 3_600;

    let next = l.clock_loop.prime(noon).unwrap().unwrap();

    assert_eq!(next.operation, Operation::Close);
    assert_eq!(next.at, midnight(21) + SUNSET + SUNSET_OFFSET);
    assert_eq!(next.entry.name(), "today_sunset");
    assert_eq!(l.clock_loop.scheduler().entries().len(), 6);
}

#[test]
fn no_data_waits() {
    let mut l = rig(source(), LimitReading::OPEN, DoorTarget::Open);
    let mut d = RecordingDelegate::default();

    assert_eq!(l.clock_loop.tick(midnight(21), &mut d), Ok(ClockDecision::WaitingForData));
    assert!(d.due.is_empty());
}

#[test]
fn prime_fails_when_a_day_is_missing() {
    let src = FakeSunTimes::new().with_day(NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(), 1, 2);
    let mut l = rig(src, LimitReading::OPEN, DoorTarget::Open);

    assert!(l.clock_loop.prime(midnight(21) + 60).is_err());
    assert!(!l.clock_loop.scheduler().has_data());
}

#[test]
fn door_on_expected_side_stays_on_schedule() {
    let mut l = rig(source(), LimitReading::OPEN, DoorTarget::Open);
    let noon = midnight(21) + 12 * 3_600;
    l.clock_loop.prime(noon).unwrap();
    let mut d = RecordingDelegate::default();

    let decision = l.clock_loop.tick(noon, &mut d).unwrap();

    assert!(matches!(decision, ClockDecision::OnSchedule { .. }));
    assert!(d.due.is_empty());
}

#[test]
fn closed_door_before_sunset_is_corrected_open() {
    let mut l = rig(source(), LimitReading::CLOSED, DoorTarget::Closed);
    let noon = midnight(21) + 12 * 3_600;
    l.clock_loop.prime(noon).unwrap();
    let mut d = RecordingDelegate::default();

    let decision = l.clock_loop.tick(noon, &mut d).unwrap();

    assert!(matches!(decision, ClockDecision::Corrected { operation: Operation::Open, .. }));
    assert_eq!(d.due, vec![(Operation::Open, DueReason::Correction)]);
}

#[test]
fn passed_sunset_requests_close_and_moves_on() {
    let mut l = rig(source(), LimitReading::OPEN, DoorTarget::Open);
    let close_at = midnight(21) + SUNSET + SUNSET_OFFSET;
    l.clock_loop.prime(close_at - 60).unwrap();
    let mut d = RecordingDelegate::default();

    let decision = l.clock_loop.tick(close_at + 1, &mut d).unwrap();

    assert_eq!(d.due, vec![(Operation::Close, DueReason::Scheduled)]);
    let ClockDecision::Executed { due, next } = decision else {
        panic!("expected Executed, got {:?}", decision);
    };
    assert_eq!(due.at, close_at);
    let next = next.unwrap();
    assert_eq!(next.operation, Operation::Open);
    assert_eq!(next.at, midnight(22) + SUNRISE);
}

#[test]
fn passed_operation_already_done_is_skipped() {
    let mut l = rig(source(), LimitReading::CLOSED, DoorTarget::Closed);
    let close_at = midnight(21) + SUNSET + SUNSET_OFFSET;
    l.clock_loop.prime(close_at - 60).unwrap();
    let mut d = RecordingDelegate::default();

    let decision = l.clock_loop.tick(close_at + 1, &mut d).unwrap();

    assert!(d.due.is_empty());
    assert!(matches!(decision, ClockDecision::Executed { .. }));
}

#[test]
fn refresh_failure_keeps_old_entries() {
    let src = source();
    let network_down = src.fail.clone();
    let mut l = rig(src, LimitReading::OPEN, DoorTarget::Open);
    let close_at = midnight(21) + SUNSET + SUNSET_OFFSET;
    l.clock_loop.prime(close_at - 60).unwrap();
    network_down.set(true);
    let mut d = RecordingDelegate::default();

    let decision = l.clock_loop.tick(close_at + 1, &mut d).unwrap();

    assert_eq!(decision.next().map(|n| n.operation), Some(Operation::Open));
    assert_eq!(l.clock_loop.scheduler().entries().len(), 6);
}

#[test]
fn exhausted_entries_are_fetched_again() {
    let june_24 = NaiveDate::from_ymd_opt(2024, 6, 24).unwrap();
    let src = source().with_day(june_24, midnight(24) + SUNRISE, midnight(24) + SUNSET);
    let network_down = src.fail.clone();
    let mut l = rig(src, LimitReading::OPEN, DoorTarget::Open);
    l.clock_loop.prime(midnight(21) + 12 * 3_600).unwrap();
    network_down.set(true);
    let mut d = RecordingDelegate::default();

    // Past the last entry with no fresh data: nothing left to schedule.
    let late = midnight(23) + 3_600;
    let decision = l.clock_loop.tick(late, &mut d).unwrap();
    assert!(matches!(decision, ClockDecision::Executed { next: None, .. }));
    assert_eq!(l.clock_loop.tick(late + 60, &mut d), Ok(ClockDecision::WaitingForData));

    network_down.set(false);
    let decision = l.clock_loop.tick(late + 120, &mut d).unwrap();
    let next = decision.next().unwrap();
    assert_eq!(next.operation, Operation::Open);
    assert_eq!(next.at, midnight(23) + SUNRISE);
}

#[test]
fn reset_mid_close_keeps_the_door_correctable() {
    let mut door = Rig::new(OperatingMode::Auto, LimitReading::OPEN, DoorTarget::Open);
    door.controller.close(&mut door.sink);
    door.inputs.set_limits(LimitReading::MID_TRAVEL);
    door.inputs.set_buttons(true, true);
    door.switch(SwitchId::ManualClose).unwrap();
    assert_eq!(door.stored(), DoorTarget::Unknown);

    let mut clock_loop = ClockLoop::new(
        Scheduler::new(0, SUNSET_OFFSET),
        source(),
        door.inputs.clone(),
        door.shared.clone(),
        51.5,
        -0.12,
    );
    let night = midnight(21) + 22 * 3_600;
    clock_loop.prime(night).unwrap();
    let mut d = RecordingDelegate::default();

    let decision = clock_loop.tick(night, &mut d).unwrap();

    assert!(matches!(decision, ClockDecision::Corrected { operation: Operation::Close, .. }));
    assert_eq!(d.due, vec![(Operation::Close, DueReason::Correction)]);
}

#[test]
fn both_limits_is_reported() {
    let mut l = rig(source(), LimitReading::OPEN, DoorTarget::Open);
    l.clock_loop.prime(midnight(21) + 60).unwrap();
    l.inputs.set_limits(LimitReading::new(true, true));
    let mut d = RecordingDelegate::default();

    assert_eq!(
        l.clock_loop.tick(midnight(21) + 120, &mut d),
        Err(WiringFault::BothLimitsTriggered)
    );
}

#[test]
fn sleep_covers_time_to_next_operation() {
    let mut l = rig(source(), LimitReading::OPEN, DoorTarget::Open);
    let noon = midnight(21) + 12 * 3_600;
    l.clock_loop.prime(noon).unwrap();
    let mut d = RecordingDelegate::default();

    let decision = l.clock_loop.tick(noon, &mut d).unwrap();
    let expected = (SUNSET + SUNSET_OFFSET - 12 * 3_600) as u64;

    assert_eq!(decision.sleep_secs(noon, 60), Some(expected));
    assert_eq!(decision.sleep_secs(noon, expected as u32 + 1), None);
}

// ── wait_for_idle ─────────────────────────────────────────────

#[test]
fn settled_door_returns_immediately() {
    let shared = SharedDoorState::new();
    let time = SimTime::new();
    let mut delay = time.delay();
    let before = shared.handled();
    shared.mark_handled();

    assert!(wait_for_idle(&shared, &time.clock(), &mut delay, before, 5_000));
    assert_eq!(delay.total_ms, 0);
}

#[test]
fn unhandled_event_waits_until_timeout() {
    let shared = SharedDoorState::new();
    let time = SimTime::new();
    let mut delay = time.delay();

    assert!(!wait_for_idle(&shared, &time.clock(), &mut delay, shared.handled(), 5_000));
    assert!(delay.total_ms >= 5_000);
}

#[test]
fn moving_door_is_not_settled() {
    let shared = SharedDoorState::new();
    let before = shared.handled();
    shared.mark_handled();
    shared.set_operation(OperationState::Closing);
    let time = SimTime::new();
    let mut delay = time.delay();

    assert!(!wait_for_idle(&shared, &time.clock(), &mut delay, before, 1_000));
}
