//! Power manager against the host sleep adapter.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;

use crate::mock_hw::{RecordingSink, SimDelay, SimTime};

use coopdoor::adapters::sleep::EspSleepAdapter;
use coopdoor::app::events::AppEvent;
use coopdoor::app::ports::{NotificationSink, Priority, WakeCause};
use coopdoor::fsm::context::SharedDoorState;
use coopdoor::fsm::states::OperationState;
use coopdoor::notifier::{NotificationQueue, QueuedNotifier};
use coopdoor::power::{PowerManager, SleepOutcome, WakeReason};

const GRACE_SECS: u32 = 30;
const NOTIFY_DEADLINE_MS: u32 = 125_000;

fn manager(cause: WakeCause) -> (PowerManager<'static, EspSleepAdapter, SimDelay>, Arc<SharedDoorState>, SimTime) {
    let shared = Arc::new(SharedDoorState::new());
    let time = SimTime::new();
    let pm = PowerManager::new(EspSleepAdapter::with_cause(cause), time.delay(), shared.clone(), GRACE_SECS);
    (pm, shared, time)
}

#[test]
fn idle_door_sleeps_after_grace() {
    let (mut pm, _shared, time) = manager(WakeCause::Timer);
    let mut sink = RecordingSink::new();

    assert_eq!(pm.maybe_sleep(Some(600), &mut sink), SleepOutcome::Slept);

    assert_eq!(pm.port().sleeps, vec![Some(600_000)]);
    assert_eq!(pm.port().armed, 1);
    assert_eq!(time.clock_ms(), GRACE_SECS * 1_000);
    assert!(sink.contains(&AppEvent::Sleeping { duration_ms: Some(600_000) }));
}

#[test]
fn busy_door_defers_sleep() {
    let (mut pm, shared, _time) = manager(WakeCause::PowerOn);
    shared.set_operation(OperationState::Opening);
    let mut sink = RecordingSink::new();

    assert_eq!(pm.maybe_sleep(Some(600), &mut sink), SleepOutcome::Deferred);

    assert!(pm.port().sleeps.is_empty());
    assert!(sink.contains(&AppEvent::SleepDeferred));
}

#[test]
fn pending_motor_defers_sleep() {
    let (mut pm, shared, _time) = manager(WakeCause::PowerOn);
    shared.begin_pending(0);
    let mut sink = RecordingSink::new();

    assert_eq!(pm.maybe_sleep(None, &mut sink), SleepOutcome::Deferred);
}

#[test]
fn button_only_sleep_skips_grace() {
    let (mut pm, _shared, time) = manager(WakeCause::Ext0);
    let mut sink = RecordingSink::new();

    pm.maybe_sleep(None, &mut sink);

    assert_eq!(pm.port().sleeps, vec![None]);
    assert_eq!(pm.port().armed, 1);
    assert_eq!(time.clock_ms(), 0);
}

#[test]
fn halt_arms_nothing() {
    let (mut pm, _shared, _time) = manager(WakeCause::PowerOn);

    pm.halt();

    assert_eq!(pm.port().sleeps, vec![None]);
    assert_eq!(pm.port().armed, 0);
}

#[test]
fn restart_goes_through_port() {
    let (mut pm, _shared, _time) = manager(WakeCause::PowerOn);

    pm.restart();

    assert_eq!(pm.port().restarts, 1);
}

#[test]
fn wake_causes_map_to_buttons() {
    assert_eq!(manager(WakeCause::Ext0).0.wake_reason(), WakeReason::ManualOpen);
    assert_eq!(manager(WakeCause::Ext1).0.wake_reason(), WakeReason::ManualClose);
    assert_eq!(manager(WakeCause::Timer).0.wake_reason(), WakeReason::Timer);
    assert_eq!(manager(WakeCause::Other(7)).0.wake_reason(), WakeReason::Other);
}

// ── Pending notifications ─────────────────────────────────────

/// Stands in for the notifier thread: after `polls` short waits the
/// outstanding requests are delivered.
struct DeliverAfter<'q> {
    inner: SimDelay,
    queue: &'q NotificationQueue,
    polls: u32,
}

impl DelayNs for DeliverAfter<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.inner.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.inner.delay_ms(ms);
        if ms < GRACE_SECS * 1_000 {
            self.polls = self.polls.saturating_sub(1);
            if self.polls == 0 {
                while self.queue.pop().is_some() {
                    self.queue.finish();
                }
            }
        }
    }
}

fn queue_alert(queue: &NotificationQueue) {
    QueuedNotifier::new(queue, "tok", "usr", 5).notify("Check the door!", Priority::High);
}

#[test]
fn sleep_waits_for_alert_in_delivery() {
    let queue = NotificationQueue::new();
    queue_alert(&queue);
    let shared = Arc::new(SharedDoorState::new());
    let time = SimTime::new();
    let delay = DeliverAfter { inner: time.delay(), queue: &queue, polls: 4 };
    let mut pm = PowerManager::new(EspSleepAdapter::with_cause(WakeCause::Timer), delay, shared, GRACE_SECS)
        .with_notifications(&queue, NOTIFY_DEADLINE_MS);
    let mut sink = RecordingSink::new();

    assert_eq!(pm.maybe_sleep(Some(600), &mut sink), SleepOutcome::Slept);

    assert_eq!(queue.outstanding(), 0);
    assert!(time.clock_ms() > GRACE_SECS * 1_000);
    assert!(time.clock_ms() < GRACE_SECS * 1_000 + NOTIFY_DEADLINE_MS);
    assert_eq!(pm.port().sleeps, vec![Some(600_000)]);
}

#[test]
fn stuck_alert_delays_sleep_only_up_to_deadline() {
    let queue = NotificationQueue::new();
    queue_alert(&queue);
    let (pm, _shared, time) = manager(WakeCause::Timer);
    let mut pm = pm.with_notifications(&queue, 2_000);
    let mut sink = RecordingSink::new();

    assert_eq!(pm.maybe_sleep(Some(600), &mut sink), SleepOutcome::Slept);

    assert_eq!(queue.outstanding(), 1);
    assert_eq!(time.clock_ms(), GRACE_SECS * 1_000 + 2_000);
}

#[test]
fn nothing_outstanding_adds_no_wait() {
    let queue = NotificationQueue::new();
    let (pm, _shared, time) = manager(WakeCause::Timer);
    let mut pm = pm.with_notifications(&queue, NOTIFY_DEADLINE_MS);
    let mut sink = RecordingSink::new();

    pm.maybe_sleep(Some(600), &mut sink);

    assert_eq!(time.clock_ms(), GRACE_SECS * 1_000);
}
