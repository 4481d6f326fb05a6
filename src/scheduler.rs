//! Sunrise / sunset scheduler and the clock loop step.
//!
//! The scheduler never touches the controller.  When an operation is due
//! it notifies a [`SchedulerDelegate`]; the main binary implements the
//! delegate by pushing [`Event::Scheduled`](crate::events::Event::Scheduled)
//! into the event queue, so a scheduled open is handled exactly like a
//! button press.
//!
//! ```text
//!  sun-time API ──▶ Scheduler (6 entries + offsets)
//!                        │ next_operation(now)
//!                        ▼
//!                   ClockLoop::tick ──▶ SchedulerDelegate ──▶ Event Queue
//!                        │
//!                        └─▶ ClockDecision (how long until the next one)
//! ```
//!
//! Ordering is purely by timestamp.  There is no open/close alternation
//! rule, so two operations of the same kind can follow each other when
//! the offsets push entries past one another.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate};
use embedded_hal::delay::DelayNs;
use heapless::Vec;
use log::{info, warn};

use crate::app::ports::{Clock, DueReason, InputPort, SchedulerDelegate, SunTimesError, SunTimesPort};
use crate::error::WiringFault;
use crate::fsm::context::SharedDoorState;
use crate::fsm::states::{check_limits, DoorPosition};

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// What the door should do at a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Close,
}

impl Operation {
    /// Limit the door should reach.
    pub fn destination(self) -> DoorPosition {
        match self {
            Self::Open => DoorPosition::Open,
            Self::Close => DoorPosition::Closed,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Open => Self::Close,
            Self::Close => Self::Open,
        }
    }
}

/// Sunrise and sunset for one day, Unix seconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: i64,
    pub sunset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayOffset {
    Yesterday,
    Today,
    Tomorrow,
}

impl DayOffset {
    pub const ALL: [DayOffset; 3] = [Self::Yesterday, Self::Today, Self::Tomorrow];

    pub fn name(self) -> &'static str {
        match self {
            Self::Yesterday => "yesterday",
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
        }
    }

    pub fn date_from(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Yesterday => today.checked_sub_days(Days::new(1)),
            Self::Today => Some(today),
            Self::Tomorrow => today.checked_add_days(Days::new(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

impl SunEvent {
    pub fn operation(self) -> Operation {
        match self {
            Self::Sunrise => Operation::Open,
            Self::Sunset => Operation::Close,
        }
    }
}

/// One offset-adjusted sun event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub day: DayOffset,
    pub kind: SunEvent,
    pub timestamp: i64,
}

impl ScheduleEntry {
    pub fn name(&self) -> &'static str {
        match (self.day, self.kind) {
            (DayOffset::Yesterday, SunEvent::Sunrise) => "yesterday_sunrise",
            (DayOffset::Yesterday, SunEvent::Sunset) => "yesterday_sunset",
            (DayOffset::Today, SunEvent::Sunrise) => "today_sunrise",
            (DayOffset::Today, SunEvent::Sunset) => "today_sunset",
            (DayOffset::Tomorrow, SunEvent::Sunrise) => "tomorrow_sunrise",
            (DayOffset::Tomorrow, SunEvent::Sunset) => "tomorrow_sunset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextOperation {
    pub operation: Operation,
    pub at: i64,
    pub entry: ScheduleEntry,
}

impl NextOperation {
    pub fn secs_until(&self, now: i64) -> i64 {
        self.at - now
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

const MAX_ENTRIES: usize = 6;

pub struct Scheduler {
    entries: Vec<ScheduleEntry, MAX_ENTRIES>,
    sunrise_offset: i64,
    sunset_offset: i64,
    next: Option<NextOperation>,
}

impl Scheduler {
    pub fn new(sunrise_offset: i64, sunset_offset: i64) -> Self {
        Self {
            entries: Vec::new(),
            sunrise_offset,
            sunset_offset,
            next: None,
        }
    }

    /// Build from already offset-adjusted entries (extra entries dropped).
    pub fn from_entries(entries: &[ScheduleEntry]) -> Self {
        let mut s = Self::new(0, 0);
        for e in entries.iter().take(MAX_ENTRIES) {
            // Capacity checked by `take`.
            let _ = s.entries.push(*e);
        }
        s
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn has_data(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Last result of [`recompute`](Self::recompute).
    pub fn next(&self) -> Option<NextOperation> {
        self.next
    }

    /// Query yesterday, today and tomorrow (relative to `now`, UTC) and
    /// replace the entries.  On any failure the old entries are kept.
    pub fn refresh(
        &mut self,
        source: &mut impl SunTimesPort,
        lat: f64,
        lng: f64,
        now: i64,
    ) -> Result<(), SunTimesError> {
        let today = DateTime::from_timestamp(now, 0)
            .map(|t| t.date_naive())
            .ok_or(SunTimesError::Malformed)?;
        let mut fresh: Vec<ScheduleEntry, MAX_ENTRIES> = Vec::new();
        for day in DayOffset::ALL {
            let date = day.date_from(today).ok_or(SunTimesError::Malformed)?;
            let times = source.sun_times(lat, lng, date)?;
            info!("SCHED | {} {} sunrise={} sunset={}", day.name(), date, times.sunrise, times.sunset);
            for (kind, ts, offset) in [
                (SunEvent::Sunrise, times.sunrise, self.sunrise_offset),
                (SunEvent::Sunset, times.sunset, self.sunset_offset),
            ] {
                let _ = fresh.push(ScheduleEntry { day, kind, timestamp: ts + offset });
            }
        }
        self.entries = fresh;
        Ok(())
    }

    /// Sort the entries together with `now`; the entry `skip` places
    /// after `now` is the next operation.  `now` sorts ahead of an entry
    /// with the same timestamp.
    pub fn next_operation(&self, now: i64, skip: usize) -> Option<NextOperation> {
        let mut sorted: Vec<ScheduleEntry, MAX_ENTRIES> = self.entries.clone();
        sorted.sort_unstable_by_key(|e| e.timestamp);
        let after_now = sorted.iter().position(|e| e.timestamp >= now)?;
        let entry = *sorted.get(after_now + skip)?;
        Some(NextOperation {
            operation: entry.kind.operation(),
            at: entry.timestamp,
            entry,
        })
    }

    pub fn recompute(&mut self, now: i64, skip: usize) -> Option<NextOperation> {
        self.next = self.next_operation(now, skip);
        match &self.next {
            Some(n) => info!(
                "SCHED | next {:?} at {} ({}), in {}",
                n.operation,
                n.at,
                n.entry.name(),
                format_hms(n.secs_until(now))
            ),
            None => warn!("SCHED | no entry after {}", now),
        }
        self.next
    }
}

// ═══════════════════════════════════════════════════════════════
//  Clock loop
// ═══════════════════════════════════════════════════════════════

/// Outcome of one clock loop step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDecision {
    /// No sun times yet.
    WaitingForData,
    /// `due` had passed.  `next` is the one after it.
    Executed { due: NextOperation, next: Option<NextOperation> },
    /// The door was on the wrong side for the waiting period.
    Corrected { operation: Operation, next: NextOperation },
    /// Nothing to do before `next`.
    OnSchedule { next: NextOperation },
}

impl ClockDecision {
    pub fn next(&self) -> Option<NextOperation> {
        match *self {
            Self::WaitingForData => None,
            Self::Executed { next, .. } => next,
            Self::Corrected { next, .. } | Self::OnSchedule { next } => Some(next),
        }
    }

    /// Seconds worth sleeping until the next operation, or `None` when it
    /// is closer than `min_sleep_secs` (or unknown).
    pub fn sleep_secs(&self, now: i64, min_sleep_secs: u32) -> Option<u64> {
        let secs = self.next()?.secs_until(now);
        (secs >= i64::from(min_sleep_secs)).then_some(secs as u64)
    }
}

pub struct ClockLoop<T, I> {
    scheduler: Scheduler,
    source: T,
    inputs: I,
    shared: Arc<SharedDoorState>,
    lat: f64,
    lng: f64,
}

impl<T: SunTimesPort, I: InputPort> ClockLoop<T, I> {
    pub fn new(scheduler: Scheduler, source: T, inputs: I, shared: Arc<SharedDoorState>, lat: f64, lng: f64) -> Self {
        Self {
            scheduler,
            source,
            inputs,
            shared,
            lat,
            lng,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Fetch sun times and pick the first operation.
    pub fn prime(&mut self, now: i64) -> Result<Option<NextOperation>, SunTimesError> {
        self.scheduler.refresh(&mut self.source, self.lat, self.lng, now)?;
        Ok(self.scheduler.recompute(now, 0))
    }

    /// One pass of the clock loop at wall time `now`.
    pub fn tick(&mut self, now: i64, delegate: &mut impl SchedulerDelegate) -> Result<ClockDecision, WiringFault> {
        let next = match self.scheduler.next() {
            Some(next) => next,
            // Entries ran out after a failed refresh; fetch again.
            None if self.scheduler.has_data() => match self.prime(now) {
                Ok(Some(next)) => next,
                Ok(None) => return Ok(ClockDecision::WaitingForData),
                Err(e) => {
                    warn!("SCHED | refetch failed ({}), still waiting", e);
                    return Ok(ClockDecision::WaitingForData);
                }
            },
            None => return Ok(ClockDecision::WaitingForData),
        };
        let status = check_limits(self.shared.target(), self.inputs.limits())?;

        if now > next.at {
            if status.actual != next.operation.destination() {
                info!("SCHED | {} passed, {:?} due", next.entry.name(), next.operation);
                delegate.on_operation_due(next.operation, DueReason::Scheduled);
            }
            // A new day may have started; keep yesterday's data on failure.
            if let Err(e) = self.scheduler.refresh(&mut self.source, self.lat, self.lng, now) {
                warn!("SCHED | refresh failed ({}), reusing entries", e);
            }
            let following = self.scheduler.recompute(now, 0);
            return Ok(ClockDecision::Executed { due: next, next: following });
        }

        // Waiting for `next`: the door should be at the opposite limit.
        let expected = next.operation.opposite().destination();
        if status.actual != expected {
            let operation = next.operation.opposite();
            info!("SCHED | door {:?} while waiting for {:?}, correcting", status.actual, next.operation);
            delegate.on_operation_due(operation, DueReason::Correction);
            return Ok(ClockDecision::Corrected { operation, next });
        }
        info!("SCHED | {} until {:?}", format_hms(next.secs_until(now)), next.operation);
        Ok(ClockDecision::OnSchedule { next })
    }
}

/// Block until the controller has handled at least one event since
/// `handled_before` and the motor is off, or `timeout_ms` passes.
/// Returns `true` when the door settled.
pub fn wait_for_idle(
    shared: &SharedDoorState,
    clock: &impl Clock,
    delay: &mut impl DelayNs,
    handled_before: u32,
    timeout_ms: u32,
) -> bool {
    const POLL_MS: u32 = 250;
    let start = clock.now_ms();
    loop {
        if shared.handled() != handled_before && shared.is_idle() {
            return true;
        }
        if clock.now_ms().wrapping_sub(start) >= timeout_ms {
            warn!("SCHED | door still busy after {} ms", timeout_ms);
            return false;
        }
        delay.delay_ms(POLL_MS);
    }
}

/// `HH:MM:SS`; negative durations print as zero.
pub fn format_hms(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
