//! Mock hardware adapters for integration tests.
//!
//! Every port the door core talks to has a recording or scripted twin
//! here, so tests can assert on the full command history without
//! touching GPIO, NVS or the network.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use chrono::NaiveDate;
use embedded_hal::delay::DelayNs;

use coopdoor::adapters::target_store::TargetStore;
use coopdoor::app::events::AppEvent;
use coopdoor::app::service::CoopService;
use coopdoor::app::ports::{
    Clock, DueReason, EventSink, InputPort, NotificationSink, NotifyTransport, Priority, SchedulerDelegate,
    StorageError, StoragePort, SunTimesError, SunTimesPort, TransportError,
};
use coopdoor::drivers::motor::{Direction, MotorDrive};
use coopdoor::drivers::switches::{SwitchEvent, SwitchId};
use coopdoor::fsm::context::SharedDoorState;
use coopdoor::fsm::controller::{DoorController, DoorPolicy};
use coopdoor::fsm::states::{DoorTarget, LimitReading, OperatingMode};
use coopdoor::scheduler::{Operation, SunTimes};

// ── Motor ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCall {
    Enable(Direction),
    Disable,
    Pause(u32),
}

/// Records calls and keeps the pending bookkeeping a real motor does.
pub struct MockMotor {
    pub calls: Vec<MotorCall>,
    enabled: bool,
    direction: Option<Direction>,
    shared: Arc<SharedDoorState>,
    /// Timestamp handed to `begin_pending`.
    pub now_ms: u32,
}

impl MockMotor {
    pub fn new(shared: Arc<SharedDoorState>) -> Self {
        Self {
            calls: Vec::new(),
            enabled: false,
            direction: None,
            shared,
            now_ms: 0,
        }
    }

    pub fn is_enabled_now(&self) -> bool {
        self.enabled
    }

    pub fn enables(&self) -> Vec<Direction> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MotorCall::Enable(d) => Some(*d),
                _ => None,
            })
            .collect()
    }
}

impl MotorDrive for MockMotor {
    fn enable(&mut self, direction: Direction) {
        self.calls.push(MotorCall::Enable(direction));
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.direction = Some(direction);
        self.shared.begin_pending(self.now_ms);
    }

    fn disable(&mut self) {
        self.calls.push(MotorCall::Disable);
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
        self.calls.push(MotorCall::Pause(ms));
    }
}

// ── Inputs ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct InputState {
    pub limits: LimitReading,
    /// Consumed one read at a time before `obstruction` is used.
    pub obstruction_script: VecDeque<bool>,
    pub obstruction: bool,
    pub buttons: (bool, bool),
    pub mode: OperatingMode,
}

/// Cloneable handle: the controller owns one copy, the test keeps another
/// to move the door between reads.
#[derive(Clone)]
pub struct ScriptedInputs(Rc<RefCell<InputState>>);

impl ScriptedInputs {
    pub fn new(limits: LimitReading, mode: OperatingMode) -> Self {
        Self(Rc::new(RefCell::new(InputState {
            limits,
            obstruction_script: VecDeque::new(),
            obstruction: false,
            buttons: (false, false),
            mode,
        })))
    }

    pub fn set_limits(&self, limits: LimitReading) {
        self.0.borrow_mut().limits = limits;
    }

    pub fn set_obstruction(&self, tripped: bool) {
        self.0.borrow_mut().obstruction = tripped;
    }

    pub fn script_obstruction(&self, reads: &[bool]) {
        self.0.borrow_mut().obstruction_script.extend(reads.iter().copied());
    }

    pub fn set_buttons(&self, open: bool, close: bool) {
        self.0.borrow_mut().buttons = (open, close);
    }
}

impl InputPort for ScriptedInputs {
    fn limits(&mut self) -> LimitReading {
        self.0.borrow().limits
    }

    fn obstruction_triggered(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        match s.obstruction_script.pop_front() {
            Some(v) => v,
            None => s.obstruction,
        }
    }

    fn buttons_held(&mut self) -> (bool, bool) {
        self.0.borrow().buttons
    }

    fn mode(&mut self) -> OperatingMode {
        self.0.borrow().mode
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MemStorage {
    store: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(target: DoorTarget) -> Self {
        let mut s = Self::new();
        if let Some(text) = target.as_str() {
            s.store.insert("coop::target".into(), text.as_bytes().to_vec());
        }
        s
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.store.get(&format!("{}::{}", namespace, key)).map(Vec::as_slice)
    }
}

impl StoragePort for MemStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{}::{}", namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Vec<(String, Priority)>,
}

impl NotificationSink for RecordingNotifier {
    fn notify(&mut self, message: &str, priority: Priority) {
        self.sent.push((message.to_string(), priority));
    }
}

/// Fails the first `failures` posts, then succeeds.
pub struct FlakyTransport {
    pub failures: u32,
    pub posts: Vec<String>,
}

impl FlakyTransport {
    pub fn new(failures: u32) -> Self {
        Self { failures, posts: Vec::new() }
    }
}

impl NotifyTransport for FlakyTransport {
    fn post(&mut self, _token: &str, _user: &str, message: &str, _priority: Priority) -> Result<(), TransportError> {
        self.posts.push(message.to_string());
        if self.failures > 0 {
            self.failures -= 1;
            return Err(TransportError::Status(500));
        }
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Time ──────────────────────────────────────────────────────

/// Simulated time shared by [`SimClock`] and [`SimDelay`]: delays
/// advance the clock.
#[derive(Clone, Default)]
pub struct SimTime {
    ms: Rc<Cell<u32>>,
    unix: Rc<Cell<Option<i64>>>,
}

impl SimTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u32) {
        self.ms.set(self.ms.get().wrapping_add(ms));
    }

    pub fn clock_ms(&self) -> u32 {
        self.ms.get()
    }

    pub fn set_unix(&self, secs: Option<i64>) {
        self.unix.set(secs);
    }

    pub fn clock(&self) -> SimClock {
        SimClock(self.clone())
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay { time: self.clone(), total_ms: 0 }
    }
}

pub struct SimClock(SimTime);

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        self.0.ms.get()
    }

    fn unix_time(&self) -> Option<i64> {
        self.0.unix.get()
    }
}

pub struct SimDelay {
    time: SimTime,
    pub total_ms: u64,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        let ms = ns / 1_000_000;
        self.total_ms += u64::from(ms);
        self.time.advance(ms);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
        self.time.advance(ms);
    }
}

// ── Sun times ─────────────────────────────────────────────────

/// Serves fixed sun times per date.  Unknown dates are `Unreachable`.
#[derive(Default)]
pub struct FakeSunTimes {
    days: HashMap<NaiveDate, SunTimes>,
    /// Shared so a test can cut the network after handing the source over.
    pub fail: Rc<Cell<bool>>,
}

impl FakeSunTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(mut self, date: NaiveDate, sunrise: i64, sunset: i64) -> Self {
        self.days.insert(date, SunTimes { sunrise, sunset });
        self
    }
}

impl SunTimesPort for FakeSunTimes {
    fn sun_times(&mut self, _lat: f64, _lng: f64, date: NaiveDate) -> Result<SunTimes, SunTimesError> {
        if self.fail.get() {
            return Err(SunTimesError::Unreachable);
        }
        self.days.get(&date).copied().ok_or(SunTimesError::Unreachable)
    }
}

// ── Scheduler delegate ────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDelegate {
    pub due: Vec<(Operation, DueReason)>,
}

impl SchedulerDelegate for RecordingDelegate {
    fn on_operation_due(&mut self, operation: Operation, reason: DueReason) {
        self.due.push((operation, reason));
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type MockController = DoorController<MockMotor, ScriptedInputs, MemStorage, RecordingNotifier>;
pub type MockService = CoopService<MockMotor, ScriptedInputs, MemStorage, RecordingNotifier>;

pub const RETRIES: u8 = 2;
pub const BACKOFF_MS: u32 = 3_000;
pub const TIMEOUT_MS: u32 = 30_000;

pub fn policy(mode: OperatingMode) -> DoorPolicy {
    DoorPolicy {
        mode,
        max_obstruction_retries: RETRIES,
        backoff_ms: BACKOFF_MS,
        operation_timeout_ms: TIMEOUT_MS,
    }
}

/// A controller wired to mocks, plus the handles a test needs to drive it.
pub struct Rig {
    pub controller: MockController,
    pub inputs: ScriptedInputs,
    pub shared: Arc<SharedDoorState>,
    pub sink: RecordingSink,
}

impl Rig {
    pub fn new(mode: OperatingMode, limits: LimitReading, stored: DoorTarget) -> Self {
        Self::with_storage(mode, limits, MemStorage::with_target(stored))
    }

    pub fn with_storage(mode: OperatingMode, limits: LimitReading, storage: MemStorage) -> Self {
        let shared = Arc::new(SharedDoorState::new());
        let inputs = ScriptedInputs::new(limits, mode);
        let controller = DoorController::new(
            MockMotor::new(shared.clone()),
            inputs.clone(),
            TargetStore::new(storage),
            RecordingNotifier::default(),
            shared.clone(),
            policy(mode),
        );
        Self {
            controller,
            inputs,
            shared,
            sink: RecordingSink::new(),
        }
    }

    pub fn switch(&mut self, switch: SwitchId) -> Result<(), coopdoor::error::WiringFault> {
        self.controller
            .handle_switch(SwitchEvent { switch, at_ms: 0 }, &mut self.sink)
    }

    pub fn stored(&self) -> DoorTarget {
        TargetStore::new(RefStorage(self.controller_storage())).read()
    }

    fn controller_storage(&self) -> &MemStorage {
        self.controller.store().storage()
    }

    pub fn notifications(&self) -> &[(String, Priority)] {
        &self.controller.notifier().sent
    }
}

/// Read-only view so a second `TargetStore` can decode the stored bytes.
struct RefStorage<'a>(&'a MemStorage);

impl StoragePort for RefStorage<'_> {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.0.read(namespace, key, buf)
    }

    fn write(&mut self, _: &str, _: &str, _: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::IoError)
    }

    fn delete(&mut self, _: &str, _: &str) -> Result<(), StorageError> {
        Err(StorageError::IoError)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.0.exists(namespace, key)
    }
}
