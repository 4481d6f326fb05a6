//! Coop door firmware: main entry point.
//!
//! Hexagonal architecture with an interrupt-fed event queue.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspInputs       EspMotorLines   NvsAdapter    Esp32Time       │
//! │  (InputPort)     (MotorLines)    (Config+NVS)  (Clock)         │
//! │  SunApiClient    PushoverTransport   EspSleepAdapter           │
//! │  (SunTimesPort)  (NotifyTransport)   (PowerPort)               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        CoopService ─▶ DoorController (pure logic)      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ClockLoop (auto mode) · PowerManager · Notifier thread        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Threads: the main task owns the controller and is the only consumer of
//! the event queue.  The clock thread (auto mode) feeds it scheduled
//! operations and puts the board to sleep; the notifier thread talks to
//! Pushover; the heartbeat thread blinks the LEDs.
#![deny(unused_must_use)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use coopdoor::adapters::hardware::{EspInputs, EspMotorLines};
use coopdoor::adapters::log_sink::LogEventSink;
use coopdoor::adapters::nvs::NvsAdapter;
use coopdoor::adapters::pushover::{self, PushoverTransport};
use coopdoor::adapters::sleep::EspSleepAdapter;
use coopdoor::adapters::sun_api::SunApiClient;
use coopdoor::adapters::target_store::TargetStore;
use coopdoor::adapters::time::Esp32TimeAdapter;
use coopdoor::adapters::wifi::WifiStation;
use coopdoor::app::events::AppEvent;
use coopdoor::app::ports::{Clock, ConfigPort, DueReason, EventSink, InputPort, PowerPort, SchedulerDelegate};
use coopdoor::app::service::{CoopService, LoopControl};
use coopdoor::config::CoopConfig;
use coopdoor::drivers::heartbeat::Heartbeat;
use coopdoor::drivers::hw_init;
use coopdoor::drivers::motor::Motor;
use coopdoor::drivers::switches::{SwitchEvent, SwitchId};
use coopdoor::drivers::task_pin::{Core, spawn_on_core};
use coopdoor::drivers::watchdog::Watchdog;
use coopdoor::error::Error;
use coopdoor::events::{EVENTS, Event, push_event};
use coopdoor::fsm::context::SharedDoorState;
use coopdoor::fsm::controller::{DoorController, DoorPolicy};
use coopdoor::fsm::states::OperatingMode;
use coopdoor::notifier::{LogOnlyNotifier, ModeNotifier, NOTIFICATIONS, Notifier, QueuedNotifier};
use coopdoor::power::{PowerManager, WakeReason};
use coopdoor::scheduler::{ClockDecision, ClockLoop, Operation, Scheduler, format_hms, wait_for_idle};

/// Main-loop poll period.
const LOOP_POLL_MS: u32 = 20;
/// Clock-loop period.
const CLOCK_TICK_MS: u32 = 60_000;
/// Retry period for Wi-Fi and sun-time lookups.
const NETWORK_RETRY_MS: u32 = 60_000;

// ── Scheduler delegate ────────────────────────────────────────
//
// Bridges the clock loop (which knows nothing about the event system) to
// the event queue.  The controller only ever runs on the main task.

struct QueueDelegate {
    sink: LogEventSink,
    fired: bool,
}

impl SchedulerDelegate for QueueDelegate {
    fn on_operation_due(&mut self, operation: Operation, reason: DueReason) {
        self.sink.emit(&AppEvent::OperationDue {
            operation,
            correction: reason == DueReason::Correction,
        });
        if push_event(Event::Scheduled(operation)) {
            self.fired = true;
        } else {
            warn!("SCHED | event queue full, {:?} dropped", operation);
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Coop door v{}", env!("CARGO_PKG_VERSION"));

    let mut sleeper = EspSleepAdapter::new();
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}, halting", e);
        sleeper.deep_sleep(None);
        return Err(e.into());
    }

    let shared = Arc::new(SharedDoorState::new());
    let clock = Esp32TimeAdapter::new();

    // ── 2. Config ─────────────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(Error::Config)?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config unusable ({}), halting until reset", e);
            sleeper.deep_sleep(None);
            return Err(Error::Config(e).into());
        }
    };

    // ── 3. Mode, wake reason, heartbeat ───────────────────────
    let mut inputs = EspInputs::new();
    let mode = inputs.mode();
    let wake = WakeReason::from(sleeper.wake_cause());
    info!("Boot: {:?} in {:?} mode", wake, mode);

    let booting = Arc::new(AtomicBool::new(true));
    let heartbeat = Heartbeat::new(
        shared.clone(),
        booting.clone(),
        config.tuning.blink_active_ms,
        config.tuning.blink_idle_ms,
    );
    spawn_on_core(Core::App, 2, 4, "heartbeat\0", move || heartbeat.run())?;

    // ── 4. Door target (reset if both buttons held) ───────────
    let mut store = TargetStore::new(nvs);
    if inputs.buttons_held() == (true, true) {
        warn!("Both buttons held at boot, clearing stored target");
        if let Err(e) = store.clear() {
            error!("Target clear failed: {}", e);
        }
    }

    // ── 5. Controller ─────────────────────────────────────────
    let kind = config.tuning.motor_kind;
    let motor = Motor::from_kind(
        kind,
        EspMotorLines::new(kind),
        FreeRtos,
        clock,
        config.ramp_profile(),
        shared.clone(),
    );
    let notifier = match mode {
        OperatingMode::Auto => ModeNotifier::Queued(QueuedNotifier::new(
            &NOTIFICATIONS,
            &config.pushover.app_token,
            &config.pushover.group_key,
            config.tuning.notify_attempts,
        )),
        OperatingMode::Manual => ModeNotifier::Offline(LogOnlyNotifier),
    };
    let controller = DoorController::new(
        motor,
        inputs,
        store,
        notifier,
        shared.clone(),
        DoorPolicy::from_config(&config, mode),
    );
    let mut service = CoopService::new(controller, clock.now_ms(), config.tuning.manual_idle_secs);
    let mut sink = LogEventSink::new();
    let mut power = PowerManager::new(sleeper, FreeRtos, shared.clone(), config.tuning.sleep_grace_secs);

    // Limit edges must reach the queue during the boot sync.
    hw_init::init_isr_service()?;

    if let Err(fault) = service.start(&mut sink) {
        error!("Wiring fault at boot: {}", fault);
        power.halt();
        return Err(Error::Wiring(fault).into());
    }
    booting.store(false, Ordering::Release);

    // The press that woke us happened before the ISRs existed.
    if mode == OperatingMode::Manual && shared.is_idle() {
        let button = match wake {
            WakeReason::ManualOpen => Some(SwitchId::ManualOpen),
            WakeReason::ManualClose => Some(SwitchId::ManualClose),
            _ => None,
        };
        if let Some(switch) = button {
            push_event(Event::Switch(SwitchEvent { switch, at_ms: clock.now_ms() }));
        }
    }

    // ── 6. Auto mode: network, clock loop, notifications ──────
    if mode == OperatingMode::Auto {
        let peripherals = Peripherals::take()?;
        let wifi = WifiStation::new(peripherals.modem, EspSystemEventLoop::take()?, EspDefaultNvsPartition::take()?)?;
        let clock_cfg = config.clone();
        let clock_shared = shared.clone();
        spawn_on_core(Core::Pro, 5, 16, "clock\0", move || {
            if let Err(e) = run_clock(wifi, clock_cfg, clock_shared, clock) {
                error!("SCHED | clock loop stopped: {:?}", e);
            }
        })?;

        let notify_cfg = config.clone();
        spawn_on_core(Core::Pro, 4, 12, "notify\0", move || run_notifier(&notify_cfg))?;
    }

    let watchdog = Watchdog::new(Watchdog::timeout_for(
        config.motor_tuning.ramp_time,
        config.tuning.backoff_ms,
    ));

    info!("System ready. Entering event loop.");

    // ── 7. Event loop ─────────────────────────────────────────
    loop {
        watchdog.feed();

        while let Some(event) = EVENTS.pop() {
            match service.handle_event(event, clock.now_ms(), &mut sink) {
                Ok(LoopControl::Continue) => {}
                Ok(LoopControl::Restart) => {
                    power.restart();
                    return Ok(());
                }
                Err(fault) => {
                    error!("Wiring fault: {}, halting", fault);
                    power.halt();
                    return Err(Error::Wiring(fault).into());
                }
            }
        }

        let now_ms = clock.now_ms();
        service.poll(now_ms, &mut sink);

        if service.manual_idle_expired(now_ms) {
            power.maybe_sleep(None, &mut sink);
        }

        FreeRtos::delay_ms(LOOP_POLL_MS);
    }
}

// ── Clock thread ──────────────────────────────────────────────

fn run_clock(
    mut wifi: WifiStation<'static>,
    config: CoopConfig,
    shared: Arc<SharedDoorState>,
    clock: Esp32TimeAdapter,
) -> Result<()> {
    while let Err(e) = wifi.connect(&config.wifi.ssid, &config.wifi.passphrase) {
        warn!("WiFi: {:?}, retrying", e);
        FreeRtos::delay_ms(NETWORK_RETRY_MS);
    }
    wifi.sync_time()?;

    let scheduler = Scheduler::new(config.time.sunrise_offset, config.time.sunset_offset);
    let mut clock_loop = ClockLoop::new(
        scheduler,
        SunApiClient::new()?,
        EspInputs::new(),
        shared.clone(),
        config.location.lat,
        config.location.lng,
    );

    loop {
        let Some(now) = clock.unix_time() else {
            FreeRtos::delay_ms(1_000);
            continue;
        };
        match clock_loop.prime(now) {
            Ok(next) => {
                info!("SCHED | sun times loaded, next {:?}", next);
                break;
            }
            Err(e) => {
                warn!("SCHED | sun times unavailable ({}), retrying", e);
                FreeRtos::delay_ms(NETWORK_RETRY_MS);
            }
        }
    }

    let mut delegate = QueueDelegate { sink: LogEventSink::new(), fired: false };
    let mut sink = LogEventSink::new();
    let mut power = PowerManager::new(EspSleepAdapter::new(), FreeRtos, shared.clone(), config.tuning.sleep_grace_secs)
        .with_notifications(&NOTIFICATIONS, config.notify_deadline_ms(pushover::REQUEST_TIMEOUT_MS));
    let mut delay = FreeRtos;

    loop {
        let Some(now) = clock.unix_time() else {
            FreeRtos::delay_ms(1_000);
            continue;
        };

        let handled_before = shared.handled();
        delegate.fired = false;
        let decision = match clock_loop.tick(now, &mut delegate) {
            Ok(d) => d,
            Err(fault) => {
                push_event(Event::Fault(fault));
                return Ok(());
            }
        };
        if let Some(next) = decision.next() {
            sink.emit(&AppEvent::NextOperation { operation: next.operation, at: next.at });
        }

        if delegate.fired {
            wait_for_idle(&shared, &clock, &mut delay, handled_before, config.operation_timeout_ms());
        }

        if !matches!(decision, ClockDecision::WaitingForData) {
            let now = clock.unix_time().unwrap_or(now);
            match decision.sleep_secs(now, config.tuning.min_sleep_secs) {
                Some(secs) => {
                    info!("SCHED | sleeping {} until next operation", format_hms(secs as i64));
                    power.maybe_sleep(Some(secs), &mut sink);
                }
                None => info!("SCHED | next operation too close to sleep"),
            }
        }

        FreeRtos::delay_ms(CLOCK_TICK_MS);
    }
}

// ── Notifier thread ───────────────────────────────────────────

fn run_notifier(config: &CoopConfig) {
    let transport = match PushoverTransport::new() {
        Ok(t) => t,
        Err(e) => {
            error!("NOTIFY | transport init failed: {:?}", e);
            return;
        }
    };
    let mut notifier = Notifier::new(
        transport,
        FreeRtos,
        config.tuning.notify_attempts,
        config.tuning.notify_backoff_ms,
    );
    loop {
        notifier.drain(&NOTIFICATIONS);
        FreeRtos::delay_ms(500);
    }
}
