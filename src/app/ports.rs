//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DoorController / Scheduler / PowerManager
//! ```
//!
//! Driven adapters (GPIO inputs, motor lines, storage, network, sleep
//! hardware) implement these traits.  The domain consumes them via
//! generics, so the door logic never touches hardware directly and every
//! path runs on the host against mocks.

use crate::config::CoopConfig;
use crate::drivers::motor::Direction;
use crate::fsm::states::{LimitReading, OperatingMode};
use crate::scheduler::{Operation, SunTimes};

// ───────────────────────────────────────────────────────────────
// Input port (driven adapter: switches → domain)
// ───────────────────────────────────────────────────────────────

/// Level reads of the door's switches.  Edges arrive separately through
/// the event queue; the controller uses these to confirm them.
pub trait InputPort {
    /// Sample both travel limits.
    fn limits(&mut self) -> LimitReading;

    /// Whether the obstruction switch is currently tripped.
    fn obstruction_triggered(&mut self) -> bool;

    /// `(open_held, close_held)` for the manual buttons.
    fn buttons_held(&mut self) -> (bool, bool);

    /// Position of the auto / manual switch.
    fn mode(&mut self) -> OperatingMode;
}

// ───────────────────────────────────────────────────────────────
// Motor lines (driven adapter: domain → driver board)
// ───────────────────────────────────────────────────────────────

/// Raw outputs to the motor driver board.  Ramping and sequencing live in
/// [`drivers::motor`](crate::drivers::motor); this is just the wires.
pub trait MotorLines {
    /// Drive the direction line(s).
    fn set_direction(&mut self, direction: Direction);

    /// Enable / sleep line.  `false` cuts power to the driver.
    fn set_power(&mut self, on: bool);

    /// Step pulse rate in Hz.  `0` stops the pulse train.
    fn set_step_frequency(&mut self, hz: u32);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

pub trait Clock {
    /// Monotonic milliseconds since boot (wraps at `u32::MAX`).
    fn now_ms(&self) -> u32;

    /// Wall-clock Unix seconds, or `None` before time sync.
    fn unix_time(&self) -> Option<i64>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Notification ports
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

impl Priority {
    /// Pushover `priority` field.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Normal => 0,
            Self::High => 1,
        }
    }
}

/// Where the controller drops status messages.  Must never block:
/// delivery happens on a separate thread.
pub trait NotificationSink {
    fn notify(&mut self, message: &str, priority: Priority);
}

/// One delivery attempt over the network.
pub trait NotifyTransport {
    fn post(&mut self, token: &str, user: &str, message: &str, priority: Priority) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Sun-time source
// ───────────────────────────────────────────────────────────────

/// External sunrise / sunset lookup for one calendar day (UTC).
pub trait SunTimesPort {
    fn sun_times(&mut self, lat: f64, lng: f64, date: chrono::NaiveDate) -> Result<SunTimes, SunTimesError>;
}

// ───────────────────────────────────────────────────────────────
// Power port (driven adapter: domain → sleep hardware)
// ───────────────────────────────────────────────────────────────

/// Raw cause reported by the chip after boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    PowerOn,
    Timer,
    Ext0,
    Ext1,
    Other(u32),
}

pub trait PowerPort {
    /// Arm both manual buttons (active low) as deep-sleep wake sources.
    fn arm_wake_sources(&mut self);

    /// Enter deep sleep.  `None` sleeps until a wake source fires.
    /// Does not return on hardware.
    fn deep_sleep(&mut self, duration_ms: Option<u64>);

    /// Software reset.  Does not return on hardware.
    fn restart(&mut self);

    fn wake_cause(&self) -> WakeCause;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration.  A missing record is [`ConfigError::NotFound`];
    /// there are no usable defaults for Wi-Fi or location.
    fn load(&self) -> Result<CoopConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &CoopConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic, with no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from event system)
// ───────────────────────────────────────────────────────────────

/// Callback the clock loop invokes when an operation is due.
///
/// The main loop implements this by pushing
/// [`Event::Scheduled`](crate::events::Event::Scheduled) into the event
/// queue; the scheduler itself knows nothing about events or ISRs.
pub trait SchedulerDelegate {
    fn on_operation_due(&mut self, operation: Operation, reason: DueReason);
}

/// Why the clock loop asked for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueReason {
    /// Wall time passed the scheduled timestamp.
    Scheduled,
    /// The door was not where the waiting period says it should be.
    Correction,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed to deserialize.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`NotifyTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No network route (Wi-Fi down, DNS failure).
    Unreachable,
    /// The request could not be written or the response read.
    Io,
    /// The server answered with a non-2xx status.
    Status(u16),
}

/// Errors from [`SunTimesPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunTimesError {
    /// Request failed before a response arrived.
    Unreachable,
    /// Response body was not the expected JSON.
    Malformed,
    /// The API answered with `status != "OK"`.
    Rejected,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unreachable => write!(f, "unreachable"),
            Self::Io => write!(f, "I/O error"),
            Self::Status(code) => write!(f, "HTTP {}", code),
        }
    }
}

impl core::fmt::Display for SunTimesError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unreachable => write!(f, "sun-time API unreachable"),
            Self::Malformed => write!(f, "malformed sun-time response"),
            Self::Rejected => write!(f, "sun-time API rejected the request"),
        }
    }
}
