//! Unified error types for the coop door firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the controller and the clock loop without
//! allocation.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError, SunTimesError, TransportError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Both travel limits read triggered at once.  Unrecoverable.
    Wiring(WiringFault),
    /// Durable storage failed.
    Storage(StorageError),
    /// Configuration is missing or invalid.
    Config(ConfigError),
    /// Sun-time lookup failed.
    SunTimes(SunTimesError),
    /// Notification delivery failed (after every retry).
    Notify(TransportError),
    /// Peripheral or service initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wiring(e) => write!(f, "wiring: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::SunTimes(e) => write!(f, "sun times: {e}"),
            Self::Notify(e) => write!(f, "notify: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Wiring faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiringFault {
    /// Open and close limits both report triggered.
    BothLimitsTriggered,
}

impl fmt::Display for WiringFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BothLimitsTriggered => write!(f, "open and close limits both triggered"),
        }
    }
}

impl From<WiringFault> for Error {
    fn from(e: WiringFault) -> Self {
        Self::Wiring(e)
    }
}

// ---------------------------------------------------------------------------
// Port error conversions
// ---------------------------------------------------------------------------

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<SunTimesError> for Error {
    fn from(e: SunTimesError) -> Self {
        Self::SunTimes(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Notify(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
