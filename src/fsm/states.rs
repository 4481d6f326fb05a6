//! Door data model and the pure limit-switch interpretation.
//!
//! Nothing in this file touches hardware or storage.  [`check_limits`]
//! is the single place where a [`LimitReading`] is turned into a door
//! position, so boot sync, the clock loop and tests all agree on it.

use crate::error::WiringFault;

/// The durably persisted intended end state of the door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DoorTarget {
    Open = 0,
    Closed = 1,
    /// First boot or after an explicit reset.  Resolved to Closed.
    Unknown = 2,
}

impl DoorTarget {
    pub fn from_index(idx: u8) -> Self {
        match idx {
            0 => Self::Open,
            1 => Self::Closed,
            _ => Self::Unknown,
        }
    }

    /// Durable encoding.  `None` for Unknown (nothing is stored).
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Open => Some("open"),
            Self::Closed => Some("closed"),
            Self::Unknown => None,
        }
    }

    /// Anything other than `"open"` or `"closed"` reads as Unknown.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            _ => Self::Unknown,
        }
    }
}

/// Where the limit switches say the door is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorPosition {
    Open,
    Closed,
    /// Mid-travel, or a switch fault.
    Unknown,
}

/// Both travel limits sampled at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitReading {
    pub open_triggered: bool,
    pub close_triggered: bool,
}

impl LimitReading {
    pub const fn new(open_triggered: bool, close_triggered: bool) -> Self {
        Self { open_triggered, close_triggered }
    }

    pub const OPEN: Self = Self::new(true, false);
    pub const CLOSED: Self = Self::new(false, true);
    pub const MID_TRAVEL: Self = Self::new(false, false);
}

/// Target combined with the position the switches report.
/// Derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorStatus {
    pub target: DoorTarget,
    pub actual: DoorPosition,
}

impl DoorStatus {
    /// The door sits at the limit it was sent to.
    pub fn at_target(&self) -> bool {
        matches!(
            (self.target, self.actual),
            (DoorTarget::Open, DoorPosition::Open) | (DoorTarget::Closed, DoorPosition::Closed)
        )
    }
}

/// What the controller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationState {
    Idle = 0,
    Opening = 1,
    Closing = 2,
}

impl OperationState {
    pub const COUNT: usize = 3;

    pub fn from_index(idx: u8) -> Self {
        match idx {
            1 => Self::Opening,
            2 => Self::Closing,
            _ => Self::Idle,
        }
    }

    pub fn is_moving(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Position of the auto / manual switch.  Read once at boot; any change
/// restarts the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Auto,
    Manual,
}

/// Interpret a limit reading against the stored target.
///
/// - Both limits triggered is a wiring fault, whatever the target.
/// - An Unknown target assumes the door is closed.
/// - Exactly one limit triggered reports that side, so a mismatch with
///   the target shows up as the opposite position.
/// - No limit triggered reports Unknown (mid-travel).
pub fn check_limits(target: DoorTarget, reading: LimitReading) -> Result<DoorStatus, WiringFault> {
    if reading.open_triggered && reading.close_triggered {
        return Err(WiringFault::BothLimitsTriggered);
    }
    if target == DoorTarget::Unknown {
        return Ok(DoorStatus { target, actual: DoorPosition::Closed });
    }
    let actual = match (reading.open_triggered, reading.close_triggered) {
        (true, false) => DoorPosition::Open,
        (false, true) => DoorPosition::Closed,
        _ => DoorPosition::Unknown,
    };
    Ok(DoorStatus { target, actual })
}
