//! Outbound application events.
//!
//! The controller, service, clock loop and power manager emit these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them; on the device
//! [`LogEventSink`](crate::adapters::log_sink::LogEventSink) writes one
//! tagged line per event.

use crate::fsm::states::{DoorTarget, OperatingMode, OperationState};
use crate::scheduler::Operation;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries mode and stored target).
    Started { mode: OperatingMode, target: DoorTarget },

    /// The controller moved between operation states.
    StateChanged { from: OperationState, to: OperationState },

    /// Motor enabled toward `target`.
    OperationStarted { target: DoorTarget },

    /// A request found the door already at its limit.
    AlreadyAtTarget { target: DoorTarget },

    /// The matching limit switch confirmed the move.
    OperationCompleted { target: DoorTarget },

    /// Obstruction while closing: backed off and resumed.
    ObstructionRetry { attempt: u8 },

    /// Retries exhausted: the door is reopening.
    ObstructionEscalated { attempts: u8 },

    /// A manual button stopped a move.
    Interrupted { during: OperationState },

    /// The stored target was discarded on request.
    TargetReset,

    /// Writing the durable target failed.  The move continues.
    TargetWriteFailed,

    /// Motor still on after the operation timeout; forced off.
    OperationTimedOut { during: OperationState, elapsed_ms: u32 },

    /// Auto / manual switch flipped; a restart follows.
    ModeChanged,

    /// The scheduler picked the next operation.
    NextOperation { operation: Operation, at: i64 },

    /// The clock loop requested an operation.
    OperationDue { operation: Operation, correction: bool },

    /// Sleep refused because the door is busy.
    SleepDeferred,

    /// Entering deep sleep.  `None` sleeps until a button wakes it.
    Sleeping { duration_ms: Option<u64> },
}
