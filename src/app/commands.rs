//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (clock loop,
//! boot sequence, a future remote interface) that
//! [`CoopService`](super::service::CoopService) interprets and acts upon.

use crate::scheduler::Operation;

/// Commands that adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Open the door.  No-op at the open limit.
    Open,

    /// Close the door.  No-op at the close limit.
    Close,

    /// Ramp the motor down and go idle.
    Stop,

    /// Discard the stored target (reads Unknown on next boot).
    ResetTarget,
}

impl From<Operation> for AppCommand {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Open => Self::Open,
            Operation::Close => Self::Close,
        }
    }
}
