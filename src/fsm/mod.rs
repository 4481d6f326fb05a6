//! Door operation state machine.
//!
//! ```text
//!            open()                 open limit
//!   ┌──────┐ ─────────▶ ┌─────────┐ ──────────▶ ┌──────┐
//!   │ Idle │            │ Opening │             │ Idle │
//!   └──────┘ ─────────▶ ┌─────────┐ ──────────▶ └──────┘
//!            close()    │ Closing │ close limit
//!                       └─────────┘
//!                         │    ▲ obstruction (retry, bounded)
//!                         ▼    │
//!                       Closing ──── retries exhausted ───▶ Opening
//! ```
//!
//! The table below is the single source of truth for which transitions
//! are legal.  [`controller::DoorController`] consults it on every state
//! change and refuses anything not listed.

pub mod context;
pub mod controller;
pub mod states;

use states::OperationState;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for one operation state.
pub struct StateDescriptor {
    pub id: OperationState,
    pub name: &'static str,
    /// States reachable from this one.
    pub exits: &'static [OperationState],
}

/// Indexed by `OperationState as usize`.
pub static STATE_TABLE: [StateDescriptor; OperationState::COUNT] = [
    StateDescriptor {
        id: OperationState::Idle,
        name: "Idle",
        exits: &[OperationState::Opening, OperationState::Closing],
    },
    StateDescriptor {
        id: OperationState::Opening,
        name: "Opening",
        exits: &[OperationState::Idle, OperationState::Closing],
    },
    StateDescriptor {
        id: OperationState::Closing,
        name: "Closing",
        // Closing → Closing is an obstruction retry; → Opening is escalation.
        exits: &[OperationState::Idle, OperationState::Closing, OperationState::Opening],
    },
];

pub fn descriptor(state: OperationState) -> &'static StateDescriptor {
    &STATE_TABLE[state as usize]
}

pub fn state_name(state: OperationState) -> &'static str {
    descriptor(state).name
}

pub fn can_transition(from: OperationState, to: OperationState) -> bool {
    descriptor(from).exits.contains(&to)
}
