//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - GPIO ISRs (travel switches, manual buttons, mode switch)
//! - The clock loop (scheduled open / close)
//!
//! Events are consumed by the main loop, which hands them to the door
//! controller one at a time in arrival order.  Because the controller is
//! the only consumer, every check-then-act on the operation state happens
//! on one thread and can never interleave with another handler.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Switch ISR  │────▶│              │     │              │
//! │ Mode ISR    │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Clock loop  │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The queue is an `embassy-sync` channel guarded by a critical-section
//! raw mutex: `push` never blocks and is safe from interrupt context.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::drivers::switches::SwitchEvent;
use crate::error::WiringFault;
use crate::scheduler::Operation;

/// Maximum number of pending events.
const EVENT_QUEUE_CAP: usize = 32;

/// System events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // ── Switches ──────────────────────────────────────────
    /// Debounced transition on a travel switch or manual button.
    Switch(SwitchEvent),
    /// Auto / manual switch flipped.  Not debounced.
    ModeChanged,

    // ── Scheduler ─────────────────────────────────────────
    /// The clock loop requests an operation, exactly like a button would.
    Scheduled(Operation),

    // ── Faults ────────────────────────────────────────────
    /// A background loop hit an unrecoverable fault.
    Fault(WiringFault),
}

/// Bounded multi-producer, single-consumer event queue.
pub struct EventQueue {
    chan: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            chan: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Push an event into the queue.
    /// Safe to call from ISR context (never blocks).
    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        if self.chan.try_send(event).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Pop the next event.  Returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<Event> {
        self.chan.try_receive().ok()
    }

    /// Drain all pending events into a callback, in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chan.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chan.len()
    }

    /// Events lost to a full queue since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The queue ISRs feed.  Tests build their own [`EventQueue`].
pub static EVENTS: EventQueue = EventQueue::new();

/// Push into the global queue.  ISR-safe.
pub fn push_event(event: Event) -> bool {
    EVENTS.push(event)
}
