//! ISR-side debouncing for the door's travel switches and manual buttons.
//!
//! ## Hardware
//!
//! Every switch is edge-interruptible.  The ISR reads the high-resolution
//! timer, calls [`switch_isr_handler`], and returns; nothing here blocks.
//!
//! ## Windows
//!
//! Two independent windows, one per switch group:
//!
//! | Group    | Switches                             |
//! |----------|--------------------------------------|
//! | Limits   | open limit, close limit, obstruction |
//! | Buttons  | manual open, manual close            |
//!
//! The first edge in an idle (or elapsed) window is forwarded as a stable
//! transition and opens a 5 ms window.  Further edges from the same group
//! inside the window are counted as bounce and dropped.  The mode switch
//! has no window: every edge is forwarded as [`Event::ModeChanged`].

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::events::{push_event, Event};
use crate::pins;

/// Bounce suppression window after a forwarded edge.
pub const DEBOUNCE_WINDOW_MS: u32 = 5;

/// Every interrupt-capable input on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SwitchId {
    OpenLimit = 0,
    CloseLimit = 1,
    ObstructionLimit = 2,
    ManualOpen = 3,
    ManualClose = 4,
    ModeSwitch = 5,
}

impl SwitchId {
    pub const ALL: [SwitchId; 6] = [
        Self::OpenLimit,
        Self::CloseLimit,
        Self::ObstructionLimit,
        Self::ManualOpen,
        Self::ManualClose,
        Self::ModeSwitch,
    ];

    /// Recover the id passed through the ISR `arg` pointer.
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Debounce group, or `None` for the undebounced mode switch.
    pub fn group(self) -> Option<SwitchGroup> {
        match self {
            Self::OpenLimit | Self::CloseLimit | Self::ObstructionLimit => Some(SwitchGroup::Limits),
            Self::ManualOpen | Self::ManualClose => Some(SwitchGroup::Buttons),
            Self::ModeSwitch => None,
        }
    }

    pub fn gpio(self) -> i32 {
        match self {
            Self::OpenLimit => pins::OPEN_LIMIT_GPIO,
            Self::CloseLimit => pins::CLOSE_LIMIT_GPIO,
            Self::ObstructionLimit => pins::OBSTRUCTION_LIMIT_GPIO,
            Self::ManualOpen => pins::MANUAL_OPEN_GPIO,
            Self::ManualClose => pins::MANUAL_CLOSE_GPIO,
            Self::ModeSwitch => pins::MODE_SWITCH_GPIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchGroup {
    Limits,
    Buttons,
}

/// A stable transition, stamped with the ISR time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent {
    pub switch: SwitchId,
    pub at_ms: u32,
}

// ── Debounce window ───────────────────────────────────────────

/// `pending_since` holds the window end (`first edge + 5 ms`).
struct DebounceWindow {
    open: AtomicBool,
    pending_since: AtomicU32,
    bounce_count: AtomicU32,
}

impl DebounceWindow {
    const fn new() -> Self {
        Self {
            open: AtomicBool::new(false),
            pending_since: AtomicU32::new(0),
            bounce_count: AtomicU32::new(0),
        }
    }

    /// Returns `true` when this edge should be forwarded.
    fn on_edge(&self, now_ms: u32) -> bool {
        if self.open.load(Ordering::Acquire) {
            let until = self.pending_since.load(Ordering::Acquire);
            // Wrapping compare: `now < until` across the u32 rollover.
            if (now_ms.wrapping_sub(until) as i32) < 0 {
                self.bounce_count.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }
        self.pending_since
            .store(now_ms.wrapping_add(DEBOUNCE_WINDOW_MS), Ordering::Release);
        self.bounce_count.store(1, Ordering::Relaxed);
        self.open.store(true, Ordering::Release);
        true
    }

    fn bounce_count(&self) -> u32 {
        self.bounce_count.load(Ordering::Relaxed)
    }
}

// ── Debouncer ─────────────────────────────────────────────────

/// Per-group debounce state.  All methods take `&self` and are ISR-safe.
pub struct SwitchDebouncer {
    limits: DebounceWindow,
    buttons: DebounceWindow,
}

impl SwitchDebouncer {
    pub const fn new() -> Self {
        Self {
            limits: DebounceWindow::new(),
            buttons: DebounceWindow::new(),
        }
    }

    /// Classify a raw edge.  O(1), lock-free.
    pub fn on_edge(&self, switch: SwitchId, now_ms: u32) -> Option<Event> {
        let Some(group) = switch.group() else {
            return Some(Event::ModeChanged);
        };
        self.window(group)
            .on_edge(now_ms)
            .then_some(Event::Switch(SwitchEvent { switch, at_ms: now_ms }))
    }

    /// Edges seen in the current window, including the forwarded one.
    pub fn bounce_count(&self, group: SwitchGroup) -> u32 {
        self.window(group).bounce_count()
    }

    fn window(&self, group: SwitchGroup) -> &DebounceWindow {
        match group {
            SwitchGroup::Limits => &self.limits,
            SwitchGroup::Buttons => &self.buttons,
        }
    }
}

impl Default for SwitchDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

static DEBOUNCER: SwitchDebouncer = SwitchDebouncer::new();

/// ISR handler, registered on every switch GPIO.
/// Safe to call from interrupt context (atomics + non-blocking push).
pub fn switch_isr_handler(switch: SwitchId, now_ms: u32) {
    if let Some(event) = DEBOUNCER.on_edge(switch, now_ms) {
        push_event(event);
    }
}
