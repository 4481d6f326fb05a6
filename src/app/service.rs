//! Application service: the hexagonal core.
//!
//! [`CoopService`] owns the door controller and routes every queued
//! [`Event`] to it.  It is the only consumer of the event queue, so the
//! controller sees one event at a time in arrival order.
//!
//! ```text
//!  Event Queue ──▶ ┌──────────────────────┐ ──▶ EventSink
//!                  │     CoopService       │
//!   AppCommand ──▶ │  DoorController       │ ──▶ NotificationSink
//!                  └──────────────────────┘
//! ```

use log::{info, warn};

use crate::app::commands::AppCommand;
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, InputPort, NotificationSink, StoragePort};
use crate::drivers::motor::MotorDrive;
use crate::drivers::switches::SwitchGroup;
use crate::error::WiringFault;
use crate::events::Event;
use crate::fsm::controller::DoorController;
use crate::fsm::states::OperatingMode;

/// What the main loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    /// Reinitialise from boot (mode switch flipped).
    Restart,
}

pub struct CoopService<M, I, S, N> {
    controller: DoorController<M, I, S, N>,
    last_activity_ms: u32,
    manual_idle_ms: u32,
}

impl<M, I, S, N> CoopService<M, I, S, N>
where
    M: MotorDrive,
    I: InputPort,
    S: StoragePort,
    N: NotificationSink,
{
    pub fn new(controller: DoorController<M, I, S, N>, now_ms: u32, manual_idle_secs: u32) -> Self {
        Self {
            controller,
            last_activity_ms: now_ms,
            manual_idle_ms: manual_idle_secs.saturating_mul(1_000),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the boot state and drive the door to its stored target.
    pub fn start(&mut self, sink: &mut impl EventSink) -> Result<(), WiringFault> {
        let mode = self.controller.policy().mode;
        let target = self.controller.shared().target();
        sink.emit(&AppEvent::Started { mode, target });
        info!("CoopService started ({:?}, target {:?})", mode, target);
        self.controller.sync_to_target(sink)?;
        Ok(())
    }

    // ── Event routing ─────────────────────────────────────────

    /// Handle one queued event.  A wiring fault is returned for the
    /// caller to halt on.
    pub fn handle_event(
        &mut self,
        event: Event,
        now_ms: u32,
        sink: &mut impl EventSink,
    ) -> Result<LoopControl, WiringFault> {
        let result = match event {
            Event::Switch(sw) => {
                if sw.switch.group() == Some(SwitchGroup::Buttons) {
                    self.last_activity_ms = now_ms;
                }
                self.controller.handle_switch(sw, sink).map(|()| LoopControl::Continue)
            }
            Event::ModeChanged => {
                warn!("mode switch flipped, restarting");
                sink.emit(&AppEvent::ModeChanged);
                self.controller.shutdown(sink);
                Ok(LoopControl::Restart)
            }
            Event::Scheduled(op) => {
                self.handle_command(op.into(), sink);
                Ok(LoopControl::Continue)
            }
            Event::Fault(fault) => {
                self.controller.shutdown(sink);
                Err(fault)
            }
        };
        self.controller.shared().mark_handled();
        result
    }

    /// Process an external command.
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::Open => {
                self.controller.open(sink);
            }
            AppCommand::Close => {
                self.controller.close(sink);
            }
            AppCommand::Stop => self.controller.shutdown(sink),
            AppCommand::ResetTarget => self.controller.reset_target(sink),
        }
    }

    /// Per-iteration housekeeping.  Returns `true` if a stuck move was
    /// stopped.
    pub fn poll(&mut self, now_ms: u32, sink: &mut impl EventSink) -> bool {
        self.controller.check_timeout(now_ms, sink)
    }

    /// Manual mode only: idle with no button press for the configured time.
    pub fn manual_idle_expired(&self, now_ms: u32) -> bool {
        self.controller.policy().mode == OperatingMode::Manual
            && self.controller.shared().is_idle()
            && now_ms.wrapping_sub(self.last_activity_ms) >= self.manual_idle_ms
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn controller(&self) -> &DoorController<M, I, S, N> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut DoorController<M, I, S, N> {
        &mut self.controller
    }
}
