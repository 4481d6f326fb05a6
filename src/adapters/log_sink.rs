//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART in production).  One tagged
//! line per event so a serial capture greps cleanly.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::scheduler::format_hms;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { mode, target } => {
                info!("START | mode={:?} target={:?}", mode, target);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::OperationStarted { target } => {
                info!("DOOR | moving to {:?}", target);
            }
            AppEvent::AlreadyAtTarget { target } => {
                info!("DOOR | already {:?}", target);
            }
            AppEvent::OperationCompleted { target } => {
                info!("DOOR | reached {:?}", target);
            }
            AppEvent::ObstructionRetry { attempt } => {
                warn!("DOOR | obstruction, retry {}", attempt);
            }
            AppEvent::ObstructionEscalated { attempts } => {
                error!("DOOR | obstruction after {} retries, reopening", attempts);
            }
            AppEvent::Interrupted { during } => {
                info!("DOOR | {:?} interrupted by button", during);
            }
            AppEvent::TargetReset => {
                warn!("DOOR | stored target cleared");
            }
            AppEvent::TargetWriteFailed => {
                error!("DOOR | target write failed");
            }
            AppEvent::OperationTimedOut { during, elapsed_ms } => {
                error!("DOOR | {:?} timed out after {} ms", during, elapsed_ms);
            }
            AppEvent::ModeChanged => {
                warn!("STATE | mode switch changed");
            }
            AppEvent::NextOperation { operation, at } => {
                info!("SCHED | next {:?} at {}", operation, at);
            }
            AppEvent::OperationDue { operation, correction } => {
                info!("SCHED | {:?} due{}", operation, if *correction { " (correction)" } else { "" });
            }
            AppEvent::SleepDeferred => {
                info!("POWER | sleep deferred, door busy");
            }
            AppEvent::Sleeping { duration_ms: Some(ms) } => {
                info!("POWER | deep sleep for {}", format_hms((*ms / 1_000) as i64));
            }
            AppEvent::Sleeping { duration_ms: None } => {
                info!("POWER | deep sleep until a button is pressed");
            }
        }
    }
}
