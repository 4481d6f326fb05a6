//! Best-effort push notifications.
//!
//! The controller never waits on the network.  It drops a
//! [`NotificationRequest`] into a bounded channel through
//! [`QueuedNotifier`]; a dedicated thread drains the channel and hands each
//! request to [`Notifier::deliver`], which retries with a fixed back-off
//! and then gives up.  A failed notification is logged and forgotten.
//!
//! The queue counts a request as outstanding from the moment it is queued
//! until its delivery finishes, so the power manager can hold off deep
//! sleep while an alert is still on its way out.

use core::sync::atomic::{AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{info, warn};

use crate::app::ports::{NotificationSink, NotifyTransport, Priority};

const QUEUE_CAP: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub token: String<32>,
    pub user: String<32>,
    pub message: String<64>,
    pub priority: Priority,
    /// Full send attempts before giving up.
    pub attempts: u8,
}

type NotificationChannel = Channel<CriticalSectionRawMutex, NotificationRequest, QUEUE_CAP>;

/// Bounded request queue plus a count of requests not yet finished.
pub struct NotificationQueue {
    chan: NotificationChannel,
    outstanding: AtomicUsize,
}

impl NotificationQueue {
    pub const fn new() -> Self {
        Self {
            chan: Channel::new(),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// `false` when the queue is full and the request was dropped.
    pub fn push(&self, req: NotificationRequest) -> bool {
        // Counted before it becomes visible to the consumer.
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        if self.chan.try_send(req).is_err() {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Take the next request.  It stays outstanding until [`finish`](Self::finish).
    pub fn pop(&self) -> Option<NotificationRequest> {
        self.chan.try_receive().ok()
    }

    pub fn finish(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Queued plus in delivery.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.chan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chan.is_empty()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Requests waiting for the notifier thread.
pub static NOTIFICATIONS: NotificationQueue = NotificationQueue::new();

/// Copy `src` into a bounded string, cutting at a char boundary.
fn bounded<const N: usize>(src: &str) -> String<N> {
    let mut out = String::new();
    for c in src.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ── Sinks used by the controller ──────────────────────────────

/// Queues requests for the notifier thread.  Never blocks.
pub struct QueuedNotifier<'a> {
    queue: &'a NotificationQueue,
    token: String<32>,
    user: String<32>,
    attempts: u8,
}

impl<'a> QueuedNotifier<'a> {
    pub fn new(queue: &'a NotificationQueue, token: &str, user: &str, attempts: u8) -> Self {
        Self {
            queue,
            token: bounded(token),
            user: bounded(user),
            attempts,
        }
    }
}

impl NotificationSink for QueuedNotifier<'_> {
    fn notify(&mut self, message: &str, priority: Priority) {
        let req = NotificationRequest {
            token: self.token.clone(),
            user: self.user.clone(),
            message: bounded(message),
            priority,
            attempts: self.attempts,
        };
        if !self.queue.push(req) {
            warn!("NOTIFY | queue full, dropped \"{}\"", message);
        }
    }
}

/// Manual mode has no network: notifications are only logged.
#[derive(Debug, Default)]
pub struct LogOnlyNotifier;

impl NotificationSink for LogOnlyNotifier {
    fn notify(&mut self, message: &str, priority: Priority) {
        info!("NOTIFY | (offline) [{:?}] {}", priority, message);
    }
}

/// The sink the controller gets for the current operating mode.
pub enum ModeNotifier<'a> {
    Queued(QueuedNotifier<'a>),
    Offline(LogOnlyNotifier),
}

impl NotificationSink for ModeNotifier<'_> {
    fn notify(&mut self, message: &str, priority: Priority) {
        match self {
            Self::Queued(q) => q.notify(message, priority),
            Self::Offline(l) => l.notify(message, priority),
        }
    }
}

// ── Delivery ──────────────────────────────────────────────────

pub struct Notifier<T, D> {
    transport: T,
    delay: D,
    attempts: u8,
    backoff_ms: u32,
}

impl<T: NotifyTransport, D: DelayNs> Notifier<T, D> {
    pub fn new(transport: T, delay: D, attempts: u8, backoff_ms: u32) -> Self {
        Self {
            transport,
            delay,
            attempts: attempts.max(1),
            backoff_ms,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send with the configured attempt count.  `true` on delivery.
    pub fn send(&mut self, token: &str, user: &str, message: &str, priority: Priority) -> bool {
        let req = NotificationRequest {
            token: bounded(token),
            user: bounded(user),
            message: bounded(message),
            priority,
            attempts: self.attempts,
        };
        self.deliver(&req)
    }

    /// Each attempt is a complete send.  Sleeps `backoff_ms` between
    /// failures, not after the last one.
    pub fn deliver(&mut self, req: &NotificationRequest) -> bool {
        let attempts = req.attempts.max(1);
        for attempt in 1..=attempts {
            match self.transport.post(&req.token, &req.user, &req.message, req.priority) {
                Ok(()) => {
                    info!("NOTIFY | sent \"{}\" (attempt {})", req.message, attempt);
                    return true;
                }
                Err(e) => {
                    warn!("NOTIFY | attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        self.delay.delay_ms(self.backoff_ms);
                    }
                }
            }
        }
        warn!("NOTIFY | giving up on \"{}\"", req.message);
        false
    }

    /// Deliver everything queued.  Returns the number delivered.
    pub fn drain(&mut self, queue: &NotificationQueue) -> usize {
        let mut delivered = 0;
        while let Some(req) = queue.pop() {
            if self.deliver(&req) {
                delivered += 1;
            }
            queue.finish();
        }
        delivered
    }
}
