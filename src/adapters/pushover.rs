//! Pushover push-notification transport.
//!
//! Implements [`NotifyTransport`].  One POST per message; retries and
//! back-off belong to [`crate::notifier::Notifier`], not here.

use serde::Serialize;

use crate::app::ports::{NotifyTransport, Priority, TransportError};

pub const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

/// Upper bound on one POST, connect included.
pub const REQUEST_TIMEOUT_MS: u32 = 20_000;

#[derive(Serialize)]
struct PushoverMessage<'a> {
    token: &'a str,
    user: &'a str,
    message: &'a str,
    priority: i8,
}

/// JSON request body for one message.
pub fn message_body(token: &str, user: &str, message: &str, priority: Priority) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(&PushoverMessage {
        token,
        user,
        message,
        priority: priority.as_i8(),
    })
    .map_err(|_| TransportError::Io)
}

pub struct PushoverTransport {
    #[cfg(target_os = "espidf")]
    http: crate::adapters::http::HttpsClient,
}

impl PushoverTransport {
    #[cfg(target_os = "espidf")]
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            http: crate::adapters::http::HttpsClient::new(std::time::Duration::from_millis(u64::from(REQUEST_TIMEOUT_MS)))?,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {})
    }
}

impl NotifyTransport for PushoverTransport {
    #[cfg(target_os = "espidf")]
    fn post(&mut self, token: &str, user: &str, message: &str, priority: Priority) -> Result<(), TransportError> {
        let body = message_body(token, user, message, priority)?;
        let status = self.http.post_json(PUSHOVER_URL, &body).map_err(|e| {
            log::warn!("NOTIFY | request failed: {:?}", e);
            TransportError::Unreachable
        })?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(TransportError::Status(status))
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn post(&mut self, token: &str, user: &str, message: &str, priority: Priority) -> Result<(), TransportError> {
        let body = message_body(token, user, message, priority)?;
        log::info!("NOTIFY | (sim) POST {} {} bytes", PUSHOVER_URL, body.len());
        Err(TransportError::Unreachable)
    }
}
