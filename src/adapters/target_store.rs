//! Durable door target.
//!
//! One short text value in NVS (`coop` / `target`): `"open"` or
//! `"closed"`.  Anything else, a missing key, or a read error all mean
//! [`DoorTarget::Unknown`]; none of them is fatal.

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::fsm::states::DoorTarget;

const TARGET_NAMESPACE: &str = "coop";
const TARGET_KEY: &str = "target";

pub struct TargetStore<S> {
    storage: S,
}

impl<S: StoragePort> TargetStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn read(&self) -> DoorTarget {
        let mut buf = [0u8; 16];
        match self.storage.read(TARGET_NAMESPACE, TARGET_KEY, &mut buf) {
            Ok(n) => {
                let raw = core::str::from_utf8(&buf[..n]).unwrap_or("");
                DoorTarget::parse(raw)
            }
            Err(StorageError::NotFound) => DoorTarget::Unknown,
            Err(e) => {
                warn!("target store: read failed ({}), treating as unknown", e);
                DoorTarget::Unknown
            }
        }
    }

    /// Persist `target`.  Writing Unknown clears the record.
    pub fn write(&mut self, target: DoorTarget) -> Result<(), StorageError> {
        match target.as_str() {
            Some(text) => self.storage.write(TARGET_NAMESPACE, TARGET_KEY, text.as_bytes()),
            None => self.clear(),
        }
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        info!("target store: cleared");
        self.storage.delete(TARGET_NAMESPACE, TARGET_KEY)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
