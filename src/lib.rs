//! Coop door firmware library.
//!
//! Exposes the pure-logic modules for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module, with a host twin beside it.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod notifier;
pub mod pins;
pub mod power;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
