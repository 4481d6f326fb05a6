//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the coop door: event
//! routing into the door controller, outbound events and inbound
//! commands.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
