//! Motor and switch drivers, hardware initialisation, and peripheral helpers.

pub mod heartbeat;
pub mod hw_init;
pub mod motor;
pub mod switches;
pub mod task_pin;
pub mod watchdog;
