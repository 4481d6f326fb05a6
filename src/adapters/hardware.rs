//! Hardware adapter: bridges the board's GPIO to domain port traits.
//!
//! [`EspInputs`] samples the switch lines for [`InputPort`] and
//! [`EspMotorLines`] drives the motor driver board for [`MotorLines`].
//! This is the only module above `drivers::hw_init` that knows which
//! electrical level means what.  On non-espidf targets the underlying
//! `hw_init` calls are simulation twins.

use crate::app::ports::{InputPort, MotorLines};
use crate::drivers::hw_init::{gpio_read, gpio_write, ledc_set_step_freq};
use crate::drivers::motor::{Direction, MotorKind};
use crate::fsm::states::{LimitReading, OperatingMode};
use crate::pins;

// ── Inputs ────────────────────────────────────────────────────

/// Switch inputs read straight from the GPIO input registers.
#[derive(Debug, Default, Clone, Copy)]
pub struct EspInputs;

impl EspInputs {
    pub fn new() -> Self {
        Self
    }
}

impl InputPort for EspInputs {
    fn limits(&mut self) -> LimitReading {
        LimitReading::new(gpio_read(pins::OPEN_LIMIT_GPIO), gpio_read(pins::CLOSE_LIMIT_GPIO))
    }

    fn obstruction_triggered(&mut self) -> bool {
        gpio_read(pins::OBSTRUCTION_LIMIT_GPIO)
    }

    fn buttons_held(&mut self) -> (bool, bool) {
        (!gpio_read(pins::MANUAL_OPEN_GPIO), !gpio_read(pins::MANUAL_CLOSE_GPIO))
    }

    fn mode(&mut self) -> OperatingMode {
        if gpio_read(pins::MODE_SWITCH_GPIO) {
            OperatingMode::Manual
        } else {
            OperatingMode::Auto
        }
    }
}

// ── Motor lines ───────────────────────────────────────────────

/// Output lines of the motor driver board.
///
/// For the stepper variant DIR selects the direction and the LEDC channel
/// produces the step train.  For the H-bridge variant DIR is IN1 and IN2
/// is driven as its complement; the step channel is left idle.
#[derive(Debug)]
pub struct EspMotorLines {
    kind: MotorKind,
}

impl EspMotorLines {
    pub fn new(kind: MotorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> MotorKind {
        self.kind
    }
}

impl MotorLines for EspMotorLines {
    fn set_direction(&mut self, direction: Direction) {
        let open = direction == Direction::Open;
        gpio_write(pins::MOTOR_DIR_GPIO, open);
        if self.kind == MotorKind::Dc {
            gpio_write(pins::MOTOR_IN2_GPIO, !open);
        }
    }

    fn set_power(&mut self, on: bool) {
        gpio_write(pins::MOTOR_EN_GPIO, on);
        if !on && self.kind == MotorKind::Dc {
            // Both inputs low: coast.
            gpio_write(pins::MOTOR_DIR_GPIO, false);
            gpio_write(pins::MOTOR_IN2_GPIO, false);
        }
    }

    fn set_step_frequency(&mut self, hz: u32) {
        if self.kind == MotorKind::Stepper {
            ledc_set_step_freq(hz);
        }
    }
}
