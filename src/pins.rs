//! GPIO / peripheral pin assignments for the coop door controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.
//!
//! All switch inputs use the internal pull-up.  Limit and obstruction
//! switches are normally-closed to ground, so they read HIGH when
//! triggered (or when a wire breaks).  Buttons and the mode switch are
//! active-low.

// ---------------------------------------------------------------------------
// Motor driver (A4988-style stepper driver or L298N-style H-bridge)
// ---------------------------------------------------------------------------

/// Digital output: driver enable / sleep line.  HIGH = powered.
pub const MOTOR_EN_GPIO: i32 = 14;
/// Digital output: stepper DIR line, or IN1 on an H-bridge.
pub const MOTOR_DIR_GPIO: i32 = 27;
/// Digital output: IN2 on an H-bridge (unused by the stepper variant).
pub const MOTOR_IN2_GPIO: i32 = 26;
/// LEDC output: stepper STEP pulse train.  Frequency = step rate.
pub const MOTOR_STEP_GPIO: i32 = 13;

/// Initial LEDC timer frequency for the step pulse (re-tuned on every ramp step).
pub const MOTOR_STEP_BASE_FREQ_HZ: u32 = 200;

// ---------------------------------------------------------------------------
// Travel switches (normally closed, HIGH = triggered)
// ---------------------------------------------------------------------------

/// Close limit: stops the motor at the bottom of travel.
pub const CLOSE_LIMIT_GPIO: i32 = 32;
/// Open limit: stops the motor at the top of travel.
pub const OPEN_LIMIT_GPIO: i32 = 33;
/// Obstruction: the motor mount flexes and touches this switch when the
/// door meets resistance while closing.  GPIO 35 is input-only with no
/// internal pull-up, so the board carries an external 10 kΩ.
pub const OBSTRUCTION_LIMIT_GPIO: i32 = 35;

// ---------------------------------------------------------------------------
// User inputs (active LOW)
// ---------------------------------------------------------------------------

/// Manual open button.  Also the ext0 deep-sleep wake source.
pub const MANUAL_OPEN_GPIO: i32 = 15;
/// Manual close button.  Also the ext1 deep-sleep wake source.
pub const MANUAL_CLOSE_GPIO: i32 = 4;
/// Auto / manual mode switch.  LOW = auto, HIGH = manual.
pub const MODE_SWITCH_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// On-board LED (heartbeat).
pub const STATUS_LED_GPIO: i32 = 2;
/// Enclosure activity LED, mirrors the heartbeat.
pub const ACTIVITY_LED_GPIO: i32 = 19;
