//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions, the LEDC step-pulse timer and the per-pin
//! ISR service using raw ESP-IDF sys calls.  Called once from `main()`
//! before the event loop starts.  Host builds get simulation twins so the
//! adapters above this layer run in tests.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::drivers::switches::{SwitchGroup, SwitchId};
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

/// Edge that produces a switch event.
pub fn edge_for(switch: SwitchId) -> Edge {
    match switch.group() {
        // NC to ground: the line goes HIGH when the switch opens.
        Some(SwitchGroup::Limits) => Edge::Rising,
        Some(SwitchGroup::Buttons) => Edge::Falling,
        None => Edge::Any,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Any,
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before event loop; single-threaded.
    unsafe {
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    for switch in SwitchId::ALL {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << switch.gpio(),
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }
    info!("hw_init: switch inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe from any context.
    (unsafe { gpio_get_level(pin) }) != 0
}

// Host simulation: levels default HIGH (pull-ups, nothing pressed).
#[cfg(not(target_os = "espidf"))]
static SIM_LEVELS: [core::sync::atomic::AtomicBool; 40] =
    [const { core::sync::atomic::AtomicBool::new(true) }; 40];

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    SIM_LEVELS
        .get(pin as usize)
        .is_some_and(|l| l.load(core::sync::atomic::Ordering::Relaxed))
}

/// Drive a simulated input level (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_level(pin: i32, high: bool) {
    if let Some(l) = SIM_LEVELS.get(pin as usize) {
        l.store(high, core::sync::atomic::Ordering::Relaxed);
    }
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let output_pins = [
        pins::MOTOR_EN_GPIO,
        pins::MOTOR_DIR_GPIO,
        pins::MOTOR_IN2_GPIO,
        pins::STATUS_LED_GPIO,
        pins::ACTIVITY_LED_GPIO,
    ];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // Motor driver starts unpowered.
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    unsafe {
        gpio_set_level(pin, if high { 1 } else { 0 });
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── LEDC step pulse ───────────────────────────────────────────

pub const LEDC_CH_STEP: u32 = 0;

/// 50 % duty at 8-bit resolution.
#[cfg(target_os = "espidf")]
const STEP_DUTY: u32 = 128;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::MOTOR_STEP_BASE_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    // Duty 0 until the first move: no pulses.
    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: ledc_channel_t_LEDC_CHANNEL_0,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::MOTOR_STEP_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!("hw_init: LEDC configured (step=CH0)");
    Ok(())
}

/// Set the step pulse rate.  `0` stops the pulse train.
#[cfg(target_os = "espidf")]
pub fn ledc_set_step_freq(hz: u32) {
    // SAFETY: the LEDC timer and channel were configured in init_ledc();
    // only the thread that owns the motor calls this.
    unsafe {
        if hz == 0 {
            ledc_stop(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_CH_STEP, 0);
            return;
        }
        ledc_set_freq(ledc_mode_t_LEDC_LOW_SPEED_MODE, ledc_timer_t_LEDC_TIMER_0, hz);
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_CH_STEP, STEP_DUTY);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_CH_STEP);
    }
}

#[cfg(not(target_os = "espidf"))]
static SIM_STEP_FREQ: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set_step_freq(hz: u32) {
    SIM_STEP_FREQ.store(hz, core::sync::atomic::Ordering::Relaxed);
}

/// Last simulated step rate (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_step_freq() -> u32 {
    SIM_STEP_FREQ.load(core::sync::atomic::Ordering::Relaxed)
}

// ── GPIO ISR Service ──────────────────────────────────────────

/// One handler for every switch; `arg` carries the [`SwitchId`] index.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn switch_gpio_isr(arg: *mut core::ffi::c_void) {
    let Some(switch) = SwitchId::from_index(arg as usize) else {
        return;
    };
    crate::drivers::switches::switch_isr_handler(switch, crate::adapters::time::isr_now_ms());
}

/// Install per-pin GPIO ISR service and register the switch handler.
/// Call after init_peripherals() and before the event loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed (acceptable). The handler only touches
    // atomics and the lock-free event queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        for switch in SwitchId::ALL {
            let pin = switch.gpio();
            let intr = match edge_for(switch) {
                Edge::Rising => gpio_int_type_t_GPIO_INTR_POSEDGE,
                Edge::Falling => gpio_int_type_t_GPIO_INTR_NEGEDGE,
                Edge::Any => gpio_int_type_t_GPIO_INTR_ANYEDGE,
            };
            gpio_set_intr_type(pin, intr);
            gpio_isr_handler_add(pin, Some(switch_gpio_isr), switch as usize as *mut core::ffi::c_void);
            gpio_intr_enable(pin);
        }

        info!("hw_init: ISR service installed ({} switches)", SwitchId::ALL.len());
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
