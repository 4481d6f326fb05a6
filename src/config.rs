//! System configuration parameters.
//!
//! Mirrors the JSON record written by the provisioning portal
//! (`wifi`, `location`, `time`, `pushover`, `motor_tuning`) plus a
//! `tuning` section whose fields all have defaults, so a portal-written
//! record without it still loads.
//!
//! The portal stores form values verbatim, so every numeric field also
//! accepts a numeric string (`"-600"` as well as `-600`).

use core::fmt::Display;
use core::str::FromStr;

use heapless::String;
use serde::{Deserialize, Deserializer, Serialize};

use crate::drivers::motor::{MotorKind, RampProfile};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoopConfig {
    pub wifi: WifiSection,
    pub location: LocationSection,
    pub time: TimeSection,
    pub pushover: PushoverSection,
    pub motor_tuning: MotorTuning,
    #[serde(default)]
    pub tuning: Tuning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiSection {
    pub ssid: String<32>,
    pub passphrase: String<64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSection {
    #[serde(deserialize_with = "number_or_string")]
    pub lat: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub lng: f64,
}

/// Signed offsets (seconds) added to every sunrise / sunset timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSection {
    #[serde(deserialize_with = "number_or_string")]
    pub sunrise_offset: i64,
    #[serde(deserialize_with = "number_or_string")]
    pub sunset_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushoverSection {
    pub app_token: String<32>,
    pub group_key: String<32>,
}

/// Stepper ramp tuning as entered in the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorTuning {
    /// Step rate (Hz) at the start and end of every move.
    #[serde(deserialize_with = "number_or_string")]
    pub motor_min: u32,
    /// Cruise step rate (Hz).
    #[serde(deserialize_with = "number_or_string")]
    pub motor_max: u32,
    /// Duration of one full ramp (ms).
    #[serde(deserialize_with = "number_or_string")]
    pub ramp_time: u32,
    /// Number of frequency increments in one ramp.
    #[serde(deserialize_with = "number_or_string")]
    pub ramp_steps: u32,
}

/// Firmware tuning knobs.  Not exposed by the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub motor_kind: MotorKind,
    /// Longest a single move may keep the motor enabled.
    pub operation_timeout_secs: u32,
    /// Back-off cycles on obstruction before giving up and opening.
    pub obstruction_retries: u8,
    /// How long the door reverses on each obstruction back-off.
    pub backoff_ms: u32,
    /// Settle time before a timed deep sleep.
    pub sleep_grace_secs: u32,
    /// Manual mode: sleep after this long without a button press.
    pub manual_idle_secs: u32,
    /// Auto mode: stay awake if the next operation is closer than this.
    pub min_sleep_secs: u32,
    pub notify_attempts: u8,
    pub notify_backoff_ms: u32,
    /// Heartbeat half-period while booting or moving.
    pub blink_active_ms: u32,
    /// Heartbeat half-period while idle.
    pub blink_idle_ms: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            motor_kind: MotorKind::Stepper,
            operation_timeout_secs: 120,
            obstruction_retries: 2,
            backoff_ms: 3_000,
            sleep_grace_secs: 30,
            manual_idle_secs: 60,
            min_sleep_secs: 120,
            notify_attempts: 5,
            notify_backoff_ms: 5_000,
            blink_active_ms: 100,
            blink_idle_ms: 500,
        }
    }
}

impl CoopConfig {
    /// Derive the linear ramp used by the stepper driver.
    ///
    /// `step` is never zero so a ramp always terminates, even when
    /// `ramp_steps` exceeds the frequency span.
    pub fn ramp_profile(&self) -> RampProfile {
        let t = &self.motor_tuning;
        let steps = t.ramp_steps.max(1);
        RampProfile {
            min_freq: t.motor_min,
            max_freq: t.motor_max,
            step: (t.motor_max.saturating_sub(t.motor_min) / steps).max(1),
            step_interval_ms: t.ramp_time / steps,
        }
    }

    pub fn operation_timeout_ms(&self) -> u32 {
        self.tuning.operation_timeout_secs.saturating_mul(1_000)
    }

    /// Worst case for delivering one notification: every attempt runs
    /// into `request_timeout_ms` and is followed by a back-off.
    pub fn notify_deadline_ms(&self, request_timeout_ms: u32) -> u32 {
        u32::from(self.tuning.notify_attempts.max(1))
            .saturating_mul(request_timeout_ms.saturating_add(self.tuning.notify_backoff_ms))
    }
}

/// Accept `12`, `12.5` or `"12"` for any numeric field.
fn number_or_string<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<T> {
        Value(T),
        Text(std::string::String),
    }

    match Lenient::<T>::deserialize(de)? {
        Lenient::Value(v) => Ok(v),
        Lenient::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
pub(crate) fn sample_config() -> CoopConfig {
    CoopConfig {
        wifi: WifiSection {
            ssid: String::try_from("coopnet").unwrap(),
            passphrase: String::try_from("hunter22").unwrap(),
        },
        location: LocationSection { lat: 45.52, lng: -122.68 },
        time: TimeSection { sunrise_offset: 7_200, sunset_offset: -600 },
        pushover: PushoverSection {
            app_token: String::try_from("atoken").unwrap(),
            group_key: String::try_from("gkey").unwrap(),
        },
        motor_tuning: MotorTuning {
            motor_min: 200,
            motor_max: 1_000,
            ramp_time: 1_000,
            ramp_steps: 8,
        },
        tuning: Tuning::default(),
    }
}
