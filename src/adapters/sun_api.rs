//! sunrise-sunset.org client.
//!
//! Implements [`SunTimesPort`].  The request URL and response parsing are
//! plain functions so they run on the host; only the HTTP call itself is
//! device-only.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::app::ports::{SunTimesError, SunTimesPort};
use crate::scheduler::SunTimes;

const API_BASE: &str = "https://api.sunrise-sunset.org/json";

#[derive(Deserialize)]
struct SunStatus {
    status: String,
}

#[derive(Deserialize)]
struct SunResponse {
    results: SunResults,
}

#[derive(Deserialize)]
struct SunResults {
    sunrise: String,
    sunset: String,
}

/// Query URL for one UTC calendar day, ISO 8601 timestamps requested.
pub fn build_url(lat: f64, lng: f64, date: NaiveDate) -> String {
    format!(
        "{}?lat={}&lng={}&formatted=0&date={}",
        API_BASE,
        lat,
        lng,
        date.format("%Y-%m-%d")
    )
}

/// Extract sunrise and sunset (Unix seconds) from an API response body.
pub fn parse_sun_response(body: &str) -> Result<SunTimes, SunTimesError> {
    // On error `results` is an empty string, so check the status first.
    let status: SunStatus = serde_json::from_str(body).map_err(|_| SunTimesError::Malformed)?;
    if status.status != "OK" {
        return Err(SunTimesError::Rejected);
    }
    let results = serde_json::from_str::<SunResponse>(body)
        .map_err(|_| SunTimesError::Malformed)?
        .results;
    Ok(SunTimes {
        sunrise: parse_timestamp(&results.sunrise)?,
        sunset: parse_timestamp(&results.sunset)?,
    })
}

fn parse_timestamp(s: &str) -> Result<i64, SunTimesError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp())
        .map_err(|_| SunTimesError::Malformed)
}

pub struct SunApiClient {
    #[cfg(target_os = "espidf")]
    http: crate::adapters::http::HttpsClient,
}

impl SunApiClient {
    #[cfg(target_os = "espidf")]
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            http: crate::adapters::http::HttpsClient::new(std::time::Duration::from_secs(30))?,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {})
    }
}

impl SunTimesPort for SunApiClient {
    #[cfg(target_os = "espidf")]
    fn sun_times(&mut self, lat: f64, lng: f64, date: NaiveDate) -> Result<SunTimes, SunTimesError> {
        let url = build_url(lat, lng, date);
        log::info!("SCHED | querying sun times for {}", date);
        let (status, body) = self.http.get(&url).map_err(|e| {
            log::warn!("SCHED | sun-time request failed: {:?}", e);
            SunTimesError::Unreachable
        })?;
        if !(200..300).contains(&status) {
            log::warn!("SCHED | sun-time API status {}", status);
            return Err(SunTimesError::Rejected);
        }
        let body = core::str::from_utf8(&body).map_err(|_| SunTimesError::Malformed)?;
        parse_sun_response(body)
    }

    #[cfg(not(target_os = "espidf"))]
    fn sun_times(&mut self, lat: f64, lng: f64, date: NaiveDate) -> Result<SunTimes, SunTimesError> {
        log::info!("SCHED | (sim) no network for {}", build_url(lat, lng, date));
        Err(SunTimesError::Unreachable)
    }
}
