//! Wi-Fi station and SNTP time sync.
//!
//! Auto mode needs the network twice per wake: once to learn the time
//! (SNTP) and once to fetch sun times.  The station connects with a
//! bounded wait; time sync retries until it completes, since nothing in
//! the schedule works without wall time.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `BlockingWifi<EspWifi>` and `EspSntp`.
//! - **all other targets**: a simulation twin for host-side tests.

use core::fmt;
use std::time::Duration;

use log::info;

/// Longest the station waits for an association.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Check portal-entered credentials before handing them to the driver.
pub fn validate_credentials(ssid: &str, password: &str) -> Result<(), ConnectivityError> {
    let ssid = ssid.trim();
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    let password = password.trim();
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

fn auth_for(password: &str) -> AuthKind {
    if password.trim().is_empty() {
        AuthKind::Open
    } else {
        AuthKind::Wpa2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthKind {
    Open,
    Wpa2,
}

// ───────────────────────────────────────────────────────────────
// Station (device)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod station {
    use super::*;
    use anyhow::Context;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sntp::{EspSntp, SyncStatus};
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
    use log::warn;

    pub struct WifiStation<'a> {
        inner: BlockingWifi<EspWifi<'a>>,
        sntp: Option<EspSntp<'static>>,
    }

    impl<'a> WifiStation<'a> {
        pub fn new(modem: Modem, sysloop: EspSystemEventLoop, nvs: EspDefaultNvsPartition) -> anyhow::Result<Self> {
            let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
            let inner = BlockingWifi::wrap(esp_wifi, sysloop)?;
            Ok(Self { inner, sntp: None })
        }

        /// Associate and wait for an IP, bounded by [`CONNECT_TIMEOUT`].
        pub fn connect(&mut self, ssid: &str, password: &str) -> anyhow::Result<()> {
            validate_credentials(ssid, password)?;
            let auth_method = match auth_for(password) {
                AuthKind::Open => AuthMethod::None,
                AuthKind::Wpa2 => AuthMethod::WPA2Personal,
            };
            let ssid = ssid.trim();
            self.inner.set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
                password: password.trim().try_into().map_err(|_| ConnectivityError::InvalidPassword)?,
                auth_method,
                ..Default::default()
            }))?;

            self.inner.start()?;
            info!("WiFi: connecting to '{}'", ssid);
            self.inner.wifi_mut().connect()?;
            self.inner
                .wifi_wait_while(
                    || self.inner.is_connected().map(|c| !c),
                    Some(CONNECT_TIMEOUT),
                )
                .context(ConnectivityError::ConnectionFailed)?;
            self.inner.wait_netif_up()?;

            let ip = self.inner.wifi().sta_netif().get_ip_info()?;
            info!("WiFi: connected, ip {}", ip.ip);
            Ok(())
        }

        pub fn is_connected(&self) -> bool {
            self.inner.is_connected().unwrap_or(false)
        }

        /// Start SNTP and block until the first sync completes.
        pub fn sync_time(&mut self) -> anyhow::Result<()> {
            let sntp = EspSntp::new_default()?;
            info!("WiFi: synchronising time");
            let mut polls: u32 = 0;
            while sntp.get_sync_status() != SyncStatus::Completed {
                std::thread::sleep(Duration::from_millis(500));
                polls += 1;
                if polls % 20 == 0 {
                    warn!("WiFi: still waiting for SNTP ({} s)", polls / 2);
                }
            }
            info!("WiFi: time sync completed");
            self.sntp = Some(sntp);
            Ok(())
        }

        pub fn disconnect(&mut self) -> anyhow::Result<()> {
            self.inner.disconnect()?;
            self.inner.stop()?;
            Ok(())
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Station (host simulation)
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod station {
    use super::*;

    #[derive(Debug, Default)]
    pub struct WifiStation {
        connected: bool,
        synced: bool,
    }

    impl WifiStation {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn connect(&mut self, ssid: &str, password: &str) -> anyhow::Result<()> {
            validate_credentials(ssid, password)?;
            info!("WiFi(sim): connected to '{}' ({:?})", ssid.trim(), auth_for(password));
            self.connected = true;
            Ok(())
        }

        pub fn is_connected(&self) -> bool {
            self.connected
        }

        pub fn sync_time(&mut self) -> anyhow::Result<()> {
            if !self.connected {
                return Err(ConnectivityError::ConnectionFailed.into());
            }
            self.synced = true;
            Ok(())
        }

        pub fn is_synced(&self) -> bool {
            self.synced
        }

        pub fn disconnect(&mut self) -> anyhow::Result<()> {
            self.connected = false;
            Ok(())
        }
    }
}

pub use station::WifiStation;
