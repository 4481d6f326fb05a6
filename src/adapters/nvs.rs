//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the coop door.
//!
//! - The configuration record is the portal's JSON document, stored as a
//!   single blob under `coop/config` and range-checked on every load and
//!   before every save.
//! - Each subsystem uses its own namespace; keys are at most 15 bytes.
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::CoopConfig;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub const CONFIG_NAMESPACE: &str = "coop";
pub const CONFIG_KEY: &str = "config";

const MAX_BLOB_SIZE: usize = 4000;

/// Seconds in a day; offsets must stay strictly inside it.
const DAY_SECS: i64 = 86_400;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name (namespace or key).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Read a whole blob of unknown size (bounded by [`MAX_BLOB_SIZE`]).
    #[cfg(target_os = "espidf")]
    fn read_blob(namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let key = Self::c_name(key);
        let result = Self::with_nvs_handle(namespace, false, |handle| {
            let mut size: usize = 0;

            // First call: get size
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });
        result.map_err(|e| {
            if e == ESP_ERR_NVS_NOT_FOUND {
                StorageError::NotFound
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.store
            .borrow()
            .get(&Self::composite_key(namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    /// Store raw JSON exactly as the provisioning portal submitted it.
    /// The record must parse and validate before it is written.
    pub fn store_config_json(&mut self, json: &str) -> Result<CoopConfig, ConfigError> {
        let cfg = parse_config(json.as_bytes())?;
        self.write(CONFIG_NAMESPACE, CONFIG_KEY, json.as_bytes())
            .map_err(ConfigError::from)?;
        info!("NvsAdapter: portal config stored ({} bytes)", json.len());
        Ok(cfg)
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => ConfigError::NotFound,
            StorageError::Full => ConfigError::StorageFull,
            StorageError::IoError => ConfigError::IoError,
        }
    }
}

/// Parse and range-check a stored configuration record.
pub fn parse_config(bytes: &[u8]) -> Result<CoopConfig, ConfigError> {
    if bytes.len() > MAX_BLOB_SIZE {
        return Err(ConfigError::Corrupted);
    }
    let cfg: CoopConfig = serde_json::from_slice(bytes).map_err(|_| ConfigError::Corrupted)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn validate_config(cfg: &CoopConfig) -> Result<(), ConfigError> {
    let m = &cfg.motor_tuning;
    if m.motor_min == 0 {
        return Err(ConfigError::ValidationFailed("motor_min must be > 0"));
    }
    if m.motor_min >= m.motor_max {
        return Err(ConfigError::ValidationFailed("motor_min must be < motor_max"));
    }
    if m.ramp_steps == 0 {
        return Err(ConfigError::ValidationFailed("ramp_steps must be > 0"));
    }
    if cfg.time.sunrise_offset.abs() >= DAY_SECS {
        return Err(ConfigError::ValidationFailed("sunrise_offset must be within one day"));
    }
    if cfg.time.sunset_offset.abs() >= DAY_SECS {
        return Err(ConfigError::ValidationFailed("sunset_offset must be within one day"));
    }
    if !(-90.0..=90.0).contains(&cfg.location.lat) {
        return Err(ConfigError::ValidationFailed("lat must be -90..90"));
    }
    if !(-180.0..=180.0).contains(&cfg.location.lng) {
        return Err(ConfigError::ValidationFailed("lng must be -180..180"));
    }
    if cfg.tuning.operation_timeout_secs == 0 {
        return Err(ConfigError::ValidationFailed("operation_timeout_secs must be > 0"));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<CoopConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let bytes = self.read_blob(CONFIG_NAMESPACE, CONFIG_KEY)?;

        #[cfg(target_os = "espidf")]
        let bytes = Self::read_blob(CONFIG_NAMESPACE, CONFIG_KEY).inspect_err(|e| {
            warn!("NvsAdapter: config read failed: {}", e);
        })?;

        let cfg = parse_config(&bytes)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&mut self, config: &CoopConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = serde_json::to_vec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::StorageFull);
        }
        self.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let data = self.read_blob(namespace, key)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if data.len() > MAX_BLOB_SIZE {
                return Err(StorageError::Full);
            }
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe {
                    nvs_find_key(handle, key.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}
