//! NVS overrides for network settings, with schema versioning.
//!
//! The device reads Wi-Fi credentials and the server address from flash if a
//! provisioning tool stored them there. Nothing is written back at runtime.
//!
//! # Version History
//!
//! - **v1** (current): `ssid`, `password`, `server`
//!
//! A missing version key means nothing was provisioned. A version newer than
//! this firmware understands is refused rather than half-read.

use crate::config::DeviceConfig;

use core::cmp::Ordering;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;

/// Current NVS schema version for network overrides.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// NVS namespace for device configuration.
pub const NVS_NAMESPACE: &str = "caption_cfg";

/// NVS key for schema version.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const VERSION_KEY: &str = "schema_ver";

/// Longest string value read back (SSID 32, WPA2 passphrase 64, plus NUL).
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_VALUE_LEN: usize = 65;

/// Load result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResult {
    /// Nothing stored, build-time defaults kept
    FreshInstall,
    /// Overrides applied
    Applied,
}

/// NVS operation errors.
#[derive(Debug)]
pub enum NvsError {
    /// NVS namespace could not be opened
    #[cfg(target_os = "espidf")]
    InitFailed(EspError),
    /// Schema version too new (downgrade not supported)
    TooNew { stored_version: u32 },
    /// NVS read error
    #[cfg(target_os = "espidf")]
    IoError(EspError),
    /// Feature not available on this platform
    #[cfg(not(target_os = "espidf"))]
    NotAvailable,
}

#[cfg(target_os = "espidf")]
impl From<EspError> for NvsError {
    fn from(e: EspError) -> Self {
        NvsError::IoError(e)
    }
}

/// Decide what to do with a namespace written at `stored_version`
/// (0 = no version key).
pub fn check_schema(stored_version: u32) -> Result<LoadResult, NvsError> {
    match stored_version.cmp(&CURRENT_SCHEMA_VERSION) {
        Ordering::Equal => Ok(LoadResult::Applied),
        Ordering::Less => Ok(LoadResult::FreshInstall),
        Ordering::Greater => Err(NvsError::TooNew { stored_version }),
    }
}

/// Apply overrides stored in NVS to `config`.
///
/// Fields not present in flash keep their current value.
///
/// # Returns
///
/// - `Ok(LoadResult)`: overrides applied (or none stored)
/// - `Err(NvsError::TooNew)`: written by newer firmware, left untouched
/// - `Err(NvsError)`: other NVS errors; `config` may be partially updated
#[cfg(target_os = "espidf")]
pub fn load_overrides(
    partition: EspDefaultNvsPartition,
    config: &mut DeviceConfig,
) -> Result<LoadResult, NvsError> {
    let storage = EspNvs::new(partition, NVS_NAMESPACE, true).map_err(NvsError::InitFailed)?;

    let stored_version = storage.get_u32(VERSION_KEY)?.unwrap_or(0);
    let result = check_schema(stored_version)?;
    if result == LoadResult::Applied {
        load_v1_overrides(&storage, config)?;
    }
    Ok(result)
}

/// Stub for non-ESP platforms
#[cfg(not(target_os = "espidf"))]
pub fn load_overrides(_config: &mut DeviceConfig) -> Result<LoadResult, NvsError> {
    Err(NvsError::NotAvailable)
}

#[cfg(target_os = "espidf")]
fn load_v1_overrides(
    storage: &EspNvs<NvsDefault>,
    config: &mut DeviceConfig,
) -> Result<(), NvsError> {
    let mut buf = [0u8; MAX_VALUE_LEN];

    if let Some(ssid) = storage.get_str("ssid", &mut buf)? {
        config.ssid = ssid.to_string();
    }
    if let Some(password) = storage.get_str("password", &mut buf)? {
        // Empty string marks an open network.
        config.password = (!password.is_empty()).then(|| password.to_string());
    }
    if let Some(server) = storage.get_str("server", &mut buf)? {
        config.server = server.to_string();
    }

    Ok(())
}
