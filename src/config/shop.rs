//! Shop seed configuration loading from config.toml
//!
//! The values here seed the settings row the first time the service starts
//! against an empty database. After that the database is authoritative and
//! admins change settings through the API.

use crate::core::schedule::ScheduleConfig;
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Shop defaults used to seed the settings row
    #[serde(default)]
    pub shop: ShopConfig,
    /// Background reminder sweep timing
    #[serde(default)]
    pub reminders: ReminderConfig,
}

/// Initial shop settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ShopConfig {
    /// Display name
    pub name: String,
    /// Street address
    pub address: String,
    /// IANA time zone of the shop (e.g. `America/Sao_Paulo`)
    pub timezone: String,
    /// Slot length in minutes
    pub slot_duration_minutes: u32,
    /// Client cancellation notice in hours
    pub cancellation_window_hours: u32,
    /// Opening hours, weekly or legacy shape
    pub schedule: ScheduleConfig,
    /// Holidays
    pub closed_days: Vec<NaiveDate>,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            name: "Studio John Pool".to_string(),
            address: String::new(),
            timezone: "America/Sao_Paulo".to_string(),
            slot_duration_minutes: 30,
            cancellation_window_hours: 2,
            schedule: ScheduleConfig::default(),
            closed_days: Vec::new(),
        }
    }
}

/// Timing of the appointment reminder sweep
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ReminderConfig {
    /// Minutes between sweeps
    pub interval_minutes: u64,
    /// How far ahead, in minutes, an appointment is considered upcoming
    pub lead_minutes: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            lead_minutes: 45,
        }
    }
}

impl ReminderConfig {
    /// Sweep period as a tokio-friendly duration
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    /// Look-ahead window
    #[must_use]
    pub fn lead(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lead_minutes)
    }
}

/// Loads shop configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A schedule time is not zero-padded `HH:mm`
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the config from `path`, falling back to built-in defaults when the file is absent.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Config> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        tracing::warn!(
            "No config file at {:?}, using built-in shop defaults",
            path.as_ref()
        );
        Ok(Config::default())
    }
}
