//! Shop settings business logic.
//!
//! The settings row is a lazily-created singleton stored under the fixed key
//! [`SETTINGS_ID`]. Creation is an insert that loses gracefully to a concurrent
//! insert, after which the winner's row is re-read. Every read goes through
//! [`ShopSettings`], which parses the stored JSON documents and resolves the
//! opening hours once; callers never see the raw row.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use sea_orm::{ConnectionTrait, EntityTrait, Set, prelude::*};
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    config::shop::ShopConfig,
    core::{
        principal::Principal,
        schedule::{DayHours, ScheduleConfig, TimeOfDay, WeeklySchedule},
    },
    entities::{ShopSetting, shop_setting},
    errors::{Error, Result, is_unique_violation},
};

/// Primary key of the one settings row.
pub const SETTINGS_ID: i64 = 1;

const DEFAULT_SLOT_MINUTES: u32 = 30;
const MAX_SLOT_MINUTES: u32 = 24 * 60;

fn serialize_tz<S: Serializer>(tz: &Tz, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(tz.name())
}

/// Parsed, resolved shop settings.
#[derive(Debug, Clone, Serialize)]
pub struct ShopSettings {
    pub shop_name: String,
    pub address: String,
    #[serde(serialize_with = "serialize_tz")]
    pub timezone: Tz,
    pub slot_duration_minutes: u32,
    pub cancellation_window_hours: u32,
    /// Opening hours in the shape they were configured in
    pub schedule: ScheduleConfig,
    pub closed_days: BTreeSet<NaiveDate>,
    #[serde(skip)]
    resolved: WeeklySchedule,
}

impl Default for ShopSettings {
    fn default() -> Self {
        let config = ShopConfig::default();
        let resolved = config.schedule.resolve();
        Self {
            shop_name: config.name,
            address: config.address,
            timezone: chrono_tz::America::Sao_Paulo,
            slot_duration_minutes: config.slot_duration_minutes,
            cancellation_window_hours: config.cancellation_window_hours,
            schedule: config.schedule,
            closed_days: BTreeSet::new(),
            resolved,
        }
    }
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>().map_err(|e| Error::Config {
        message: format!("Unknown time zone {name:?}: {e}"),
    })
}

impl ShopSettings {
    /// Builds settings from the seed configuration.
    ///
    /// # Errors
    /// Returns an error if the time zone is unknown or the schedule is invalid.
    pub fn from_config(config: &ShopConfig) -> Result<Self> {
        config.schedule.validate()?;
        Ok(Self {
            shop_name: config.name.clone(),
            address: config.address.clone(),
            timezone: parse_timezone(&config.timezone)?,
            slot_duration_minutes: checked_slot_minutes(config.slot_duration_minutes)?,
            cancellation_window_hours: config.cancellation_window_hours,
            resolved: config.schedule.resolve(),
            schedule: config.schedule.clone(),
            closed_days: config.closed_days.iter().copied().collect(),
        })
    }

    fn from_model(model: &shop_setting::Model) -> Result<Self> {
        let schedule: ScheduleConfig = serde_json::from_value(model.schedule.clone())
            .map_err(|e| Error::Config {
                message: format!("Stored schedule is malformed: {e}"),
            })?;
        let closed_days: Vec<NaiveDate> = serde_json::from_value(model.closed_days.clone())
            .map_err(|e| Error::Config {
                message: format!("Stored closed days are malformed: {e}"),
            })?;

        Ok(Self {
            shop_name: model.shop_name.clone(),
            address: model.address.clone(),
            timezone: parse_timezone(&model.timezone)?,
            slot_duration_minutes: u32::try_from(model.slot_duration_minutes)
                .ok()
                .filter(|m| *m > 0)
                .unwrap_or(DEFAULT_SLOT_MINUTES),
            cancellation_window_hours: u32::try_from(model.cancellation_window_hours)
                .unwrap_or_default(),
            resolved: schedule.resolve(),
            schedule,
            closed_days: closed_days.into_iter().collect(),
        })
    }

    fn to_active_model(&self) -> Result<shop_setting::ActiveModel> {
        let to_json = |what: &str, value: serde_json::Result<Json>| {
            value.map_err(|e| Error::Config {
                message: format!("Failed to encode {what}: {e}"),
            })
        };
        Ok(shop_setting::ActiveModel {
            shop_name: Set(self.shop_name.clone()),
            address: Set(self.address.clone()),
            timezone: Set(self.timezone.name().to_string()),
            slot_duration_minutes: Set(i32::try_from(self.slot_duration_minutes).unwrap_or(30)),
            cancellation_window_hours: Set(
                i32::try_from(self.cancellation_window_hours).unwrap_or(i32::MAX)
            ),
            schedule: Set(to_json("schedule", serde_json::to_value(&self.schedule))?),
            closed_days: Set(to_json(
                "closed days",
                serde_json::to_value(&self.closed_days),
            )?),
            updated_at: Set(Utc::now()),
            id: Set(SETTINGS_ID),
        })
    }

    /// Slot length as a duration.
    #[must_use]
    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_duration_minutes))
    }

    /// Client cancellation notice as a duration.
    #[must_use]
    pub fn cancellation_window(&self) -> Duration {
        Duration::hours(i64::from(self.cancellation_window_hours))
    }

    /// Calendar day of `at` on the shop's wall clock.
    #[must_use]
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }

    /// Wall-clock time of `at`, truncated to the minute.
    #[must_use]
    pub fn local_time(&self, at: DateTime<Utc>) -> TimeOfDay {
        TimeOfDay::from_time(at.with_timezone(&self.timezone).time())
    }

    /// The instant at which the shop's clock shows `time` on `date`.
    /// `None` when that wall-clock time is skipped by a DST change; when a
    /// fall-back repeats it, the first (pre-transition) instant is used.
    #[must_use]
    pub fn instant_at(&self, date: NaiveDate, time: TimeOfDay) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(time.as_naive()))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }

    /// `[local midnight of date, +24h)`, the window searched for existing bookings.
    pub fn day_window(&self, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self
            .instant_at(date, TimeOfDay::hm(0, 0))
            .ok_or_else(|| Error::validation(format!("{date} has no local midnight")))?;
        Ok((start, start + Duration::hours(24)))
    }

    /// Whether `date` is one of the configured holidays.
    #[must_use]
    pub fn is_closed_date(&self, date: NaiveDate) -> bool {
        self.closed_days.contains(&date)
    }

    /// Opening hours for the weekday of `date`, ignoring holidays.
    #[must_use]
    pub fn weekday_hours(&self, date: NaiveDate) -> Option<&DayHours> {
        self.resolved.hours_for(date.weekday())
    }

    /// Effective hours of `date`: weekday hours unless the date is a holiday.
    #[must_use]
    pub fn effective_hours(&self, date: NaiveDate) -> Option<&DayHours> {
        if self.is_closed_date(date) {
            return None;
        }
        self.weekday_hours(date)
    }
}

fn checked_slot_minutes(minutes: u32) -> Result<u32> {
    if minutes == 0 || minutes > MAX_SLOT_MINUTES {
        return Err(Error::validation(format!(
            "slot duration must be between 1 and {MAX_SLOT_MINUTES} minutes, got {minutes}"
        )));
    }
    Ok(minutes)
}

/// Partial update of the settings; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub shop_name: Option<String>,
    pub address: Option<String>,
    pub timezone: Option<String>,
    pub slot_duration_minutes: Option<u32>,
    pub cancellation_window_hours: Option<u32>,
    pub schedule: Option<ScheduleConfig>,
    pub closed_days: Option<Vec<NaiveDate>>,
}

async fn find_settings_row<C>(db: &C) -> Result<Option<shop_setting::Model>>
where
    C: ConnectionTrait,
{
    ShopSetting::find_by_id(SETTINGS_ID)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Stores `settings` as the singleton row unless it already exists.
/// Returns `false` when another writer created it first.
async fn insert_if_missing<C>(db: &C, settings: &ShopSettings) -> Result<bool>
where
    C: ConnectionTrait,
{
    match settings.to_active_model()?.insert(db).await {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn require_settings_row<C>(db: &C) -> Result<shop_setting::Model>
where
    C: ConnectionTrait,
{
    find_settings_row(db)
        .await?
        .ok_or_else(|| Error::not_found("ShopSettings", SETTINGS_ID))
}

/// Loads the settings, or the shop defaults if none were ever saved.
pub async fn load_settings<C>(db: &C) -> Result<ShopSettings>
where
    C: ConnectionTrait,
{
    match find_settings_row(db).await? {
        Some(model) => ShopSettings::from_model(&model),
        None => Ok(ShopSettings::default()),
    }
}

/// Loads the settings, persisting the defaults first if the row does not exist yet.
pub async fn get_or_create_settings(db: &DatabaseConnection) -> Result<ShopSettings> {
    if let Some(model) = find_settings_row(db).await? {
        return ShopSettings::from_model(&model);
    }
    if insert_if_missing(db, &ShopSettings::default()).await? {
        tracing::info!("Created default shop settings");
    }
    ShopSettings::from_model(&require_settings_row(db).await?)
}

/// Seeds the settings row from config.toml. Returns `false` when a row already exists.
pub async fn seed_settings(db: &DatabaseConnection, config: &ShopConfig) -> Result<bool> {
    if find_settings_row(db).await?.is_some() {
        return Ok(false);
    }
    let settings = ShopSettings::from_config(config)?;
    let inserted = insert_if_missing(db, &settings).await?;
    if inserted {
        tracing::info!(
            "Seeded shop settings for {:?} ({})",
            settings.shop_name,
            settings.timezone.name()
        );
    }
    Ok(inserted)
}

/// Applies an admin's partial update and returns the new settings.
///
/// # Errors
/// Returns an error if:
/// - The caller is not an admin
/// - The time zone is unknown, the slot duration is out of range, or the schedule is invalid
/// - The database write fails
pub async fn update_settings(
    db: &DatabaseConnection,
    principal: &Principal,
    update: SettingsUpdate,
) -> Result<ShopSettings> {
    principal.require_admin()?;

    insert_if_missing(db, &ShopSettings::default()).await?;
    let mut settings = ShopSettings::from_model(&require_settings_row(db).await?)?;

    if let Some(name) = update.shop_name {
        if name.trim().is_empty() {
            return Err(Error::validation("shop name cannot be empty"));
        }
        settings.shop_name = name.trim().to_string();
    }
    if let Some(address) = update.address {
        settings.address = address;
    }
    if let Some(tz) = update.timezone {
        settings.timezone =
            parse_timezone(&tz).map_err(|_| Error::validation(format!("unknown time zone {tz:?}")))?;
    }
    if let Some(minutes) = update.slot_duration_minutes {
        settings.slot_duration_minutes = checked_slot_minutes(minutes)?;
    }
    if let Some(hours) = update.cancellation_window_hours {
        settings.cancellation_window_hours = hours;
    }
    if let Some(schedule) = update.schedule {
        schedule.validate()?;
        settings.resolved = schedule.resolve();
        settings.schedule = schedule;
    }
    if let Some(days) = update.closed_days {
        settings.closed_days = days.into_iter().collect();
    }

    settings.to_active_model()?.update(db).await?;
    tracing::info!("Shop settings updated by user {}", principal.id);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::principal::Role;
    use crate::core::schedule::DayEntry;
    use crate::test_utils::*;
    use chrono::Weekday;

    #[tokio::test]
    async fn test_load_settings_defaults_without_row() -> Result<()> {
        let db = setup_test_db().await?;

        let settings = load_settings(&db).await?;
        assert_eq!(settings.slot_duration_minutes, 30);
        assert_eq!(settings.cancellation_window_hours, 2);
        // Loading alone never writes
        assert!(ShopSetting::find().one(&db).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_or_create_persists_once() -> Result<()> {
        let db = setup_test_db().await?;

        get_or_create_settings(&db).await?;
        get_or_create_settings(&db).await?;
        assert_eq!(ShopSetting::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_create_one_row() -> Result<()> {
        let db = setup_test_db().await?;

        let (a, b) = tokio::join!(get_or_create_settings(&db), get_or_create_settings(&db));
        a?;
        b?;
        assert_eq!(ShopSetting::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_racing_first_read_lands_on_singleton() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = Principal::new(1, Role::Admin);
        let update = SettingsUpdate {
            cancellation_window_hours: Some(9),
            ..SettingsUpdate::default()
        };

        let (read, updated) = tokio::join!(
            get_or_create_settings(&db),
            update_settings(&db, &admin, update)
        );
        read?;
        updated?;

        assert_eq!(ShopSetting::find().count(&db).await?, 1);
        let row = ShopSetting::find_by_id(SETTINGS_ID).one(&db).await?.unwrap();
        assert_eq!(row.cancellation_window_hours, 9);
        assert_eq!(load_settings(&db).await?.cancellation_window_hours, 9);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_settings_only_when_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let config = ShopConfig {
            name: "Navalha".to_string(),
            timezone: "UTC".to_string(),
            ..ShopConfig::default()
        };

        assert!(seed_settings(&db, &config).await?);
        assert!(!seed_settings(&db, &ShopConfig::default()).await?);

        let settings = load_settings(&db).await?;
        assert_eq!(settings.shop_name, "Navalha");
        assert_eq!(settings.timezone, chrono_tz::UTC);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_settings_requires_admin() -> Result<()> {
        let db = setup_test_db().await?;
        let barber = Principal::new(2, Role::Barber);

        let result = update_settings(&db, &barber, SettingsUpdate::default()).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_settings_switches_schedule_shape() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = Principal::new(1, Role::Admin);

        let update = SettingsUpdate {
            schedule: Some(ScheduleConfig::Weekly {
                days: vec![DayEntry {
                    day: 0,
                    active: true,
                    period1_start: Some(TimeOfDay::hm(10, 0)),
                    period1_end: Some(TimeOfDay::hm(14, 0)),
                    period2_start: None,
                    period2_end: None,
                }],
            }),
            closed_days: Some(vec![NaiveDate::from_ymd_opt(2031, 1, 1).unwrap()]),
            cancellation_window_hours: Some(4),
            ..SettingsUpdate::default()
        };
        update_settings(&db, &admin, update).await?;

        let settings = load_settings(&db).await?;
        assert_eq!(settings.cancellation_window_hours, 4);
        // 2031-01-05 is a Sunday
        let sunday = NaiveDate::from_ymd_opt(2031, 1, 5).unwrap();
        assert_eq!(sunday.weekday(), Weekday::Sun);
        assert!(settings.effective_hours(sunday).is_some());
        assert!(settings.effective_hours(sunday.succ_opt().unwrap()).is_none());
        assert!(settings.is_closed_date(NaiveDate::from_ymd_opt(2031, 1, 1).unwrap()));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_settings_rejects_zero_slot() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = Principal::new(1, Role::Admin);

        let update = SettingsUpdate {
            slot_duration_minutes: Some(0),
            ..SettingsUpdate::default()
        };
        let result = update_settings(&db, &admin, update).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[test]
    fn test_holiday_overrides_open_weekday() {
        let mut settings = ShopSettings::default();
        // 2030-06-04 is a Tuesday
        let tuesday = NaiveDate::from_ymd_opt(2030, 6, 4).unwrap();
        assert!(settings.effective_hours(tuesday).is_some());

        settings.closed_days.insert(tuesday);
        assert!(settings.effective_hours(tuesday).is_none());
        assert!(settings.weekday_hours(tuesday).is_some());
    }

    #[test]
    fn test_local_midnight_respects_timezone() {
        let settings = ShopSettings::default();
        let date = NaiveDate::from_ymd_opt(2030, 6, 4).unwrap();
        let (start, end) = settings.day_window(date).unwrap();

        // Sao Paulo is UTC-3 with no DST
        assert_eq!(start.to_rfc3339(), "2030-06-04T03:00:00+00:00");
        assert_eq!(end - start, Duration::hours(24));
        assert_eq!(settings.local_date(start), date);
    }

    #[test]
    fn test_instant_at_repeated_hour_takes_first_occurrence() {
        let settings = ShopSettings {
            timezone: chrono_tz::America::New_York,
            ..ShopSettings::default()
        };
        // Clocks fall back from 02:00 EDT to 01:00 EST on 2030-11-03
        let date = NaiveDate::from_ymd_opt(2030, 11, 3).unwrap();
        let at = settings.instant_at(date, TimeOfDay::hm(1, 30)).unwrap();
        assert_eq!(at.to_rfc3339(), "2030-11-03T05:30:00+00:00");

        // Spring forward on 2030-03-10 skips 02:00-03:00
        let spring = NaiveDate::from_ymd_opt(2030, 3, 10).unwrap();
        assert!(settings.instant_at(spring, TimeOfDay::hm(2, 30)).is_none());
    }
}
