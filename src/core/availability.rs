//! Slot availability and booking validation.
//!
//! Slot listing and booking validation derive the effective hours of a day from
//! the same [`ShopSettings`] methods, so any slot reported as available passes
//! [`validate_booking`] unless another booking lands on it first. Booking
//! conflicts are decided by exact start-instant equality with a non-cancelled
//! appointment of the same barber; the partial unique index on
//! `(barber_id, scheduled_at)` makes the final insert the arbiter when two
//! requests race.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        principal::Principal,
        schedule::TimeOfDay,
        settings::{ShopSettings, load_settings},
    },
    entities::{Appointment, AppointmentStatus, Service, appointment},
    errors::{Error, Result, is_unique_violation},
};

/// One bookable time unit of a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// Wall-clock start, `HH:mm`
    pub time: String,
    /// Start instant
    pub iso: DateTime<Utc>,
    /// In the future and not booked
    pub available: bool,
}

/// A client's booking request.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub barber_id: i64,
    pub service_id: i64,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub with_ai: bool,
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| Error::validation(format!("date {raw:?} must be YYYY-MM-DD: {e}")))
}

/// Lays out the slots of `date` and marks the ones that can still be booked.
///
/// Periods are emitted period 1 first, each in chronological order, stepping by
/// the slot duration from the period start up to (not including) its end.
/// Holidays and closed weekdays yield no slots.
#[must_use]
pub fn plan_slots(
    settings: &ShopSettings,
    date: NaiveDate,
    booked: &[DateTime<Utc>],
    now: DateTime<Utc>,
) -> Vec<Slot> {
    let Some(hours) = settings.effective_hours(date) else {
        return Vec::new();
    };
    let step = settings.slot_duration();

    let mut slots = Vec::new();
    for period in hours.periods() {
        let end = period.end.as_naive();
        let mut current = period.start.as_naive();
        while current < end {
            let time = TimeOfDay::from_time(current);
            if let Some(at) = settings.instant_at(date, time) {
                slots.push(Slot {
                    time: time.to_string(),
                    iso: at,
                    available: at > now && !booked.contains(&at),
                });
            }
            let (next, wrapped_secs) = current.overflowing_add_signed(step);
            if wrapped_secs != 0 {
                break;
            }
            current = next;
        }
    }
    slots
}

/// Checks `at` against the opening hours and holidays of its local day.
pub fn check_opening_hours(settings: &ShopSettings, at: DateTime<Utc>) -> Result<()> {
    let date = settings.local_date(at);
    let Some(hours) = settings.weekday_hours(date) else {
        return Err(Error::ShopClosed { date });
    };

    let time = settings.local_time(at);
    if !hours.contains(time) {
        return Err(Error::OutsideBusinessHours {
            time: time.to_string(),
        });
    }

    if settings.is_closed_date(date) {
        return Err(Error::ShopClosed { date });
    }
    Ok(())
}

/// Start instants of the barber's non-cancelled appointments on `date`.
pub async fn booked_instants<C>(
    db: &C,
    settings: &ShopSettings,
    barber_id: i64,
    date: NaiveDate,
) -> Result<Vec<DateTime<Utc>>>
where
    C: ConnectionTrait,
{
    let (start, end) = settings.day_window(date)?;
    let booked = Appointment::find()
        .filter(appointment::Column::BarberId.eq(barber_id))
        .filter(appointment::Column::ScheduledAt.gte(start))
        .filter(appointment::Column::ScheduledAt.lt(end))
        .filter(appointment::Column::Status.ne(AppointmentStatus::Cancelled))
        .order_by_asc(appointment::Column::ScheduledAt)
        .all(db)
        .await?;
    Ok(booked.into_iter().map(|a| a.scheduled_at).collect())
}

/// Lists the slots of `date` for `barber_id`, using shop defaults if settings were never saved.
pub async fn compute_available_slots<C>(
    db: &C,
    barber_id: i64,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<Slot>>
where
    C: ConnectionTrait,
{
    let settings = load_settings(db).await?;
    if settings.effective_hours(date).is_none() {
        return Ok(Vec::new());
    }
    let booked = booked_instants(db, &settings, barber_id, date).await?;
    Ok(plan_slots(&settings, date, &booked, now))
}

async fn find_live_booking<C>(
    db: &C,
    barber_id: i64,
    at: DateTime<Utc>,
) -> Result<Option<appointment::Model>>
where
    C: ConnectionTrait,
{
    Appointment::find()
        .filter(appointment::Column::BarberId.eq(barber_id))
        .filter(appointment::Column::ScheduledAt.eq(at))
        .filter(appointment::Column::Status.ne(AppointmentStatus::Cancelled))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Re-derives, from current settings and bookings, whether `at` can be booked.
///
/// # Errors
/// - [`Error::PastDate`] when `at` is not strictly after `now`
/// - [`Error::SlotTaken`] when the barber already has a live booking at `at`
/// - [`Error::ShopClosed`] for closed weekdays and holidays
/// - [`Error::OutsideBusinessHours`] when the time falls in neither period
pub async fn validate_booking<C>(
    db: &C,
    settings: &ShopSettings,
    barber_id: i64,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if at <= now {
        return Err(Error::PastDate { at });
    }
    if find_live_booking(db, barber_id, at).await?.is_some() {
        return Err(Error::SlotTaken { barber_id, at });
    }
    check_opening_hours(settings, at)
}

/// Validates and persists a new `PENDING` appointment for the calling client.
pub async fn book_appointment(
    db: &DatabaseConnection,
    principal: &Principal,
    request: BookingRequest,
    now: DateTime<Utc>,
) -> Result<appointment::Model> {
    let settings = load_settings(db).await?;
    validate_booking(db, &settings, request.barber_id, request.scheduled_at, now).await?;

    Service::find_by_id(request.service_id)
        .one(db)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| Error::not_found("Service", request.service_id))?;

    let model = appointment::ActiveModel {
        client_id: Set(principal.id),
        barber_id: Set(request.barber_id),
        service_id: Set(request.service_id),
        scheduled_at: Set(request.scheduled_at),
        status: Set(AppointmentStatus::Pending),
        with_ai: Set(request.with_ai),
        notes: Set(None),
        notified: Set(false),
        created_at: Set(now),
        ..Default::default()
    };

    match model.insert(db).await {
        Ok(created) => {
            tracing::info!(
                "Appointment {} booked: barber {} at {}",
                created.id,
                created.barber_id,
                created.scheduled_at
            );
            Ok(created)
        }
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!(
                "Lost booking race for barber {} at {}",
                request.barber_id,
                request.scheduled_at
            );
            Err(Error::SlotTaken {
                barber_id: request.barber_id,
                at: request.scheduled_at,
            })
        }
        Err(e) => Err(e.into()),
    }
}
