//! Appointment lifecycle after booking: listing, cancellation, completion.
//!
//! `PENDING`/`CONFIRMED` are live states. `CANCELLED` and `COMPLETED` are
//! terminal; a cancelled appointment stops counting against its slot at once
//! because the slot index excludes cancelled rows.

use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;

use crate::{
    core::{
        catalog::get_service,
        principal::{Principal, Role},
        settings::load_settings,
    },
    entities::{Appointment, AppointmentStatus, appointment, cut_history},
    errors::{Error, Result},
};

/// Staff-requested status change.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Appointments visible to the caller: clients and barbers see their own, admins see all.
pub async fn list_for_principal(
    db: &DatabaseConnection,
    principal: &Principal,
) -> Result<Vec<appointment::Model>> {
    let mut query = Appointment::find();
    match principal.role {
        Role::Client => query = query.filter(appointment::Column::ClientId.eq(principal.id)),
        Role::Barber => query = query.filter(appointment::Column::BarberId.eq(principal.id)),
        Role::Admin => {}
    }
    query
        .order_by_asc(appointment::Column::ScheduledAt)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_appointment<C>(db: &C, appointment_id: i64) -> Result<appointment::Model>
where
    C: ConnectionTrait,
{
    Appointment::find_by_id(appointment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Appointment", appointment_id))
}

fn ensure_live(appointment: &appointment::Model) -> Result<()> {
    match appointment.status {
        AppointmentStatus::Pending | AppointmentStatus::Confirmed => Ok(()),
        status => Err(Error::Conflict {
            message: format!("appointment {} is already {status:?}", appointment.id),
        }),
    }
}

/// Cancels an appointment on behalf of its client or staff.
///
/// Clients may cancel only their own bookings, and only while at least the
/// configured cancellation window remains before the start. Barbers may cancel
/// their own appointments and admins any, both without the window.
///
/// # Errors
/// - [`Error::Forbidden`] on ownership mismatch
/// - [`Error::CancellationWindow`] when a client is too late
/// - [`Error::Conflict`] when the appointment is already cancelled or completed
pub async fn cancel_appointment(
    db: &DatabaseConnection,
    principal: &Principal,
    appointment_id: i64,
    now: DateTime<Utc>,
) -> Result<appointment::Model> {
    let appointment = get_appointment(db, appointment_id).await?;

    match principal.role {
        Role::Client => {
            if appointment.client_id != principal.id {
                return Err(Error::forbidden("appointment belongs to another client"));
            }
            let settings = load_settings(db).await?;
            if appointment.scheduled_at - now < settings.cancellation_window() {
                tracing::warn!(
                    "Client {} tried to cancel appointment {} inside the {}h window",
                    principal.id,
                    appointment.id,
                    settings.cancellation_window_hours
                );
                return Err(Error::CancellationWindow {
                    hours: settings.cancellation_window_hours,
                });
            }
        }
        Role::Barber | Role::Admin => principal.require_admin_or_barber(appointment.barber_id)?,
    }
    ensure_live(&appointment)?;

    let mut active: appointment::ActiveModel = appointment.into();
    active.status = Set(AppointmentStatus::Cancelled);
    let cancelled = active.update(db).await?;
    tracing::info!(
        "Appointment {} cancelled by user {}",
        cancelled.id,
        principal.id
    );
    Ok(cancelled)
}

/// Marks the appointment completed and records the cut in the client's history.
///
/// Both writes share one database transaction, so a failed history insert
/// leaves the appointment untouched.
pub async fn complete_appointment(
    db: &DatabaseConnection,
    principal: &Principal,
    appointment_id: i64,
    notes: Option<String>,
) -> Result<appointment::Model> {
    let txn = db.begin().await?;

    let appointment = get_appointment(&txn, appointment_id).await?;
    principal.require_admin_or_barber(appointment.barber_id)?;
    ensure_live(&appointment)?;
    let service = get_service(&txn, appointment.service_id).await?;

    let observations = notes.clone().or_else(|| appointment.notes.clone());
    let history = cut_history::ActiveModel {
        client_id: Set(appointment.client_id),
        barber_id: Set(appointment.barber_id),
        appointment_id: Set(Some(appointment.id)),
        description: Set(format!("Serviço: {}", service.name)),
        observations: Set(observations),
        date: Set(appointment.scheduled_at),
        ..Default::default()
    };

    let mut active: appointment::ActiveModel = appointment.into();
    active.status = Set(AppointmentStatus::Completed);
    if notes.is_some() {
        active.notes = Set(notes);
    }
    let completed = active.update(&txn).await?;
    history.insert(&txn).await?;

    txn.commit().await?;
    tracing::info!(
        "Appointment {} completed by user {}",
        completed.id,
        principal.id
    );
    Ok(completed)
}

/// Marks a live appointment completed without touching the cut history.
/// Used when the appointment's comanda is settled.
pub(crate) async fn mark_completed<C>(db: &C, appointment_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    Appointment::update_many()
        .col_expr(
            appointment::Column::Status,
            Expr::value(AppointmentStatus::Completed),
        )
        .filter(appointment::Column::Id.eq(appointment_id))
        .filter(appointment::Column::Status.is_in([
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
        ]))
        .exec(db)
        .await?;
    Ok(())
}

/// Applies a staff status change.
///
/// `COMPLETED` goes through [`complete_appointment`] and `CANCELLED` through
/// [`cancel_appointment`]; `PENDING` cannot be set by hand.
pub async fn update_status(
    db: &DatabaseConnection,
    principal: &Principal,
    appointment_id: i64,
    update: StatusUpdate,
    now: DateTime<Utc>,
) -> Result<appointment::Model> {
    principal.require_staff()?;

    match update.status {
        AppointmentStatus::Completed => {
            complete_appointment(db, principal, appointment_id, update.notes).await
        }
        AppointmentStatus::Cancelled => {
            cancel_appointment(db, principal, appointment_id, now).await
        }
        AppointmentStatus::Confirmed => {
            let appointment = get_appointment(db, appointment_id).await?;
            principal.require_admin_or_barber(appointment.barber_id)?;
            ensure_live(&appointment)?;

            let mut active: appointment::ActiveModel = appointment.into();
            active.status = Set(AppointmentStatus::Confirmed);
            if update.notes.is_some() {
                active.notes = Set(update.notes);
            }
            let confirmed = active.update(db).await?;
            tracing::info!("Appointment {} confirmed", confirmed.id);
            Ok(confirmed)
        }
        AppointmentStatus::Pending => Err(Error::validation(
            "appointments cannot be moved back to PENDING",
        )),
    }
}

/// Removes an appointment outright. Barbers may only delete their own.
pub async fn delete_appointment(
    db: &DatabaseConnection,
    principal: &Principal,
    appointment_id: i64,
) -> Result<()> {
    let appointment = get_appointment(db, appointment_id).await?;
    principal.require_admin_or_barber(appointment.barber_id)?;

    Appointment::delete_by_id(appointment.id).exec(db).await?;
    tracing::info!(
        "Appointment {} deleted by user {}",
        appointment.id,
        principal.id
    );
    Ok(())
}
