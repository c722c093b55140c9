//! Periodic appointment reminder sweep.
//!
//! Each sweep claims an appointment by flipping `notified` with a conditional
//! update before sending, so overlapping or re-run sweeps send at most one
//! reminder per appointment. A crash between claim and send loses that
//! reminder rather than duplicating it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, prelude::*, sea_query::Expr};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::{
    config::shop::ReminderConfig,
    core::notify::{Notification, Notifier},
    entities::{Appointment, AppointmentStatus, appointment},
    errors::Result,
};

const REMINDER_TITLE: &str = "Lembrete de Agendamento";
const REMINDER_URL: &str = "/history";

/// Atomically sets `notified` on a still-pending appointment. False when
/// another sweep got there first or the appointment changed state.
async fn claim<C>(db: &C, appointment_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Appointment::update_many()
        .col_expr(appointment::Column::Notified, Expr::value(true))
        .filter(appointment::Column::Id.eq(appointment_id))
        .filter(appointment::Column::Notified.eq(false))
        .filter(appointment::Column::Status.eq(AppointmentStatus::Pending))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Sends one reminder for every pending, not yet notified appointment
/// starting in `[now, now + lead]`. Returns how many were claimed.
#[instrument(skip(db, notifier))]
pub async fn run_reminder_sweep(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    lead: Duration,
    now: DateTime<Utc>,
) -> Result<usize> {
    let upcoming = Appointment::find()
        .filter(appointment::Column::ScheduledAt.gte(now))
        .filter(appointment::Column::ScheduledAt.lte(now + lead))
        .filter(appointment::Column::Status.eq(AppointmentStatus::Pending))
        .filter(appointment::Column::Notified.eq(false))
        .order_by_asc(appointment::Column::ScheduledAt)
        .all(db)
        .await?;

    let mut claimed = 0;
    for appointment in upcoming {
        if !claim(db, appointment.id).await? {
            tracing::debug!("Appointment {} already claimed", appointment.id);
            continue;
        }
        claimed += 1;

        let notification = Notification {
            recipient_id: appointment.client_id,
            title: REMINDER_TITLE.to_string(),
            body: "Seu horário está chegando em breve!".to_string(),
            action_url: REMINDER_URL.to_string(),
        };
        if let Err(e) = notifier.notify(&notification).await {
            tracing::warn!(
                "Reminder for appointment {} could not be delivered: {}",
                appointment.id,
                e
            );
        }
    }

    if claimed > 0 {
        tracing::info!("Sent {} appointment reminder(s)", claimed);
    }
    Ok(claimed)
}

/// Runs the sweep every `config.interval()` for the life of the process.
pub fn spawn_reminder_task(
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    config: ReminderConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "Starting reminder sweep every {} min, {} min ahead",
            config.interval_minutes,
            config.lead_minutes
        );
        let mut interval = tokio::time::interval(config.interval());
        loop {
            interval.tick().await;
            if let Err(e) = run_reminder_sweep(&db, notifier.as_ref(), config.lead(), Utc::now()).await {
                tracing::error!("Reminder sweep failed: {}", e);
            }
        }
    })
}
