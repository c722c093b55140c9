//! Cut history: the per-client record of services received.
//!
//! Entries are written automatically when an appointment is completed and can
//! also be added by hand by staff.

use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;

use crate::{
    core::principal::{Principal, Role},
    entities::{CutHistory, cut_history},
    errors::{Error, Result},
};

/// A hand-written history entry. The author is recorded as the barber.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub client_id: i64,
    pub description: String,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub appointment_id: Option<i64>,
    /// Defaults to now
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Every entry, newest first. Admin only.
pub async fn list_history(
    db: &DatabaseConnection,
    principal: &Principal,
) -> Result<Vec<cut_history::Model>> {
    principal.require_admin()?;
    CutHistory::find()
        .order_by_desc(cut_history::Column::Date)
        .order_by_desc(cut_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// History of one client, newest first. Clients can only read their own.
pub async fn client_history(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i64,
) -> Result<Vec<cut_history::Model>> {
    if principal.role == Role::Client && principal.id != client_id {
        return Err(Error::forbidden("history belongs to another client"));
    }
    CutHistory::find()
        .filter(cut_history::Column::ClientId.eq(client_id))
        .order_by_desc(cut_history::Column::Date)
        .order_by_desc(cut_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn record_entry(
    db: &DatabaseConnection,
    principal: &Principal,
    entry: NewEntry,
    now: DateTime<Utc>,
) -> Result<cut_history::Model> {
    principal.require_staff()?;
    let description = entry.description.trim();
    if description.is_empty() {
        return Err(Error::validation("description cannot be empty"));
    }

    let created = cut_history::ActiveModel {
        client_id: Set(entry.client_id),
        barber_id: Set(principal.id),
        appointment_id: Set(entry.appointment_id),
        description: Set(description.to_string()),
        observations: Set(entry.observations),
        date: Set(entry.date.unwrap_or(now)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        "History entry {} recorded for client {} by user {}",
        created.id,
        created.client_id,
        principal.id
    );
    Ok(created)
}

/// Removes an entry. Barbers can only remove entries they authored.
pub async fn delete_entry(db: &DatabaseConnection, principal: &Principal, id: i64) -> Result<()> {
    let entry = CutHistory::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("CutHistory", id))?;
    principal.require_admin_or_barber(entry.barber_id)?;

    CutHistory::delete_by_id(id).exec(db).await?;
    tracing::info!("History entry {} deleted by user {}", id, principal.id);
    Ok(())
}
