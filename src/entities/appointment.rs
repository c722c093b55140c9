//! Appointment entity - a client's booking of one barber at one exact instant.
//!
//! No two non-cancelled appointments may share `(barber_id, scheduled_at)`;
//! this is enforced by a partial unique index created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

/// Appointment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    /// Unique identifier for the appointment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User id of the client who booked
    pub client_id: i64,
    /// User id of the barber
    pub barber_id: i64,
    /// Service being booked
    pub service_id: i64,
    /// Exact start instant
    pub scheduled_at: DateTimeUtc,
    /// Current lifecycle status
    pub status: AppointmentStatus,
    /// Whether the client asked for the AI style consultation
    pub with_ai: bool,
    /// Free-text notes, usually written by staff at completion
    pub notes: Option<String>,
    /// Set once the reminder for this appointment has been dispatched
    pub notified: bool,
    /// When the booking was made
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each appointment is for one service
    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::ServiceId",
        to = "super::service::Column::Id"
    )]
    Service,
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
