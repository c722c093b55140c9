//! Shop settings entity - the singleton row holding opening hours and booking rules.
//!
//! The schedule and closed dates are stored as JSON documents. Their typed
//! shapes live in [`crate::core::schedule`]; this row is only ever read through
//! [`crate::core::settings`], which normalises the schedule once per load.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shop settings database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shop_settings")]
pub struct Model {
    /// Always [`crate::core::settings::SETTINGS_ID`]; the fixed key keeps the row unique
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    /// Display name of the shop
    pub shop_name: String,
    /// Street address shown to clients
    pub address: String,
    /// IANA time zone name the opening hours are expressed in
    pub timezone: String,
    /// Length of one bookable slot in minutes
    pub slot_duration_minutes: i32,
    /// Minimum notice, in hours, for a client to cancel
    pub cancellation_window_hours: i32,
    /// Either a weekly schedule or the legacy business/saturday hours, tagged by `kind`
    pub schedule: Json,
    /// Calendar dates (`YYYY-MM-DD`) on which the shop is closed
    pub closed_days: Json,
    /// When the settings were last modified
    pub updated_at: DateTimeUtc,
}

/// Settings have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
