//! Cashier session entity - one register opening/closing cycle.
//!
//! At most one session can be `OPEN` at any time; a partial unique index on
//! `status` enforces it. The summary columns are running totals maintained by
//! settlement and expense entries and are frozen when the session closes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a cashier session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

/// Cashier session database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cashier_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Admin who opened the register
    pub opened_by: i64,
    /// Admin who closed the register
    pub closed_by: Option<i64>,
    pub opened_at: DateTimeUtc,
    pub closed_at: Option<DateTimeUtc>,
    /// Cash float declared at opening
    pub initial_value: f64,
    /// Expected drawer value computed at close
    pub final_value: Option<f64>,
    /// Drawer value counted by staff at close
    pub declared_value: Option<f64>,
    pub notes: Option<String>,
    pub status: SessionStatus,
    /// Revenue settled in cash
    pub cash_total: f64,
    /// Revenue settled by card
    pub card_total: f64,
    /// Revenue settled by PIX transfer
    pub pix_total: f64,
    /// Revenue settled by any other method
    pub other_total: f64,
    /// Manual expenses paid out of the drawer
    pub expenses_total: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One session has many ledger entries
    #[sea_orm(has_many = "super::cashier_transaction::Entity")]
    Transactions,
    /// One session has one stats row per barber
    #[sea_orm(has_many = "super::barber_stat::Entity")]
    BarberStats,
}

impl Related<super::cashier_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::barber_stat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BarberStats.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
