//! Order entity - a comanda, the running tab of a client being served.
//!
//! `total_amount` is derived from the order's lines and recomputed on every
//! line mutation; it is never taken from a request body.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::cashier_transaction::PaymentMethod;

/// `OPEN -> READY_FOR_PAYMENT -> CLOSED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "READY_FOR_PAYMENT")]
    ReadyForPayment,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Client being served; `None` for walk-ins
    pub client_id: Option<i64>,
    /// Barber who opened the comanda
    pub barber_id: i64,
    /// Cashier session the order is accounted in
    pub session_id: i64,
    /// Appointment completed by settling this order
    pub appointment_id: Option<i64>,
    /// Sum of service prices plus product price times quantity
    pub total_amount: f64,
    pub tip_amount: f64,
    pub payment_method: Option<PaymentMethod>,
    pub status: OrderStatus,
    pub created_at: DateTimeUtc,
    pub closed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many lines
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
