//! Cashier transaction entity - an append-only ledger entry of a session.
//!
//! Rows are only ever inserted; the summary on the owning session is updated in
//! the same database transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of money through the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(4))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    #[sea_orm(string_value = "IN")]
    In,
    #[sea_orm(string_value = "OUT")]
    Out,
}

/// How money moved. `Expense` is only used for manual OUT entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "CASH")]
    #[serde(rename = "CASH")]
    Cash,
    #[sea_orm(string_value = "CARD")]
    #[serde(rename = "CARD")]
    Card,
    #[sea_orm(string_value = "PIX")]
    #[serde(rename = "PIX")]
    Pix,
    #[sea_orm(string_value = "OUTRO")]
    #[serde(rename = "OUTRO")]
    Other,
    #[sea_orm(string_value = "EXPENSE")]
    #[serde(rename = "EXPENSE")]
    Expense,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cashier_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub payment_method: PaymentMethod,
    /// Barber credited with the sale, for IN entries
    pub barber_id: Option<i64>,
    /// Order that produced the entry, for IN entries
    pub order_id: Option<i64>,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cashier_session::Entity",
        from = "Column::SessionId",
        to = "super::cashier_session::Column::Id"
    )]
    Session,
}

impl Related<super::cashier_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
