//! Barber stat entity - per-barber accumulation within one cashier session.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "barber_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub barber_id: i64,
    /// Order totals settled for this barber, tips excluded
    pub daily_revenue: f64,
    pub daily_tips: f64,
    /// Number of settled orders
    pub service_count: i32,
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
