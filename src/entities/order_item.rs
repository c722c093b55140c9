//! Order item entity - one service or product line on a comanda.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a line sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    #[sea_orm(string_value = "SERVICE")]
    Service,
    #[sea_orm(string_value = "PRODUCT")]
    Product,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub kind: ItemKind,
    /// Service or product id, depending on `kind`
    pub item_id: i64,
    /// Unit price snapshot taken when the line was added
    pub price: f64,
    /// Always 1 for service lines
    pub quantity: i32,
    pub added_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Contribution of this line to the order total.
    #[must_use]
    pub fn line_total(&self) -> f64 {
        match self.kind {
            ItemKind::Service => self.price,
            ItemKind::Product => self.price * f64::from(self.quantity),
        }
    }
}
