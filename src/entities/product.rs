//! Product entity - retail items sold over the counter and added to comandas.
//!
//! `stock` is what can still be sold. `reserved` counts units held by order
//! lines that have not been settled yet; adding a line moves units from
//! `stock` to `reserved`, removing it moves them back, and settlement drops
//! them from `reserved`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "Pomade", "Soda")
    pub name: String,
    /// Free-form shelf grouping used by the revenue breakdown
    pub category: Option<String>,
    /// Unit price
    pub price: f64,
    /// Units available for sale
    pub stock: i32,
    /// Units held by unsettled order lines
    pub reserved: i32,
    /// Inactive products cannot be added to orders
    pub is_active: bool,
}

/// Products have no navigable relations; order lines reference them by id
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
