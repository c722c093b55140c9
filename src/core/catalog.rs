//! Service and product catalog, and product stock reservation.
//!
//! Stock moves between two counters on the product row. Every move is a single
//! conditional `UPDATE`, so concurrent reservations on the same product
//! serialize in the database and `stock` never goes negative:
//!
//! - reserve: `stock -= q, reserved += q WHERE stock >= q`
//! - release: `stock += q, reserved -= q WHERE reserved >= q`
//! - commit:  `reserved -= q WHERE reserved >= q` (the units leave the shop)

use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Deserialize;

use crate::{
    core::principal::Principal,
    entities::{Product, Service, product, service},
    errors::{Error, Result},
};

/// Fields of a new service.
#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    pub price: f64,
    pub duration_minutes: i32,
}

/// Fields of a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub category: Option<String>,
}

fn check_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(())
}

fn check_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Creates a bookable service.
///
/// # Errors
/// Returns an error if the caller is not an admin, the name is empty, the
/// price is negative or not finite, or the duration is not positive.
pub async fn create_service(
    db: &DatabaseConnection,
    principal: &Principal,
    new: NewService,
) -> Result<service::Model> {
    principal.require_admin()?;
    let name = check_name(&new.name)?;
    check_price(new.price)?;
    if new.duration_minutes <= 0 {
        return Err(Error::validation("service duration must be positive"));
    }

    let created = service::ActiveModel {
        name: Set(name),
        price: Set(new.price),
        duration_minutes: Set(new.duration_minutes),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tracing::info!("Created service {} ({})", created.id, created.name);
    Ok(created)
}

/// Active services, by name.
pub async fn list_services(db: &DatabaseConnection) -> Result<Vec<service::Model>> {
    Service::find()
        .filter(service::Column::IsActive.eq(true))
        .order_by_asc(service::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Looks up a service, failing with `NotFound` when it does not exist.
pub async fn get_service<C>(db: &C, service_id: i64) -> Result<service::Model>
where
    C: ConnectionTrait,
{
    Service::find_by_id(service_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Service", service_id))
}

/// Creates a retail product with its opening stock.
pub async fn create_product(
    db: &DatabaseConnection,
    principal: &Principal,
    new: NewProduct,
) -> Result<product::Model> {
    principal.require_admin()?;
    let name = check_name(&new.name)?;
    check_price(new.price)?;
    if new.stock < 0 {
        return Err(Error::validation("stock cannot be negative"));
    }

    let created = product::ActiveModel {
        name: Set(name),
        category: Set(new
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())),
        price: Set(new.price),
        stock: Set(new.stock),
        reserved: Set(0),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tracing::info!(
        "Created product {} ({}) with {} in stock",
        created.id,
        created.name,
        created.stock
    );
    Ok(created)
}

/// Active products, by name.
pub async fn list_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::IsActive.eq(true))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Looks up a product, failing with `NotFound` when it does not exist.
pub async fn get_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))
}

fn check_quantity(quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(Error::validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    Ok(())
}

/// Moves `quantity` units from `stock` to `reserved`.
///
/// # Errors
/// - [`Error::InsufficientStock`] when fewer than `quantity` units are in stock
/// - [`Error::NotFound`] when the product does not exist
pub async fn reserve_stock<C>(db: &C, product_id: i64, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    check_quantity(quantity)?;

    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(
            product::Column::Reserved,
            Expr::col(product::Column::Reserved).add(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        // Either the product is gone or there is not enough stock
        let product = get_product(db, product_id).await?;
        tracing::warn!(
            "Stock reservation refused for product {}: {} available, {} requested",
            product_id,
            product.stock,
            quantity
        );
        return Err(Error::InsufficientStock {
            product_id,
            available: product.stock,
            requested: quantity,
        });
    }

    tracing::info!("Reserved {} of product {}", quantity, product_id);
    Ok(())
}

/// Returns `quantity` reserved units to `stock`.
pub async fn release_stock<C>(db: &C, product_id: i64, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    check_quantity(quantity)?;

    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .col_expr(
            product::Column::Reserved,
            Expr::col(product::Column::Reserved).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Reserved.gte(quantity))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let product = get_product(db, product_id).await?;
        return Err(Error::Conflict {
            message: format!(
                "product {product_id} has only {} reserved, cannot release {quantity}",
                product.reserved
            ),
        });
    }

    tracing::info!("Released {} of product {}", quantity, product_id);
    Ok(())
}

/// Drops `quantity` reserved units for good when their order is paid.
pub async fn commit_reservation<C>(db: &C, product_id: i64, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    check_quantity(quantity)?;

    let result = Product::update_many()
        .col_expr(
            product::Column::Reserved,
            Expr::col(product::Column::Reserved).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Reserved.gte(quantity))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let product = get_product(db, product_id).await?;
        return Err(Error::Conflict {
            message: format!(
                "product {product_id} has only {} reserved, cannot commit {quantity}",
                product.reserved
            ),
        });
    }
    Ok(())
}
