//! Comanda (order) business logic.
//!
//! Orders move `OPEN -> READY_FOR_PAYMENT -> CLOSED`. Lines can only change
//! while the order is `OPEN`; every line mutation reserves or releases product
//! stock and recomputes `total_amount` from the lines inside one database
//! transaction. Settlement posts the order into the open cashier session and
//! commits its reservations in the same transaction.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        appointment::{get_appointment, mark_completed},
        cashier::{post_settlement, require_open_session},
        catalog::{commit_reservation, get_product, get_service, release_stock, reserve_stock},
        principal::{Principal, Role},
        settings::load_settings,
    },
    entities::{ItemKind, Order, OrderItem, OrderStatus, PaymentMethod, order, order_item},
    errors::{Error, Result},
};

/// A line to add to an order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub kind: ItemKind,
    pub item_id: i64,
    /// Ignored for services, which always count once
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Fields of a new comanda.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub client_id: Option<i64>,
    /// Required when an admin opens the order; barbers always open their own
    #[serde(default)]
    pub barber_id: Option<i64>,
    #[serde(default)]
    pub appointment_id: Option<i64>,
    #[serde(default)]
    pub tip_amount: Option<f64>,
    #[serde(default)]
    pub items: Vec<NewItem>,
}

/// Payment details given when an admin settles an order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettleRequest {
    /// Defaults to [`PaymentMethod::Other`]
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Replaces the stored tip when present
    #[serde(default)]
    pub tip_amount: Option<f64>,
}

/// Narrows [`list_orders`]. Dates are shop-local days, both ends inclusive.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub session_id: Option<i64>,
    /// Only honoured for admins; barbers always see their own orders
    pub barber_id: Option<i64>,
    pub status: Option<OrderStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

fn check_tip(tip: f64) -> Result<()> {
    if !tip.is_finite() || tip < 0.0 {
        return Err(Error::InvalidAmount { amount: tip });
    }
    Ok(())
}

fn ensure_open(order: &order::Model) -> Result<()> {
    if order.status == OrderStatus::Open {
        return Ok(());
    }
    tracing::warn!("Rejected change to order {} in status {:?}", order.id, order.status);
    Err(Error::OrderNotOpen {
        order_id: order.id,
        status: format!("{:?}", order.status),
    })
}

async fn find_order<C>(db: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))
}

async fn load_items<C>(db: &C, order_id: i64) -> Result<Vec<order_item::Model>>
where
    C: ConnectionTrait,
{
    OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn view<C>(db: &C, order: order::Model) -> Result<OrderView>
where
    C: ConnectionTrait,
{
    let items = load_items(db, order.id).await?;
    Ok(OrderView { order, items })
}

/// Sets `total_amount` to the sum of the order's lines and returns it.
pub async fn recompute_total<C>(db: &C, order_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let total: f64 = load_items(db, order_id)
        .await?
        .iter()
        .map(order_item::Model::line_total)
        .sum();

    Order::update_many()
        .col_expr(order::Column::TotalAmount, Expr::value(total))
        .filter(order::Column::Id.eq(order_id))
        .exec(db)
        .await?;
    Ok(total)
}

/// Prices the line from the catalog and, for products, reserves the stock.
async fn insert_line<C>(
    db: &C,
    order_id: i64,
    item: &NewItem,
    now: DateTime<Utc>,
) -> Result<order_item::Model>
where
    C: ConnectionTrait,
{
    let (price, quantity) = match item.kind {
        ItemKind::Service => {
            let service = get_service(db, item.item_id).await?;
            if !service.is_active {
                return Err(Error::not_found("Service", item.item_id));
            }
            (service.price, 1)
        }
        ItemKind::Product => {
            if item.quantity <= 0 {
                return Err(Error::validation(format!(
                    "quantity must be positive, got {}",
                    item.quantity
                )));
            }
            let product = get_product(db, item.item_id).await?;
            if !product.is_active {
                return Err(Error::not_found("Product", item.item_id));
            }
            reserve_stock(db, product.id, item.quantity).await?;
            (product.price, item.quantity)
        }
    };

    order_item::ActiveModel {
        order_id: Set(order_id),
        kind: Set(item.kind),
        item_id: Set(item.item_id),
        price: Set(price),
        quantity: Set(quantity),
        added_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Opens a comanda in the current cashier session.
///
/// # Errors
/// - [`Error::NoOpenSession`] when the register is closed
/// - [`Error::Validation`] when an admin does not name the barber
/// - any error of the initial lines, in which case nothing is written
pub async fn create_order(
    db: &DatabaseConnection,
    principal: &Principal,
    new: NewOrder,
    now: DateTime<Utc>,
) -> Result<OrderView> {
    principal.require_staff()?;
    let barber_id = match principal.role {
        Role::Barber => principal.id,
        _ => new
            .barber_id
            .ok_or_else(|| Error::validation("barber_id is required"))?,
    };
    let tip = new.tip_amount.unwrap_or(0.0);
    check_tip(tip)?;

    let txn = db.begin().await?;
    let session = require_open_session(&txn).await?;
    if let Some(appointment_id) = new.appointment_id {
        get_appointment(&txn, appointment_id).await?;
    }

    let created = order::ActiveModel {
        client_id: Set(new.client_id),
        barber_id: Set(barber_id),
        session_id: Set(session.id),
        appointment_id: Set(new.appointment_id),
        total_amount: Set(0.0),
        tip_amount: Set(tip),
        payment_method: Set(None),
        status: Set(OrderStatus::Open),
        created_at: Set(now),
        closed_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for item in &new.items {
        insert_line(&txn, created.id, item, now).await?;
    }
    recompute_total(&txn, created.id).await?;
    let order = find_order(&txn, created.id).await?;
    let result = view(&txn, order).await?;
    txn.commit().await?;

    tracing::info!(
        "Order {} opened for barber {} in session {} (total {:.2})",
        result.order.id,
        barber_id,
        session.id,
        result.order.total_amount
    );
    Ok(result)
}

/// Adds a line to an open order.
///
/// Clients may only add products, and only to their own order.
pub async fn add_item(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: i64,
    item: NewItem,
    now: DateTime<Utc>,
) -> Result<OrderView> {
    let txn = db.begin().await?;
    let order = find_order(&txn, order_id).await?;

    if principal.role == Role::Client {
        if order.client_id != Some(principal.id) {
            return Err(Error::forbidden("order belongs to another client"));
        }
        if item.kind != ItemKind::Product {
            return Err(Error::forbidden("clients can only add products"));
        }
    }
    ensure_open(&order)?;

    let line = insert_line(&txn, order.id, &item, now).await?;
    recompute_total(&txn, order.id).await?;
    let order = find_order(&txn, order.id).await?;
    let result = view(&txn, order).await?;
    txn.commit().await?;

    tracing::info!(
        "Added {:?} {} x{} to order {}",
        line.kind,
        line.item_id,
        line.quantity,
        order_id
    );
    Ok(result)
}

/// Removes a line from an open order, returning reserved product stock.
pub async fn remove_item(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: i64,
    line_id: i64,
) -> Result<OrderView> {
    principal.require_staff()?;

    let txn = db.begin().await?;
    let order = find_order(&txn, order_id).await?;
    ensure_open(&order)?;

    let line = OrderItem::find_by_id(line_id)
        .filter(order_item::Column::OrderId.eq(order.id))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Order item", line_id))?;

    if line.kind == ItemKind::Product {
        release_stock(&txn, line.item_id, line.quantity).await?;
    }
    OrderItem::delete_by_id(line.id).exec(&txn).await?;
    recompute_total(&txn, order.id).await?;
    let order = find_order(&txn, order.id).await?;
    let result = view(&txn, order).await?;
    txn.commit().await?;

    tracing::info!("Removed line {} from order {}", line_id, order_id);
    Ok(result)
}

/// Hands an order over for payment. Only the barber who opened it may do this.
pub async fn pre_close(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: i64,
) -> Result<OrderView> {
    principal.require_any(&[Role::Barber])?;
    let order = find_order(db, order_id).await?;
    if order.barber_id != principal.id {
        return Err(Error::forbidden(
            "only the barber who opened the order can pre-close it",
        ));
    }
    ensure_open(&order)?;

    let result = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(OrderStatus::ReadyForPayment))
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Status.eq(OrderStatus::Open))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::OrderNotOpen {
            order_id,
            status: "changed concurrently".to_string(),
        });
    }

    tracing::info!("Order {} ready for payment", order_id);
    let order = find_order(db, order_id).await?;
    view(db, order).await
}

/// Settles an order into the open cashier session.
///
/// In one transaction: the order becomes `CLOSED` with its payment method and
/// tip, its reserved product units leave stock for good, the session ledger,
/// summary and barber stats are credited, and a linked appointment is marked
/// completed. The order is re-pointed at the session that receives the money.
///
/// # Errors
/// - [`Error::Forbidden`] unless the caller is an admin
/// - [`Error::OrderNotOpen`] when the order is already closed
/// - [`Error::NoOpenSession`] when the register is closed
pub async fn close_order(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: i64,
    request: SettleRequest,
    now: DateTime<Utc>,
) -> Result<OrderView> {
    principal.require_admin()?;
    let method = request.payment_method.unwrap_or(PaymentMethod::Other);
    if method == PaymentMethod::Expense {
        return Err(Error::validation("EXPENSE is not a payment method for orders"));
    }
    if let Some(tip) = request.tip_amount {
        check_tip(tip)?;
    }

    let txn = db.begin().await?;
    let order = find_order(&txn, order_id).await?;
    if order.status == OrderStatus::Closed {
        return Err(Error::OrderNotOpen {
            order_id,
            status: format!("{:?}", order.status),
        });
    }
    let session = require_open_session(&txn).await?;
    let tip = request.tip_amount.unwrap_or(order.tip_amount);

    let claimed = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Closed))
        .col_expr(order::Column::ClosedAt, Expr::value(now))
        .col_expr(order::Column::PaymentMethod, Expr::value(method))
        .col_expr(order::Column::TipAmount, Expr::value(tip))
        .col_expr(order::Column::SessionId, Expr::value(session.id))
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Status.ne(OrderStatus::Closed))
        .exec(&txn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(Error::OrderNotOpen {
            order_id,
            status: format!("{:?}", OrderStatus::Closed),
        });
    }

    let items = load_items(&txn, order.id).await?;
    for line in items.iter().filter(|l| l.kind == ItemKind::Product) {
        commit_reservation(&txn, line.item_id, line.quantity).await?;
    }

    let closed = find_order(&txn, order.id).await?;
    post_settlement(&txn, session.id, &closed, method, tip, now).await?;
    if let Some(appointment_id) = closed.appointment_id {
        mark_completed(&txn, appointment_id).await?;
    }
    txn.commit().await?;

    tracing::info!(
        "Order {} settled: {:.2} + {:.2} tip via {:?} into session {}",
        closed.id,
        closed.total_amount,
        tip,
        method,
        session.id
    );
    Ok(OrderView {
        order: closed,
        items,
    })
}

/// Deletes an order. Reservations of an unsettled order are returned to stock.
pub async fn delete_order(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: i64,
) -> Result<()> {
    principal.require_admin()?;

    let txn = db.begin().await?;
    let order = find_order(&txn, order_id).await?;
    let items = load_items(&txn, order.id).await?;

    if order.status != OrderStatus::Closed {
        for line in items.iter().filter(|l| l.kind == ItemKind::Product) {
            release_stock(&txn, line.item_id, line.quantity).await?;
        }
    }
    OrderItem::delete_many()
        .filter(order_item::Column::OrderId.eq(order.id))
        .exec(&txn)
        .await?;
    Order::delete_by_id(order.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        "Order {} deleted by user {} (status {:?})",
        order_id,
        principal.id,
        order.status
    );
    Ok(())
}

/// Loads an order. Clients can only see their own.
pub async fn get_order(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: i64,
) -> Result<OrderView> {
    let order = find_order(db, order_id).await?;
    if principal.role == Role::Client && order.client_id != Some(principal.id) {
        return Err(Error::forbidden("order belongs to another client"));
    }
    view(db, order).await
}

/// Orders visible to the caller, newest first. Admins see every order,
/// barbers only the ones they opened.
///
/// # Errors
/// - [`Error::Forbidden`] for clients
pub async fn list_orders(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: OrderFilter,
) -> Result<Vec<OrderView>> {
    principal.require_staff()?;

    let mut query = Order::find();
    let barber_id = match principal.role {
        Role::Admin => filter.barber_id,
        _ => Some(principal.id),
    };
    if let Some(barber_id) = barber_id {
        query = query.filter(order::Column::BarberId.eq(barber_id));
    }
    if let Some(session_id) = filter.session_id {
        query = query.filter(order::Column::SessionId.eq(session_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(order::Column::Status.eq(status));
    }
    if filter.from.is_some() || filter.to.is_some() {
        let settings = load_settings(db).await?;
        if let Some(from) = filter.from {
            let (start, _) = settings.day_window(from)?;
            query = query.filter(order::Column::CreatedAt.gte(start));
        }
        if let Some(to) = filter.to {
            let (_, end) = settings.day_window(to)?;
            query = query.filter(order::Column::CreatedAt.lt(end));
        }
    }

    let orders = query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await?;

    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let mut lines: HashMap<i64, Vec<order_item::Model>> = HashMap::new();
    for line in OrderItem::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await?
    {
        lines.entry(line.order_id).or_default().push(line);
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderView {
            items: lines.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

/// The caller's unsettled comanda, if any.
pub async fn my_open_order(
    db: &DatabaseConnection,
    principal: &Principal,
) -> Result<Option<OrderView>> {
    let found = Order::find()
        .filter(order::Column::ClientId.eq(principal.id))
        .filter(order::Column::Status.is_in([OrderStatus::Open, OrderStatus::ReadyForPayment]))
        .order_by_desc(order::Column::CreatedAt)
        .one(db)
        .await?;
    match found {
        Some(order) => Ok(Some(view(db, order).await?)),
        None => Ok(None),
    }
}
