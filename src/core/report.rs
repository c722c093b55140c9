//! Management report business logic.
//!
//! All periods are measured on the shop's wall clock: "today" and "this
//! month" start at local midnight in the configured time zone.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;

use crate::{
    core::{principal::Principal, settings::load_settings},
    entities::{
        Appointment, AppointmentStatus, ItemKind, Order, OrderItem, OrderStatus, Product,
        appointment, order, order_item, product,
    },
    errors::{Error, Result},
};

const NEXT_PENDING_LIMIT: u64 = 5;
const RECENT_ORDERS_LIMIT: u64 = 5;

/// Revenue of one barber over the current month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarberPerformance {
    pub barber_id: i64,
    pub revenue: f64,
    pub orders: u64,
}

/// Month revenue of one slice of the catalog. Service lines form a single
/// slice; product lines are split by product category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueShare {
    pub kind: ItemKind,
    /// `None` for services and uncategorised products
    pub category: Option<String>,
    pub quantity: i64,
    pub revenue: f64,
}

/// Management dashboard numbers.
#[derive(Debug, Clone, Serialize)]
pub struct ManagementReport {
    /// Closed-order totals since local midnight
    pub revenue_today: f64,
    /// Closed-order totals since the first of the month
    pub revenue_month: f64,
    /// Orders closed this month
    pub closed_orders: u64,
    /// `revenue_month / closed_orders`, or 0 without orders
    pub average_ticket: f64,
    /// Non-cancelled appointments from today on
    pub upcoming_appointments: u64,
    /// The next pending appointments, soonest first
    pub next_pending: Vec<appointment::Model>,
    /// Barbers ranked by month revenue, highest first
    pub barber_performance: Vec<BarberPerformance>,
    /// The most recently settled orders, newest first
    pub recent_orders: Vec<order::Model>,
    /// Month revenue by service/product category, highest first
    pub revenue_breakdown: Vec<RevenueShare>,
}

/// Mean order value, guarding the empty month.
#[must_use]
pub fn average_ticket(total: f64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = count as f64;
    total / count
}

fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Ranks barbers by revenue over `orders`, ties broken by barber id.
#[must_use]
pub fn rank_barbers(orders: &[order::Model]) -> Vec<BarberPerformance> {
    let mut by_barber: BTreeMap<i64, BarberPerformance> = BTreeMap::new();
    for order in orders {
        let entry = by_barber
            .entry(order.barber_id)
            .or_insert_with(|| BarberPerformance {
                barber_id: order.barber_id,
                revenue: 0.0,
                orders: 0,
            });
        entry.revenue += order.total_amount;
        entry.orders += 1;
    }

    let mut ranking: Vec<_> = by_barber.into_values().collect();
    ranking.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    ranking
}

/// Groups order lines into revenue slices. Lines are valued at their price
/// snapshot; `categories` maps product ids to their category.
#[must_use]
pub fn breakdown_revenue(
    lines: &[order_item::Model],
    categories: &HashMap<i64, Option<String>>,
) -> Vec<RevenueShare> {
    let mut slices: BTreeMap<(bool, Option<String>), RevenueShare> = BTreeMap::new();
    for line in lines {
        let category = match line.kind {
            ItemKind::Service => None,
            ItemKind::Product => categories.get(&line.item_id).cloned().flatten(),
        };
        let key = (line.kind == ItemKind::Product, category.clone());
        let slice = slices.entry(key).or_insert_with(|| RevenueShare {
            kind: line.kind,
            category,
            quantity: 0,
            revenue: 0.0,
        });
        slice.quantity += i64::from(line.quantity);
        slice.revenue += line.line_total();
    }

    let mut breakdown: Vec<_> = slices.into_values().collect();
    breakdown.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    breakdown
}

async fn month_breakdown(
    db: &DatabaseConnection,
    month_orders: &[order::Model],
) -> Result<Vec<RevenueShare>> {
    let order_ids: Vec<i64> = month_orders.iter().map(|o| o.id).collect();
    let lines = OrderItem::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .all(db)
        .await?;

    let product_ids: Vec<i64> = lines
        .iter()
        .filter(|l| l.kind == ItemKind::Product)
        .map(|l| l.item_id)
        .collect();
    let categories: HashMap<i64, Option<String>> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p.category))
        .collect();

    Ok(breakdown_revenue(&lines, &categories))
}

/// Builds the management report as of `now`. Admin only.
pub async fn management_report(
    db: &DatabaseConnection,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<ManagementReport> {
    principal.require_admin()?;
    let settings = load_settings(db).await?;

    let today = settings.local_date(now);
    let (day_start, day_end) = settings.day_window(today)?;
    let (month_start, month_end) = match (first_of_month(today), first_of_next_month(today)) {
        (Some(first), Some(next)) => (settings.day_window(first)?.0, settings.day_window(next)?.0),
        _ => return Err(Error::validation(format!("cannot derive the month of {today}"))),
    };

    let month_orders = Order::find()
        .filter(order::Column::Status.eq(OrderStatus::Closed))
        .filter(order::Column::ClosedAt.gte(month_start))
        .filter(order::Column::ClosedAt.lt(month_end))
        .all(db)
        .await?;

    let revenue_month: f64 = month_orders.iter().map(|o| o.total_amount).sum();
    let revenue_today: f64 = month_orders
        .iter()
        .filter(|o| o.closed_at.is_some_and(|at| at >= day_start && at < day_end))
        .map(|o| o.total_amount)
        .sum();
    let closed_orders = month_orders.len() as u64;

    let upcoming_appointments = Appointment::find()
        .filter(appointment::Column::ScheduledAt.gte(day_start))
        .filter(appointment::Column::Status.ne(AppointmentStatus::Cancelled))
        .count(db)
        .await?;

    let next_pending = Appointment::find()
        .filter(appointment::Column::ScheduledAt.gte(day_start))
        .filter(appointment::Column::Status.eq(AppointmentStatus::Pending))
        .order_by_asc(appointment::Column::ScheduledAt)
        .limit(NEXT_PENDING_LIMIT)
        .all(db)
        .await?;

    let recent_orders = Order::find()
        .filter(order::Column::Status.eq(OrderStatus::Closed))
        .order_by_desc(order::Column::ClosedAt)
        .order_by_desc(order::Column::Id)
        .limit(RECENT_ORDERS_LIMIT)
        .all(db)
        .await?;
    let revenue_breakdown = month_breakdown(db, &month_orders).await?;

    Ok(ManagementReport {
        revenue_today,
        revenue_month,
        closed_orders,
        average_ticket: average_ticket(revenue_month, closed_orders),
        upcoming_appointments,
        next_pending,
        barber_performance: rank_barbers(&month_orders),
        recent_orders,
        revenue_breakdown,
    })
}
