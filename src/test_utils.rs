//! Shared test utilities for `chairside`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use std::sync::Mutex;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::{
    config::shop::ShopConfig,
    core::{
        availability::BookingRequest,
        notify::{Notification, Notifier},
        principal::{Principal, Role},
        schedule::{BusinessHours, SaturdayHours, ScheduleConfig},
        settings::{ShopSettings, seed_settings},
    },
    entities::{
        AppointmentStatus, OrderStatus, PaymentMethod, SessionStatus, appointment,
        cashier_session, order, product, service,
    },
    errors::{Error, Result},
};
use tower::util::ServiceExt;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Shop configuration used by most tests.
///
/// # Defaults
/// * timezone: UTC, so wall-clock times equal UTC times
/// * Monday to Friday 09:00-12:00 and 13:00-18:00, Saturday and Sunday closed
/// * 30 minute slots, 2 hour cancellation window, no holidays
#[must_use]
pub fn test_shop_config() -> ShopConfig {
    ShopConfig {
        name: "Test Shop".to_string(),
        timezone: "UTC".to_string(),
        schedule: ScheduleConfig::Legacy {
            business_hours: BusinessHours::default(),
            saturday_hours: SaturdayHours {
                active: false,
                ..SaturdayHours::default()
            },
            working_days: vec![1, 2, 3, 4, 5],
        },
        ..ShopConfig::default()
    }
}

/// Resolved settings for [`test_shop_config`], without a database.
#[must_use]
pub fn weekday_settings() -> ShopSettings {
    ShopSettings::from_config(&test_shop_config()).unwrap_or_default()
}

/// In-memory database with the settings row seeded from [`test_shop_config`].
pub async fn setup_with_settings() -> Result<DatabaseConnection> {
    let db = setup_test_db().await?;
    seed_settings(&db, &test_shop_config()).await?;
    Ok(db)
}

/// `date` at `hour:minute` UTC.
#[must_use]
pub fn utc(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0).unwrap_or_default())
}

/// A "now" safely before every date used in tests.
#[must_use]
pub fn long_ago() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A booking request without the AI consultation.
#[must_use]
pub fn booking(barber_id: i64, service_id: i64, at: DateTime<Utc>) -> BookingRequest {
    BookingRequest {
        barber_id,
        service_id,
        scheduled_at: at,
        with_ai: false,
    }
}

/// Creates an active service.
///
/// # Defaults
/// * price: 40.0
/// * `duration_minutes`: 30
pub async fn create_test_service(db: &DatabaseConnection, name: &str) -> Result<service::Model> {
    crate::core::catalog::create_service(
        db,
        &Principal::new(1, Role::Admin),
        crate::core::catalog::NewService {
            name: name.to_string(),
            price: 40.0,
            duration_minutes: 30,
        },
    )
    .await
}

/// Creates an active product with `stock` units.
///
/// # Defaults
/// * price: 25.0
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    stock: i32,
) -> Result<product::Model> {
    crate::core::catalog::create_product(
        db,
        &Principal::new(1, Role::Admin),
        crate::core::catalog::NewProduct {
            name: name.to_string(),
            price: 25.0,
            stock,
            category: None,
        },
    )
    .await
}

/// Inserts a `PENDING` appointment directly, skipping booking validation.
pub async fn insert_appointment(
    db: &DatabaseConnection,
    client_id: i64,
    barber_id: i64,
    service_id: i64,
    at: DateTime<Utc>,
) -> Result<appointment::Model> {
    appointment::ActiveModel {
        client_id: Set(client_id),
        barber_id: Set(barber_id),
        service_id: Set(service_id),
        scheduled_at: Set(at),
        status: Set(AppointmentStatus::Pending),
        with_ai: Set(false),
        notes: Set(None),
        notified: Set(false),
        created_at: Set(at),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Forces an appointment into `status`.
pub async fn set_appointment_status(
    db: &DatabaseConnection,
    appointment_id: i64,
    status: AppointmentStatus,
) -> Result<appointment::Model> {
    appointment::ActiveModel {
        id: Set(appointment_id),
        status: Set(status),
        ..Default::default()
    }
    .update(db)
    .await
    .map_err(Into::into)
}

/// Inserts an `OPEN` cashier session with a zero float.
pub async fn create_test_session(db: &DatabaseConnection) -> Result<cashier_session::Model> {
    cashier_session::ActiveModel {
        opened_by: Set(1),
        opened_at: Set(Utc::now()),
        initial_value: Set(0.0),
        status: Set(SessionStatus::Open),
        cash_total: Set(0.0),
        card_total: Set(0.0),
        pix_total: Set(0.0),
        other_total: Set(0.0),
        expenses_total: Set(0.0),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts an `OPEN` order row with a fixed total and no lines.
pub async fn insert_order_row(
    db: &DatabaseConnection,
    session_id: i64,
    barber_id: i64,
    total: f64,
) -> Result<order::Model> {
    order::ActiveModel {
        client_id: Set(None),
        barber_id: Set(barber_id),
        session_id: Set(session_id),
        appointment_id: Set(None),
        total_amount: Set(total),
        tip_amount: Set(0.0),
        payment_method: Set(None),
        status: Set(OrderStatus::Open),
        created_at: Set(Utc::now()),
        closed_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a `CLOSED` cash order settled at `closed_at`.
pub async fn insert_closed_order(
    db: &DatabaseConnection,
    session_id: i64,
    barber_id: i64,
    total: f64,
    closed_at: DateTime<Utc>,
) -> Result<order::Model> {
    order::ActiveModel {
        client_id: Set(None),
        barber_id: Set(barber_id),
        session_id: Set(session_id),
        appointment_id: Set(None),
        total_amount: Set(total),
        tip_amount: Set(0.0),
        payment_method: Set(Some(PaymentMethod::Cash)),
        status: Set(OrderStatus::Closed),
        created_at: Set(closed_at),
        closed_at: Set(Some(closed_at)),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Notifier that remembers what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A notifier whose every delivery fails after being recorded.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Notifications handed over so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        if self.fail {
            return Err(Error::Config {
                message: "push service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Sends one request through `app` as `principal` and returns the status and
/// JSON body (`Null` when the body is empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    principal: Option<Principal>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(principal) = principal {
        let role = serde_json::to_value(principal.role)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        builder = builder
            .header(crate::api::auth::USER_ID_HEADER, principal.id.to_string())
            .header(crate::api::auth::USER_ROLE_HEADER, role);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap_or_default();

    let response = app.clone().oneshot(request).await.unwrap_or_default();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
