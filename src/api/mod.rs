//! # REST API
//!
//! Thin axum layer over [`crate::core`]. Handlers extract the caller
//! [`Principal`](crate::core::principal::Principal) from gateway headers, call
//! one core operation with the current time, and render its result or its
//! [`Error`](crate::errors::Error) as JSON.

use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;

pub mod appointments;
pub mod auth;
pub mod cashier;
pub mod catalog;
pub mod error;
pub mod history;
pub mod orders;
pub mod reports;
pub mod settings;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
}

impl AppState {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// The full `/api` surface with request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/appointments", appointments::router())
        .nest("/api/cashier", cashier::router())
        .nest("/api/history", history::router())
        .nest("/api/orders", orders::router())
        .nest("/api/services", catalog::services_router())
        .nest("/api/products", catalog::products_router())
        .nest("/api/settings", settings::router())
        .nest("/api/stats", reports::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
