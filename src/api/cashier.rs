//! Cashier endpoints: register open/close, expenses, status and history.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::{
    api::AppState,
    core::{
        availability::parse_date,
        cashier::{self, CashierStatus, CloseOutcome},
        principal::Principal,
    },
    entities::{cashier_session, cashier_transaction},
    errors::Result,
};

/// Routes mounted under `/api/cashier`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/open", post(open))
        .route("/expense", post(expense))
        .route("/close", post(close))
        .route("/status", get(status))
        .route("/history", get(history))
}

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    #[serde(default)]
    pub initial_value: f64,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    pub amount: f64,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub declared_value: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Shop-local `YYYY-MM-DD`
    pub date: Option<String>,
}

pub async fn open(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<OpenRequest>,
) -> Result<(StatusCode, Json<cashier_session::Model>)> {
    info!("POST /api/cashier/open - request: {:?}", request);
    let session =
        cashier::open_session(&state.db, &principal, request.initial_value, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn expense(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<ExpenseRequest>,
) -> Result<(StatusCode, Json<cashier_transaction::Model>)> {
    info!("POST /api/cashier/expense - request: {:?}", request);
    let entry = cashier::record_expense(
        &state.db,
        &principal,
        request.amount,
        request.description,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn close(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CloseRequest>,
) -> Result<Json<CloseOutcome>> {
    info!("POST /api/cashier/close - declared {:.2}", request.declared_value);
    let outcome = cashier::close_session(
        &state.db,
        &principal,
        request.declared_value,
        request.notes,
        Utc::now(),
    )
    .await?;
    Ok(Json(outcome))
}

pub async fn status(
    State(state): State<AppState>,
    _principal: Principal,
) -> Result<Json<CashierStatus>> {
    info!("GET /api/cashier/status");
    Ok(Json(cashier::cashier_status(&state.db).await?))
}

pub async fn history(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<cashier_session::Model>>> {
    info!("GET /api/cashier/history - date {:?}", query.date);
    let day = query.date.as_deref().map(parse_date).transpose()?;
    Ok(Json(
        cashier::session_history(&state.db, &principal, day).await?,
    ))
}
