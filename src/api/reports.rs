//! Management statistics endpoint.

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use tracing::info;

use crate::{
    api::AppState,
    core::{
        principal::Principal,
        report::{ManagementReport, management_report},
    },
    errors::Result,
};

/// Routes mounted under `/api/stats`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(stats))
}

pub async fn stats(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ManagementReport>> {
    info!("GET /api/stats");
    Ok(Json(
        management_report(&state.db, &principal, Utc::now()).await?,
    ))
}
