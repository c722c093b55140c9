//! Shop settings endpoints.

use axum::{Json, Router, extract::State, routing::get};
use tracing::info;

use crate::{
    api::AppState,
    core::{
        principal::Principal,
        settings::{self, SettingsUpdate, ShopSettings},
    },
    errors::Result,
};

/// Routes mounted under `/api/settings`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(fetch).put(update))
}

/// Public; stores the defaults on first read.
pub async fn fetch(State(state): State<AppState>) -> Result<Json<ShopSettings>> {
    info!("GET /api/settings");
    Ok(Json(settings::get_or_create_settings(&state.db).await?))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<ShopSettings>> {
    info!("PUT /api/settings - {:?}", update);
    Ok(Json(
        settings::update_settings(&state.db, &principal, update).await?,
    ))
}
