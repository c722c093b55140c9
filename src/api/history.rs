//! Cut history endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use tracing::info;

use crate::{
    api::AppState,
    core::{
        history::{self, NewEntry},
        principal::Principal,
    },
    entities::cut_history,
    errors::Result,
};

/// Routes mounted under `/api/history`.
///
/// `GET /:id` takes a client id, `DELETE /:id` an entry id.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(for_client).delete(remove))
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<cut_history::Model>>> {
    info!("GET /api/history");
    Ok(Json(history::list_history(&state.db, &principal).await?))
}

pub async fn for_client(
    State(state): State<AppState>,
    principal: Principal,
    Path(client_id): Path<i64>,
) -> Result<Json<Vec<cut_history::Model>>> {
    info!("GET /api/history/{}", client_id);
    Ok(Json(
        history::client_history(&state.db, &principal, client_id).await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<NewEntry>,
) -> Result<(StatusCode, Json<cut_history::Model>)> {
    info!("POST /api/history - request: {:?}", request);
    let created = history::record_entry(&state.db, &principal, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn remove(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    info!("DELETE /api/history/{}", id);
    history::delete_entry(&state.db, &principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
