//! Service and product endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use tracing::info;

use crate::{
    api::AppState,
    core::{
        catalog::{self, NewProduct, NewService},
        principal::Principal,
    },
    entities::{product, service},
    errors::Result,
};

/// Routes mounted under `/api/services`.
pub fn services_router() -> Router<AppState> {
    Router::new().route("/", get(list_services).post(create_service))
}

/// Routes mounted under `/api/products`.
pub fn products_router() -> Router<AppState> {
    Router::new().route("/", get(list_products).post(create_product))
}

/// Active services; public so clients can pick one when booking.
pub async fn list_services(State(state): State<AppState>) -> Result<Json<Vec<service::Model>>> {
    info!("GET /api/services");
    Ok(Json(catalog::list_services(&state.db).await?))
}

pub async fn create_service(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<NewService>,
) -> Result<(StatusCode, Json<service::Model>)> {
    info!("POST /api/services - request: {:?}", request);
    let created = catalog::create_service(&state.db, &principal, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<product::Model>>> {
    info!("GET /api/products");
    Ok(Json(catalog::list_products(&state.db).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<NewProduct>,
) -> Result<(StatusCode, Json<product::Model>)> {
    info!("POST /api/products - request: {:?}", request);
    let created = catalog::create_product(&state.db, &principal, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
