//! Comanda endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::{
    api::AppState,
    core::{
        availability::parse_date,
        order::{self, NewItem, NewOrder, OrderFilter, OrderView, SettleRequest},
        principal::Principal,
    },
    entities::OrderStatus,
    errors::Result,
};

/// Routes mounted under `/api/orders`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/my-open-comanda", get(my_open))
        .route("/:id", get(fetch).delete(remove))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id", delete(remove_item))
        .route("/:id/pre-close", put(pre_close))
        .route("/:id/close", put(close))
}

/// Query string of `GET /api/orders`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Cashier session id
    pub cashier: Option<i64>,
    pub barber: Option<i64>,
    pub status: Option<OrderStatus>,
    /// Shop-local `YYYY-MM-DD`, inclusive
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderView>>> {
    info!("GET /api/orders - {:?}", query);
    let filter = OrderFilter {
        session_id: query.cashier,
        barber_id: query.barber,
        status: query.status,
        from: query.start_date.as_deref().map(parse_date).transpose()?,
        to: query.end_date.as_deref().map(parse_date).transpose()?,
    };
    Ok(Json(order::list_orders(&state.db, &principal, filter).await?))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<NewOrder>,
) -> Result<(StatusCode, Json<OrderView>)> {
    info!("POST /api/orders - request: {:?}", request);
    let view = order::create_order(&state.db, &principal, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// The caller's open or ready comanda; `null` when there is none.
pub async fn my_open(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Option<OrderView>>> {
    info!("GET /api/orders/my-open-comanda for user {}", principal.id);
    Ok(Json(order::my_open_order(&state.db, &principal).await?))
}

pub async fn fetch(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>> {
    info!("GET /api/orders/{}", id);
    Ok(Json(order::get_order(&state.db, &principal, id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(item): Json<NewItem>,
) -> Result<Json<OrderView>> {
    info!("POST /api/orders/{}/items - {:?}", id, item);
    Ok(Json(
        order::add_item(&state.db, &principal, id, item, Utc::now()).await?,
    ))
}

pub async fn remove_item(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, item_id)): Path<(i64, i64)>,
) -> Result<Json<OrderView>> {
    info!("DELETE /api/orders/{}/items/{}", id, item_id);
    Ok(Json(
        order::remove_item(&state.db, &principal, id, item_id).await?,
    ))
}

pub async fn pre_close(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>> {
    info!("PUT /api/orders/{}/pre-close", id);
    Ok(Json(order::pre_close(&state.db, &principal, id).await?))
}

pub async fn close(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(request): Json<SettleRequest>,
) -> Result<Json<OrderView>> {
    info!("PUT /api/orders/{}/close - {:?}", id, request);
    Ok(Json(
        order::close_order(&state.db, &principal, id, request, Utc::now()).await?,
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    info!("DELETE /api/orders/{}", id);
    order::delete_order(&state.db, &principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        api::{AppState, app},
        core::{catalog::get_product, principal::Role},
        test_utils::*,
    };
    use axum::http::Method;
    use serde_json::json;

    fn admin() -> Option<Principal> {
        Some(Principal::new(1, Role::Admin))
    }

    fn barber() -> Option<Principal> {
        Some(Principal::new(10, Role::Barber))
    }

    #[tokio::test]
    async fn test_order_requires_open_register() -> Result<()> {
        let db = setup_with_settings().await?;
        let app = app(AppState::new(db));
        let (status, body) =
            send(&app, Method::POST, "/api/orders", barber(), Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "CONFLICT");
        Ok(())
    }

    #[tokio::test]
    async fn test_comanda_flow() -> Result<()> {
        let db = setup_with_settings().await?;
        let service = create_test_service(&db, "Corte").await?;
        let product = create_test_product(&db, "Pomada", 3).await?;
        create_test_session(&db).await?;
        let app = app(AppState::new(db.clone()));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/orders",
            barber(),
            Some(json!({
                "client_id": 5,
                "items": [{ "kind": "SERVICE", "item_id": service.id }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["total_amount"], 40.0);
        let order_id = body["id"].as_i64().unwrap();

        // The client adds a product to their own comanda
        let client = Some(Principal::new(5, Role::Client));
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/orders/{order_id}/items"),
            client,
            Some(json!({ "kind": "PRODUCT", "item_id": product.id, "quantity": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_amount"], 90.0);
        assert_eq!(get_product(&db, product.id).await?.stock, 1);

        let (status, body) =
            send(&app, Method::GET, "/api/orders/my-open-comanda", client, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], order_id);

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/orders/{order_id}/pre-close"),
            barber(),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/orders/{order_id}/close"),
            admin(),
            Some(json!({ "payment_method": "PIX", "tip_amount": 10.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "CLOSED");
        assert_eq!(body["payment_method"], "PIX");

        let (status, body) = send(&app, Method::GET, "/api/cashier/status", admin(), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["pix_total"], 100.0);

        // Settled orders cannot be changed
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/orders/{order_id}/items"),
            barber(),
            Some(json!({ "kind": "SERVICE", "item_id": service.id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_orders_scoped_by_role() -> Result<()> {
        let db = setup_with_settings().await?;
        let session = create_test_session(&db).await?;
        insert_order_row(&db, session.id, 10, 40.0).await?;
        insert_order_row(&db, session.id, 11, 30.0).await?;
        insert_closed_order(&db, session.id, 11, 55.0, chrono::Utc::now()).await?;
        let app = app(AppState::new(db));

        let (status, body) = send(&app, Method::GET, "/api/orders", admin(), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = send(&app, Method::GET, "/api/orders", barber(), None).await;
        assert_eq!(status, StatusCode::OK);
        let own = body.as_array().unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0]["barber_id"], 10);

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/orders?barber=11&status=CLOSED&cashier={}", session.id),
            admin(),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let closed = body.as_array().unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0]["total_amount"], 55.0);

        let client = Some(Principal::new(5, Role::Client));
        let (status, _) = send(&app, Method::GET, "/api/orders", client, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/orders?start_date=04/06/2030",
            admin(),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn test_client_cannot_add_service_or_read_others() -> Result<()> {
        let db = setup_with_settings().await?;
        let service = create_test_service(&db, "Corte").await?;
        create_test_session(&db).await?;
        let app = app(AppState::new(db));

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/orders",
            barber(),
            Some(json!({ "client_id": 5 })),
        )
        .await;
        let order_id = body["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/orders/{order_id}/items"),
            Some(Principal::new(5, Role::Client)),
            Some(json!({ "kind": "SERVICE", "item_id": service.id })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/orders/{order_id}"),
            Some(Principal::new(6, Role::Client)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_returns_no_content() -> Result<()> {
        let db = setup_with_settings().await?;
        create_test_session(&db).await?;
        let app = app(AppState::new(db));

        let (_, body) = send(&app, Method::POST, "/api/orders", barber(), Some(json!({}))).await;
        let order_id = body["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/orders/{order_id}"),
            admin(),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/orders/{order_id}"),
            admin(),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
