//! Appointment endpoints: slot lookup, booking and lifecycle.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::{
    api::AppState,
    core::{
        appointment::{self, StatusUpdate},
        availability::{self, BookingRequest, Slot},
        principal::Principal,
    },
    entities::appointment::Model,
    errors::Result,
};

/// Routes mounted under `/api/appointments`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(book))
        .route("/available-slots", get(available_slots))
        .route("/:id", axum::routing::delete(remove))
        .route("/:id/cancel", put(cancel))
        .route("/:id/status", put(update_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQuery {
    pub barber_id: i64,
    pub date: String,
}

/// Slots of one barber on one shop-local day.
pub async fn available_slots(
    State(state): State<AppState>,
    _principal: Principal,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<Slot>>> {
    info!("GET /api/appointments/available-slots - {:?}", query);
    let date = availability::parse_date(&query.date)?;
    let slots =
        availability::compute_available_slots(&state.db, query.barber_id, date, Utc::now()).await?;
    Ok(Json(slots))
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Model>>> {
    info!("GET /api/appointments");
    Ok(Json(
        appointment::list_for_principal(&state.db, &principal).await?,
    ))
}

pub async fn book(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Model>)> {
    info!("POST /api/appointments - request: {:?}", request);
    let booked = availability::book_appointment(&state.db, &principal, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(booked)))
}

pub async fn cancel(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<Model>> {
    info!("PUT /api/appointments/{}/cancel", id);
    Ok(Json(
        appointment::cancel_appointment(&state.db, &principal, id, Utc::now()).await?,
    ))
}

pub async fn update_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Model>> {
    info!("PUT /api/appointments/{}/status - {:?}", id, update.status);
    Ok(Json(
        appointment::update_status(&state.db, &principal, id, update, Utc::now()).await?,
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    info!("DELETE /api/appointments/{}", id);
    appointment::delete_appointment(&state.db, &principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{api::app, core::principal::Role, test_utils::*};
    use axum::http::Method;
    use chrono::{Datelike, Duration, Weekday};
    use serde_json::json;

    /// Next Tuesday at least a week out, so every slot is in the future.
    fn next_tuesday() -> chrono::NaiveDate {
        let mut day = Utc::now().date_naive() + Duration::days(7);
        while day.weekday() != Weekday::Tue {
            day += Duration::days(1);
        }
        day
    }

    #[tokio::test]
    async fn test_slots_then_book_then_conflict() -> Result<()> {
        let db = setup_with_settings().await?;
        let service = create_test_service(&db, "Corte").await?;
        let app = app(crate::api::AppState::new(db));
        let client = Principal::new(5, Role::Client);
        let day = next_tuesday();

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/appointments/available-slots?barberId=10&date={day}"),
            Some(client),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let slots = body.as_array().unwrap();
        assert_eq!(slots.len(), 16);
        assert_eq!(slots[0]["time"], "09:00");

        let request = json!({
            "barber_id": 10,
            "service_id": service.id,
            "scheduled_at": utc(day, 9, 0),
        });
        let (status, body) =
            send(&app, Method::POST, "/api/appointments", Some(client), Some(request.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "PENDING");

        let other = Principal::new(6, Role::Client);
        let (status, body) =
            send(&app, Method::POST, "/api/appointments", Some(other), Some(request)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "CONFLICT");
        Ok(())
    }

    #[tokio::test]
    async fn test_booking_on_closed_day_is_bad_request() -> Result<()> {
        let db = setup_with_settings().await?;
        let service = create_test_service(&db, "Corte").await?;
        let app = app(crate::api::AppState::new(db));
        let sunday = next_tuesday() - Duration::days(2);

        let request = json!({
            "barber_id": 10,
            "service_id": service.id,
            "scheduled_at": utc(sunday, 10, 0),
        });
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(Principal::new(5, Role::Client)),
            Some(request),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "VALIDATION");
        Ok(())
    }

    #[tokio::test]
    async fn test_requires_identity_headers() -> Result<()> {
        let db = setup_with_settings().await?;
        let app = app(crate::api::AppState::new(db));
        let (status, body) = send(&app, Method::GET, "/api/appointments", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "UNAUTHENTICATED");
        Ok(())
    }

    #[tokio::test]
    async fn test_client_cannot_update_status() -> Result<()> {
        let db = setup_with_settings().await?;
        let service = create_test_service(&db, "Corte").await?;
        let booked =
            insert_appointment(&db, 5, 10, service.id, utc(next_tuesday(), 10, 0)).await?;
        let app = app(crate::api::AppState::new(db));

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/appointments/{}/status", booked.id),
            Some(Principal::new(5, Role::Client)),
            Some(json!({ "status": "CONFIRMED" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/appointments/{}/status", booked.id),
            Some(Principal::new(10, Role::Barber)),
            Some(json!({ "status": "CONFIRMED" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "CONFIRMED");
        Ok(())
    }
}
