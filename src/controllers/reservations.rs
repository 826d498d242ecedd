use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::{validated, ApiJson};
use crate::{
    error::TicketError,
    models::{ReservationStatus, SeatStatus},
    store::TicketStore,
    AppState,
};

pub fn routes<S: TicketStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/reservations", post(reserve_seat::<S>))
        .route("/reservations/cancel", patch(cancel_reservation::<S>))
}

// POST /api/reservations
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ReserveSeatRequest {
    #[validate(range(min = 1))]
    user_id: i64,
    #[validate(range(min = 1))]
    seat_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReservationResponse {
    reservation_id: i64,
    seat_id: i64,
    status: ReservationStatus,
}

async fn reserve_seat<S: TicketStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<ReserveSeatRequest>,
) -> Result<impl IntoResponse, TicketError> {
    let req = validated(req)?;
    let reservation = state.ticketing.reserve_seat(req.user_id, req.seat_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReservationResponse {
            reservation_id: reservation.id(),
            seat_id: reservation.seat_id(),
            status: reservation.status(),
        }),
    ))
}

// PATCH /api/reservations/cancel
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CancelReservationRequest {
    #[validate(range(min = 1))]
    user_id: i64,
    #[validate(range(min = 1))]
    reservation_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelReservationResponse {
    success: bool,
    seat_id: i64,
    seat_status: SeatStatus,
}

async fn cancel_reservation<S: TicketStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<CancelReservationRequest>,
) -> Result<impl IntoResponse, TicketError> {
    let req = validated(req)?;
    let seat = state
        .ticketing
        .cancel_reservation(req.user_id, req.reservation_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(CancelReservationResponse {
            success: true,
            seat_id: seat.id(),
            seat_status: seat.status(),
        }),
    ))
}
