use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::{validated, ApiJson};
use crate::{
    error::TicketError,
    services::PaymentCommand,
    store::TicketStore,
    AppState,
};

pub fn routes<S: TicketStore>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/payments", post(pay::<S>))
}

// POST /api/payments
// `usePoint` is range-checked by the domain so that bad amounts report ILLEGAL_POINT_AMOUNT.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct PaymentRequest {
    #[validate(range(min = 1))]
    user_id: i64,
    #[validate(range(min = 1))]
    reservation_id: i64,
    use_point: Option<i64>,
}

async fn pay<S: TicketStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> Result<impl IntoResponse, TicketError> {
    let req = validated(req)?;
    let receipt = state
        .ticketing
        .pay(PaymentCommand {
            user_id: req.user_id,
            reservation_id: req.reservation_id,
            use_point: req.use_point,
        })
        .await?;

    Ok((StatusCode::OK, Json(receipt)))
}
