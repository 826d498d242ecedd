use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::{validated, ApiJson};
use crate::{error::TicketError, store::TicketStore, AppState};

pub fn routes<S: TicketStore>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/points/charge", post(charge_point::<S>))
}

// POST /api/points/charge
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ChargePointRequest {
    #[validate(range(min = 1))]
    user_id: i64,
    amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    user_id: i64,
    points: i64,
}

async fn charge_point<S: TicketStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<ChargePointRequest>,
) -> Result<impl IntoResponse, TicketError> {
    let req = validated(req)?;
    let points = state.ticketing.charge_point(req.user_id, req.amount).await?;

    Ok((
        StatusCode::OK,
        Json(BalanceResponse {
            user_id: req.user_id,
            points,
        }),
    ))
}
