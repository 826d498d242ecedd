pub mod payments;
pub mod points;
pub mod reservations;

use axum::{extract::FromRequest, Router};
use std::sync::Arc;
use validator::Validate;

use crate::{error::TicketError, store::TicketStore, AppState};

pub fn routes<S: TicketStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .merge(reservations::routes())
        .merge(payments::routes())
        .merge(points::routes())
}

/// `Json` extractor whose rejections come back as the common error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(TicketError))]
struct ApiJson<T>(T);

/// Rejects requests whose fields fail their `validator` rules.
fn validated<T: Validate>(req: T) -> Result<T, TicketError> {
    req.validate()
        .map_err(|e| TicketError::InvalidRequest(e.to_string()))?;
    Ok(req)
}
