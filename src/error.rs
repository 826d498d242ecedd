//! error.rs
//!
//! Failure taxonomy for reservation and payment commands.
//!
//! Every [`TicketError`] belongs to exactly one [`ErrorKind`]. The kind decides the
//! HTTP status returned by the controllers. The variant carries the specific
//! sub-condition so that callers can tell, for example, a lost seat race
//! (`SeatNotReservable`) from a missing seat (`SeatNotFound`).

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Coarse classification of a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Forbidden,
    InvalidArgument,
    InsufficientResource,
    Unexpected,
}

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("user not found")]
    UserNotFound,
    #[error("seat not found")]
    SeatNotFound,
    #[error("reservation not found")]
    ReservationNotFound,

    #[error("seat is already reserved or paid")]
    SeatNotReservable,
    #[error("seat is not in a payable state")]
    SeatNotPayable,
    #[error("seat is not in a releasable state")]
    SeatNotReleasable,
    #[error("reservation is already paid")]
    ReservationAlreadyPaid,

    #[error("reservation belongs to another user")]
    ReservationOwnerMismatch,

    #[error("point amount must be greater than zero")]
    IllegalPointAmount,
    #[error("point amount exceeds the seat price")]
    PointExceedsSeatPrice,
    #[error("not enough points")]
    InsufficientPoints,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Lock wait exceeded the configured timeout. The whole command can be retried on fresh state.
    #[error("timed out waiting for a row lock")]
    LockTimeout,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

impl TicketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TicketError::UserNotFound
            | TicketError::SeatNotFound
            | TicketError::ReservationNotFound => ErrorKind::NotFound,
            TicketError::SeatNotReservable
            | TicketError::SeatNotPayable
            | TicketError::SeatNotReleasable
            | TicketError::ReservationAlreadyPaid => ErrorKind::InvalidState,
            TicketError::ReservationOwnerMismatch => ErrorKind::Forbidden,
            TicketError::IllegalPointAmount
            | TicketError::PointExceedsSeatPrice
            | TicketError::InvalidRequest(_) => ErrorKind::InvalidArgument,
            TicketError::InsufficientPoints => ErrorKind::InsufficientResource,
            TicketError::LockTimeout
            | TicketError::Database(_)
            | TicketError::InvalidRecord(_) => ErrorKind::Unexpected,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            TicketError::UserNotFound => "USER_NOT_FOUND",
            TicketError::SeatNotFound => "SEAT_NOT_FOUND",
            TicketError::ReservationNotFound => "RESERVATION_NOT_FOUND",
            TicketError::SeatNotReservable => "SEAT_NOT_RESERVABLE",
            TicketError::SeatNotPayable => "SEAT_NOT_PAYABLE",
            TicketError::SeatNotReleasable => "SEAT_NOT_RELEASABLE",
            TicketError::ReservationAlreadyPaid => "RESERVATION_ALREADY_PAID",
            TicketError::ReservationOwnerMismatch => "RESERVATION_OWNER_MISMATCH",
            TicketError::IllegalPointAmount => "ILLEGAL_POINT_AMOUNT",
            TicketError::PointExceedsSeatPrice => "POINT_EXCEEDS_SEAT_PRICE",
            TicketError::InsufficientPoints => "INSUFFICIENT_POINTS",
            TicketError::InvalidRequest(_) => "INVALID_REQUEST",
            TicketError::LockTimeout => "LOCK_TIMEOUT",
            TicketError::Database(_) | TicketError::InvalidRecord(_) => "INTERNAL_ERROR",
        }
    }

    /// Message shown to the caller. Unexpected failures never expose their detail.
    pub fn public_message(&self) -> String {
        match self {
            TicketError::LockTimeout => "resource is busy, please retry".to_string(),
            TicketError::Database(_) | TicketError::InvalidRecord(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Classifies a driver error: lock wait timeouts, the seat uniqueness
    /// index, and everything else.
    pub fn from_db(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                // lock_not_available
                Some("55P03") => return TicketError::LockTimeout,
                Some("23505") if db_err.constraint() == Some(SEAT_UNIQUE_INDEX) => {
                    return TicketError::SeatNotReservable
                }
                _ => {}
            }
        }
        TicketError::Database(err)
    }
}

/// Name of the unique index on `reservations(seat_id)` in the initial migration.
pub const SEAT_UNIQUE_INDEX: &str = "reservations_seat_id_key";

impl From<JsonRejection> for TicketError {
    fn from(rejection: JsonRejection) -> Self {
        TicketError::InvalidRequest(rejection.body_text())
    }
}

pub type TicketResult<T> = Result<T, TicketError>;

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::InsufficientResource => StatusCode::CONFLICT,
        ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for TicketError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Unexpected {
            tracing::error!("[UnexpectedError] {}: {:?}", self.code(), self);
        } else {
            tracing::warn!("[TicketError] {}: {}", self.code(), self);
        }

        let body = ApiError {
            success: false,
            kind,
            code: self.code(),
            message: self.public_message(),
        };
        (status_for(kind), Json(body)).into_response()
    }
}
