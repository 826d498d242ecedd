use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Reservation;

/// Emitted after a reservation commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCreated {
    pub event_id: Uuid,
    pub reservation_id: i64,
    pub user_id: i64,
    pub seat_id: i64,
    pub timestamp: DateTime<Utc>,
}

impl ReservationCreated {
    pub fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            reservation_id: reservation.id(),
            user_id: reservation.user_id(),
            seat_id: reservation.seat_id(),
            timestamp: reservation.created_at(),
        }
    }
}
