use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{TicketError, TicketResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    NotPaid,
    Paid,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::NotPaid => "NOT_PAID",
            ReservationStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_PAID" => Ok(ReservationStatus::NotPaid),
            "PAID" => Ok(ReservationStatus::Paid),
            other => Err(TicketError::InvalidRecord(format!("reservation_status={}", other))),
        }
    }
}

/// A reservation that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    pub user_id: i64,
    pub seat_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A user's hold on one seat. Refers to the seat and user by id only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reservation {
    id: i64,
    user_id: i64,
    seat_id: i64,
    status: ReservationStatus,
    created_at: DateTime<Utc>,
}

impl Reservation {
    // Seat availability and user existence are checked by the caller.
    pub fn create(user_id: i64, seat_id: i64) -> NewReservation {
        NewReservation {
            user_id,
            seat_id,
            created_at: Utc::now(),
        }
    }

    pub fn restore(
        id: i64,
        user_id: i64,
        seat_id: i64,
        status: ReservationStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            seat_id,
            status,
            created_at,
        }
    }

    pub(crate) fn from_new(id: i64, new: &NewReservation) -> Self {
        Self {
            id,
            user_id: new.user_id,
            seat_id: new.seat_id,
            status: ReservationStatus::NotPaid,
            created_at: new.created_at,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn seat_id(&self) -> i64 {
        self.seat_id
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_paid(&self) -> bool {
        self.status == ReservationStatus::Paid
    }

    pub fn validate_owner(&self, user_id: i64) -> TicketResult<()> {
        if self.user_id != user_id {
            return Err(TicketError::ReservationOwnerMismatch);
        }
        Ok(())
    }

    pub fn pay(&mut self) -> TicketResult<()> {
        if self.status != ReservationStatus::NotPaid {
            return Err(TicketError::ReservationAlreadyPaid);
        }
        self.status = ReservationStatus::Paid;
        Ok(())
    }
}
