use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{TicketError, TicketResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Reserved,
    Paid,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Reserved => "RESERVED",
            SeatStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SeatStatus::Available),
            "RESERVED" => Ok(SeatStatus::Reserved),
            "PAID" => Ok(SeatStatus::Paid),
            other => Err(TicketError::InvalidRecord(format!("seat_status={}", other))),
        }
    }
}

/// A purchasable seat of one performance option.
///
/// The status only moves through the guarded transitions below:
/// AVAILABLE -> RESERVED -> PAID, or RESERVED -> AVAILABLE on release.
/// A failed transition leaves the seat untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seat {
    id: i64,
    option_id: i64,
    label: String,
    price: Option<i64>,
    status: SeatStatus,
}

impl Seat {
    /// A fresh catalog seat, not yet stored (id 0).
    pub fn new(option_id: i64, label: impl Into<String>, price: Option<i64>) -> Self {
        Self {
            id: 0,
            option_id,
            label: label.into(),
            price,
            status: SeatStatus::Available,
        }
    }

    /// Rebuilds a seat from its persisted columns.
    pub fn restore(
        id: i64,
        option_id: i64,
        label: String,
        price: Option<i64>,
        status: SeatStatus,
    ) -> Self {
        Self {
            id,
            option_id,
            label,
            price,
            status,
        }
    }

    pub(crate) fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn option_id(&self) -> i64 {
        self.option_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn price(&self) -> Option<i64> {
        self.price
    }

    pub fn status(&self) -> SeatStatus {
        self.status
    }

    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }

    pub fn reserve(&mut self) -> TicketResult<()> {
        if self.status != SeatStatus::Available {
            return Err(TicketError::SeatNotReservable);
        }
        self.status = SeatStatus::Reserved;
        Ok(())
    }

    pub fn pay(&mut self) -> TicketResult<()> {
        if self.status != SeatStatus::Reserved {
            return Err(TicketError::SeatNotPayable);
        }
        self.status = SeatStatus::Paid;
        Ok(())
    }

    pub fn release(&mut self) -> TicketResult<()> {
        if self.status != SeatStatus::Reserved {
            return Err(TicketError::SeatNotReleasable);
        }
        self.status = SeatStatus::Available;
        Ok(())
    }
}
