//! ticketing.rs
//!
//! Reservation and payment workflows. Each public method runs as one store
//! transaction.
//!
//! 1.  **reserve_seat**: locks the seat, moves it AVAILABLE -> RESERVED and writes a
//!     NOT_PAID reservation. Concurrent attempts on one seat queue on the seat
//!     lock; the first one wins and every later one sees RESERVED and fails
//!     with `SeatNotReservable`.
//! 2.  **pay**: locks Reservation -> Seat -> User (always in this order), checks
//!     ownership, state and balance, then moves all three in one commit.
//! 3.  **charge_point**: locks the user and tops up the balance.
//! 4.  **cancel_reservation / expire_reservation**: locks Reservation -> Seat, releases
//!     the seat and deletes the unpaid reservation.
//!
//! Any failure rolls the whole transaction back. Nothing is retried here.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{TicketError, TicketResult};
use crate::models::{Reservation, ReservationCreated, Seat};
use crate::services::events::ReservationEventPublisher;
use crate::store::{StoreTx, TicketStore};

/// Input of the `Pay` command.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCommand {
    pub user_id: i64,
    pub reservation_id: i64,
    /// Points to spend. Defaults to the full seat price.
    pub use_point: Option<i64>,
}

/// Confirmation of a settled reservation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub reservation_id: i64,
    pub seat_id: i64,
    pub user_id: i64,
    pub paid_amount: i64,
    pub remaining_points: i64,
}

/// Rolls back and hands the original error back to the caller.
async fn abort<T: StoreTx>(tx: T, err: TicketError) -> TicketError {
    if let Err(rollback_err) = tx.rollback().await {
        warn!("Rollback after {} failed: {:?}", err.code(), rollback_err);
    }
    err
}

pub struct TicketingService<S> {
    store: S,
    events: Arc<dyn ReservationEventPublisher>,
}

impl<S: TicketStore> TicketingService<S> {
    pub fn new(store: S, events: Arc<dyn ReservationEventPublisher>) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `ReserveSeat(userId, seatId)`.
    pub async fn reserve_seat(&self, user_id: i64, seat_id: i64) -> TicketResult<Reservation> {
        let mut tx = self.store.begin().await?;
        let reservation = match Self::reserve_in(&mut tx, user_id, seat_id).await {
            Ok(reservation) => reservation,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;

        info!(
            "Seat {} reserved by user {} (reservation {})",
            seat_id,
            user_id,
            reservation.id()
        );
        self.emit_reservation_created(&reservation).await;
        Ok(reservation)
    }

    async fn reserve_in(tx: &mut S::Tx, user_id: i64, seat_id: i64) -> TicketResult<Reservation> {
        // The user row is only read, so it is not locked.
        if !tx.user_exists(user_id).await? {
            return Err(TicketError::UserNotFound);
        }

        let mut seat = tx.seat_for_update(seat_id).await?;
        seat.reserve()?;
        tx.update_seat(&seat).await?;

        tx.insert_reservation(&Reservation::create(user_id, seat_id))
            .await
    }

    async fn emit_reservation_created(&self, reservation: &Reservation) {
        let event = ReservationCreated::from_reservation(reservation);
        if let Err(e) = self.events.publish(&event).await {
            warn!(
                "Reservation {} committed but its event was not delivered: {}",
                reservation.id(),
                e
            );
        }
    }

    /// `Pay(userId, reservationId, usePointAmount?)`.
    pub async fn pay(&self, cmd: PaymentCommand) -> TicketResult<PaymentReceipt> {
        let mut tx = self.store.begin().await?;
        let receipt = match Self::pay_in(&mut tx, &cmd).await {
            Ok(receipt) => receipt,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;

        info!(
            "Reservation {} paid by user {}: {} points, {} left",
            receipt.reservation_id, receipt.user_id, receipt.paid_amount, receipt.remaining_points
        );
        Ok(receipt)
    }

    async fn pay_in(tx: &mut S::Tx, cmd: &PaymentCommand) -> TicketResult<PaymentReceipt> {
        let mut reservation = tx.reservation_for_update(cmd.reservation_id).await?;
        reservation.validate_owner(cmd.user_id)?;
        // Fail before touching the seat and user locks.
        if reservation.is_paid() {
            return Err(TicketError::ReservationAlreadyPaid);
        }

        let mut seat = tx.seat_for_update(reservation.seat_id()).await?;
        let mut user = tx.user_for_update(cmd.user_id).await?;

        let price = seat_price(&seat);
        let amount = cmd.use_point.unwrap_or(price);
        if amount > price {
            return Err(TicketError::PointExceedsSeatPrice);
        }

        user.use_point(amount)?;
        seat.pay()?;
        reservation.pay()?;

        tx.update_user(&user).await?;
        tx.update_seat(&seat).await?;
        tx.update_reservation(&reservation).await?;

        Ok(PaymentReceipt {
            reservation_id: reservation.id(),
            seat_id: seat.id(),
            user_id: user.id(),
            paid_amount: amount,
            remaining_points: user.points(),
        })
    }

    /// `ChargePoint(userId, amount)`. Returns the new balance.
    pub async fn charge_point(&self, user_id: i64, amount: i64) -> TicketResult<i64> {
        let mut tx = self.store.begin().await?;
        let balance = match Self::charge_in(&mut tx, user_id, amount).await {
            Ok(balance) => balance,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;

        info!("User {} charged {} points, balance {}", user_id, amount, balance);
        Ok(balance)
    }

    async fn charge_in(tx: &mut S::Tx, user_id: i64, amount: i64) -> TicketResult<i64> {
        let mut user = tx.user_for_update(user_id).await?;
        user.charge_point(amount)?;
        tx.update_user(&user).await?;
        Ok(user.points())
    }

    /// Owner-initiated release of an unpaid reservation.
    pub async fn cancel_reservation(&self, user_id: i64, reservation_id: i64) -> TicketResult<Seat> {
        let seat = self.release(reservation_id, Some(user_id)).await?;
        info!("Reservation {} cancelled by user {}", reservation_id, user_id);
        Ok(seat)
    }

    /// Releases an unpaid reservation whose hold ran out.
    ///
    /// Returns `false` when there is nothing to expire (already paid or already
    /// gone), so repeated expiry of the same reservation is harmless.
    pub async fn expire_reservation(&self, reservation_id: i64) -> TicketResult<bool> {
        match self.release(reservation_id, None).await {
            Ok(seat) => {
                info!("Reservation {} expired, seat {} available again", reservation_id, seat.id());
                Ok(true)
            }
            Err(TicketError::ReservationNotFound) | Err(TicketError::ReservationAlreadyPaid) => {
                debug!("Reservation {} needs no expiry", reservation_id);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn release(&self, reservation_id: i64, owner: Option<i64>) -> TicketResult<Seat> {
        let mut tx = self.store.begin().await?;
        let seat = match Self::release_in(&mut tx, reservation_id, owner).await {
            Ok(seat) => seat,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;
        Ok(seat)
    }

    async fn release_in(
        tx: &mut S::Tx,
        reservation_id: i64,
        owner: Option<i64>,
    ) -> TicketResult<Seat> {
        let reservation = tx.reservation_for_update(reservation_id).await?;
        if let Some(user_id) = owner {
            reservation.validate_owner(user_id)?;
        }
        if reservation.is_paid() {
            return Err(TicketError::ReservationAlreadyPaid);
        }

        let mut seat = tx.seat_for_update(reservation.seat_id()).await?;
        seat.release()?;
        tx.update_seat(&seat).await?;
        tx.delete_reservation(reservation.id()).await?;
        Ok(seat)
    }
}

// A missing price counts as 0.
fn seat_price(seat: &Seat) -> i64 {
    match seat.price() {
        Some(price) => price,
        None => {
            warn!("Seat {} has no price, treating it as 0", seat.id());
            0
        }
    }
}
