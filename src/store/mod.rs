//! Locked repository access.
//!
//! A [`StoreTx`] is one database transaction. The `*_for_update` methods check
//! existence and take an exclusive, transaction-scoped lock on the row in one
//! step. A second transaction asking for the same row waits until the first
//! one commits or rolls back; rows with different ids never block each other.
//!
//! Lock order across entity kinds is always Reservation -> Seat -> User.
//! Every workflow that locks more than one kind must follow it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::TicketResult;
use crate::models::{NewReservation, Reservation, Seat, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait TicketStore: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> TicketResult<Self::Tx>;

    // Lock-free reads of committed state.
    async fn find_user(&self, user_id: i64) -> TicketResult<Option<User>>;
    async fn find_seat(&self, seat_id: i64) -> TicketResult<Option<Seat>>;
    async fn find_reservation(&self, reservation_id: i64) -> TicketResult<Option<Reservation>>;
}

/// Dropping a transaction without calling [`StoreTx::commit`] rolls it back.
#[async_trait]
pub trait StoreTx: Send + Sized + 'static {
    /// Existence check without a lock.
    async fn user_exists(&mut self, user_id: i64) -> TicketResult<bool>;

    /// Fails with `SeatNotFound`.
    async fn seat_for_update(&mut self, seat_id: i64) -> TicketResult<Seat>;
    /// Fails with `ReservationNotFound`.
    async fn reservation_for_update(&mut self, reservation_id: i64) -> TicketResult<Reservation>;
    /// Fails with `UserNotFound`.
    async fn user_for_update(&mut self, user_id: i64) -> TicketResult<User>;

    /// Fails with `SeatNotReservable` if another reservation already refers to the seat.
    async fn insert_reservation(&mut self, new: &NewReservation) -> TicketResult<Reservation>;
    async fn update_seat(&mut self, seat: &Seat) -> TicketResult<()>;
    async fn update_reservation(&mut self, reservation: &Reservation) -> TicketResult<()>;
    async fn update_user(&mut self, user: &User) -> TicketResult<()>;
    async fn delete_reservation(&mut self, reservation_id: i64) -> TicketResult<()>;

    async fn commit(self) -> TicketResult<()>;
    async fn rollback(self) -> TicketResult<()>;
}
