//! Postgres store. Row locks are `SELECT ... FOR UPDATE`; each transaction sets a
//! `lock_timeout` so a stuck holder surfaces as `LockTimeout` instead of hanging.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Transaction};

use super::{StoreTx, TicketStore};
use crate::database::Database;
use crate::error::{TicketError, TicketResult};
use crate::models::{NewReservation, Reservation, ReservationStatus, Seat, SeatStatus, User};

#[derive(Debug, FromRow)]
struct SeatRow {
    seat_id: i64,
    concert_option_id: i64,
    seat_number: String,
    price: Option<i64>,
    seat_status: String,
}

impl TryFrom<SeatRow> for Seat {
    type Error = TicketError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat::restore(
            row.seat_id,
            row.concert_option_id,
            row.seat_number,
            row.price,
            row.seat_status.parse::<SeatStatus>()?,
        ))
    }
}

#[derive(Debug, FromRow)]
struct ReservationRow {
    reservation_id: i64,
    user_id: i64,
    seat_id: i64,
    reservation_status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = TicketError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation::restore(
            row.reservation_id,
            row.user_id,
            row.seat_id,
            row.reservation_status.parse::<ReservationStatus>()?,
            row.created_at,
        ))
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: i64,
    name: String,
    points: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::restore(row.user_id, row.name, row.points)
    }
}

const SEAT_COLUMNS: &str = "seat_id, concert_option_id, seat_number, price, seat_status";
const RESERVATION_COLUMNS: &str = "reservation_id, user_id, seat_id, reservation_status, created_at";
const USER_COLUMNS: &str = "user_id, name, points";

#[derive(Clone)]
pub struct PgStore {
    db: Database,
    lock_timeout_ms: u64,
}

impl PgStore {
    /// `lock_timeout_ms = 0` waits forever, as Postgres does.
    pub fn new(db: Database, lock_timeout_ms: u64) -> Self {
        Self {
            db,
            lock_timeout_ms,
        }
    }

    pub async fn create_user(&self, name: &str, points: i64) -> TicketResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (name, points) VALUES ($1, $2) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(name)
        .bind(points)
        .fetch_one(&self.db.pool)
        .await
        .map_err(TicketError::from_db)?;
        Ok(row.into())
    }

    pub async fn create_seat(&self, seat: &Seat) -> TicketResult<Seat> {
        let row: SeatRow = sqlx::query_as(&format!(
            "INSERT INTO seats (concert_option_id, seat_number, price, seat_status)
             VALUES ($1, $2, $3, $4) RETURNING {}",
            SEAT_COLUMNS
        ))
        .bind(seat.option_id())
        .bind(seat.label())
        .bind(seat.price())
        .bind(seat.status().as_str())
        .fetch_one(&self.db.pool)
        .await
        .map_err(TicketError::from_db)?;
        row.try_into()
    }
}

#[async_trait]
impl TicketStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> TicketResult<PgTx> {
        let mut tx = self.db.pool.begin().await.map_err(TicketError::from_db)?;
        // SET does not accept bind parameters; the value is a plain integer.
        sqlx::query(&format!("SET LOCAL lock_timeout = {}", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await
            .map_err(TicketError::from_db)?;
        Ok(PgTx { tx })
    }

    async fn find_user(&self, user_id: i64) -> TicketResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db.pool)
        .await
        .map_err(TicketError::from_db)?;
        Ok(row.map(User::from))
    }

    async fn find_seat(&self, seat_id: i64) -> TicketResult<Option<Seat>> {
        let row: Option<SeatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM seats WHERE seat_id = $1",
            SEAT_COLUMNS
        ))
        .bind(seat_id)
        .fetch_optional(&self.db.pool)
        .await
        .map_err(TicketError::from_db)?;
        row.map(Seat::try_from).transpose()
    }

    async fn find_reservation(&self, reservation_id: i64) -> TicketResult<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE reservation_id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(reservation_id)
        .fetch_optional(&self.db.pool)
        .await
        .map_err(TicketError::from_db)?;
        row.map(Reservation::try_from).transpose()
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn user_exists(&mut self, user_id: i64) -> TicketResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(TicketError::from_db)
    }

    async fn seat_for_update(&mut self, seat_id: i64) -> TicketResult<Seat> {
        let row: Option<SeatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM seats WHERE seat_id = $1 FOR UPDATE",
            SEAT_COLUMNS
        ))
        .bind(seat_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(TicketError::from_db)?;
        row.ok_or(TicketError::SeatNotFound)?.try_into()
    }

    async fn reservation_for_update(&mut self, reservation_id: i64) -> TicketResult<Reservation> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE reservation_id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(reservation_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(TicketError::from_db)?;
        row.ok_or(TicketError::ReservationNotFound)?.try_into()
    }

    async fn user_for_update(&mut self, user_id: i64) -> TicketResult<User> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE user_id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(TicketError::from_db)?;
        Ok(row.ok_or(TicketError::UserNotFound)?.into())
    }

    async fn insert_reservation(&mut self, new: &NewReservation) -> TicketResult<Reservation> {
        let row: ReservationRow = sqlx::query_as(&format!(
            "INSERT INTO reservations (user_id, seat_id, reservation_status, created_at)
             VALUES ($1, $2, $3, $4) RETURNING {}",
            RESERVATION_COLUMNS
        ))
        .bind(new.user_id)
        .bind(new.seat_id)
        .bind(ReservationStatus::NotPaid.as_str())
        .bind(new.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(TicketError::from_db)?;
        row.try_into()
    }

    async fn update_seat(&mut self, seat: &Seat) -> TicketResult<()> {
        sqlx::query("UPDATE seats SET seat_status = $2 WHERE seat_id = $1")
            .bind(seat.id())
            .bind(seat.status().as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(TicketError::from_db)?;
        Ok(())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> TicketResult<()> {
        sqlx::query("UPDATE reservations SET reservation_status = $2 WHERE reservation_id = $1")
            .bind(reservation.id())
            .bind(reservation.status().as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(TicketError::from_db)?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> TicketResult<()> {
        sqlx::query("UPDATE users SET points = $2 WHERE user_id = $1")
            .bind(user.id())
            .bind(user.points())
            .execute(&mut *self.tx)
            .await
            .map_err(TicketError::from_db)?;
        Ok(())
    }

    async fn delete_reservation(&mut self, reservation_id: i64) -> TicketResult<()> {
        sqlx::query("DELETE FROM reservations WHERE reservation_id = $1")
            .bind(reservation_id)
            .execute(&mut *self.tx)
            .await
            .map_err(TicketError::from_db)?;
        Ok(())
    }

    async fn commit(self) -> TicketResult<()> {
        self.tx.commit().await.map_err(TicketError::from_db)
    }

    async fn rollback(self) -> TicketResult<()> {
        self.tx.rollback().await.map_err(TicketError::from_db)
    }
}
