//! In-process store backed by a lease table.
//!
//! Committed rows live in one `RwLock`ed set of tables so that a commit is
//! applied as a single unit. Row locks are per-(kind, id) async mutexes owned
//! by the transaction until it commits, rolls back or is dropped. Writes are
//! staged inside the transaction and only reach the tables on commit.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{StoreTx, TicketStore};
use crate::error::{TicketError, TicketResult};
use crate::models::{NewReservation, Reservation, Seat, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Seat,
    Reservation,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LockKey {
    kind: EntityKind,
    id: i64,
}

type Slots = Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>;

// A slot lives only while someone holds or waits on it.
fn forget_if_idle(slots: &Slots, key: LockKey) {
    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    if slots
        .get(&key)
        .is_some_and(|slot| Arc::strong_count(slot) == 1)
    {
        slots.remove(&key);
    }
}

#[derive(Default)]
struct LeaseTable {
    slots: Slots,
}

/// Exclusive hold on one row, released on drop.
struct Lease {
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl Drop for Lease {
    fn drop(&mut self) {
        drop(self.guard.take());
        forget_if_idle(&self.slots, self.key);
    }
}

impl LeaseTable {
    fn slot(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key).or_default().clone()
    }

    // tokio's mutex queues waiters in FIFO order.
    async fn acquire(&self, key: LockKey, timeout: Option<Duration>) -> TicketResult<Lease> {
        let slot = self.slot(key);
        let guard = match timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, slot.lock_owned()).await;
                match waited {
                    Ok(guard) => guard,
                    Err(_) => {
                        forget_if_idle(&self.slots, key);
                        return Err(TicketError::LockTimeout);
                    }
                }
            }
            None => slot.lock_owned().await,
        };
        Ok(Lease {
            key,
            guard: Some(guard),
            slots: self.slots.clone(),
        })
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Default)]
struct Tables {
    users: HashMap<i64, User>,
    seats: HashMap<i64, Seat>,
    reservations: HashMap<i64, Reservation>,
}

#[derive(Default)]
struct Inner {
    tables: RwLock<Tables>,
    leases: LeaseTable,
    user_seq: AtomicI64,
    seat_seq: AtomicI64,
    reservation_seq: AtomicI64,
    lock_timeout: Option<Duration>,
}

impl Inner {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock waits longer than `limit` fail with `LockTimeout`.
    pub fn with_lock_timeout(limit: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                lock_timeout: Some(limit),
                ..Inner::default()
            }),
        }
    }

    pub fn create_user(&self, name: impl Into<String>, points: i64) -> User {
        let id = self.inner.user_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User::restore(id, name.into(), points.max(0));
        self.inner.write().users.insert(id, user.clone());
        user
    }

    pub fn create_seat(&self, seat: Seat) -> Seat {
        let id = self.inner.seat_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let seat = seat.with_id(id);
        self.inner.write().seats.insert(id, seat.clone());
        seat
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> TicketResult<MemoryTx> {
        Ok(MemoryTx {
            inner: self.inner.clone(),
            leases: HashMap::new(),
            staged: Staged::default(),
        })
    }

    async fn find_user(&self, user_id: i64) -> TicketResult<Option<User>> {
        Ok(self.inner.read().users.get(&user_id).cloned())
    }

    async fn find_seat(&self, seat_id: i64) -> TicketResult<Option<Seat>> {
        Ok(self.inner.read().seats.get(&seat_id).cloned())
    }

    async fn find_reservation(&self, reservation_id: i64) -> TicketResult<Option<Reservation>> {
        Ok(self.inner.read().reservations.get(&reservation_id).cloned())
    }
}

#[derive(Default)]
struct Staged {
    users: HashMap<i64, User>,
    seats: HashMap<i64, Seat>,
    // `None` marks a deletion.
    reservations: HashMap<i64, Option<Reservation>>,
}

impl Staged {
    /// The seat-uniqueness rule: no two live reservations may share a seat.
    fn check_seat_unique(&self, tables: &Tables, candidate: &Reservation) -> TicketResult<()> {
        let staged_clash = self.reservations.values().flatten().any(|r| {
            r.id() != candidate.id() && r.seat_id() == candidate.seat_id()
        });
        let committed_clash = tables.reservations.values().any(|r| {
            r.id() != candidate.id()
                && r.seat_id() == candidate.seat_id()
                && !matches!(self.reservations.get(&r.id()), Some(None))
        });
        if staged_clash || committed_clash {
            return Err(TicketError::SeatNotReservable);
        }
        Ok(())
    }
}

pub struct MemoryTx {
    inner: Arc<Inner>,
    leases: HashMap<LockKey, Lease>,
    staged: Staged,
}

impl MemoryTx {
    /// Returns true when the lease was newly taken by this call.
    async fn lease(&mut self, kind: EntityKind, id: i64) -> TicketResult<bool> {
        let key = LockKey { kind, id };
        if self.leases.contains_key(&key) {
            return Ok(false);
        }
        let lease = self.inner.leases.acquire(key, self.inner.lock_timeout).await?;
        self.leases.insert(key, lease);
        Ok(true)
    }

    fn unlease(&mut self, kind: EntityKind, id: i64) {
        self.leases.remove(&LockKey { kind, id });
    }

    fn holds(&self, kind: EntityKind, id: i64) -> bool {
        self.leases.contains_key(&LockKey { kind, id })
    }

    fn current_seat(&self, seat_id: i64) -> Option<Seat> {
        if let Some(seat) = self.staged.seats.get(&seat_id) {
            return Some(seat.clone());
        }
        self.inner.read().seats.get(&seat_id).cloned()
    }

    fn current_user(&self, user_id: i64) -> Option<User> {
        if let Some(user) = self.staged.users.get(&user_id) {
            return Some(user.clone());
        }
        self.inner.read().users.get(&user_id).cloned()
    }

    fn current_reservation(&self, reservation_id: i64) -> Option<Reservation> {
        if let Some(staged) = self.staged.reservations.get(&reservation_id) {
            return staged.clone();
        }
        self.inner.read().reservations.get(&reservation_id).cloned()
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn user_exists(&mut self, user_id: i64) -> TicketResult<bool> {
        Ok(self.current_user(user_id).is_some())
    }

    async fn seat_for_update(&mut self, seat_id: i64) -> TicketResult<Seat> {
        let fresh = self.lease(EntityKind::Seat, seat_id).await?;
        match self.current_seat(seat_id) {
            Some(seat) => Ok(seat),
            None => {
                if fresh {
                    self.unlease(EntityKind::Seat, seat_id);
                }
                Err(TicketError::SeatNotFound)
            }
        }
    }

    async fn reservation_for_update(&mut self, reservation_id: i64) -> TicketResult<Reservation> {
        let fresh = self.lease(EntityKind::Reservation, reservation_id).await?;
        match self.current_reservation(reservation_id) {
            Some(reservation) => Ok(reservation),
            None => {
                if fresh {
                    self.unlease(EntityKind::Reservation, reservation_id);
                }
                Err(TicketError::ReservationNotFound)
            }
        }
    }

    async fn user_for_update(&mut self, user_id: i64) -> TicketResult<User> {
        let fresh = self.lease(EntityKind::User, user_id).await?;
        match self.current_user(user_id) {
            Some(user) => Ok(user),
            None => {
                if fresh {
                    self.unlease(EntityKind::User, user_id);
                }
                Err(TicketError::UserNotFound)
            }
        }
    }

    async fn insert_reservation(&mut self, new: &NewReservation) -> TicketResult<Reservation> {
        let id = self.inner.reservation_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let reservation = Reservation::from_new(id, new);
        {
            let tables = self.inner.read();
            self.staged.check_seat_unique(&tables, &reservation)?;
        }
        self.staged
            .reservations
            .insert(id, Some(reservation.clone()));
        Ok(reservation)
    }

    async fn update_seat(&mut self, seat: &Seat) -> TicketResult<()> {
        debug_assert!(self.holds(EntityKind::Seat, seat.id()));
        self.staged.seats.insert(seat.id(), seat.clone());
        Ok(())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> TicketResult<()> {
        self.staged
            .reservations
            .insert(reservation.id(), Some(reservation.clone()));
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> TicketResult<()> {
        debug_assert!(self.holds(EntityKind::User, user.id()));
        self.staged.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn delete_reservation(&mut self, reservation_id: i64) -> TicketResult<()> {
        self.staged.reservations.insert(reservation_id, None);
        Ok(())
    }

    async fn commit(self) -> TicketResult<()> {
        let MemoryTx { inner, leases, staged } = self;
        {
            let mut tables = inner.write();
            for reservation in staged.reservations.values().flatten() {
                staged.check_seat_unique(&tables, reservation)?;
            }

            let Staged { users, seats, reservations } = staged;
            tables.users.extend(users);
            tables.seats.extend(seats);
            for (id, reservation) in reservations {
                match reservation {
                    Some(r) => {
                        tables.reservations.insert(id, r);
                    }
                    None => {
                        tables.reservations.remove(&id);
                    }
                }
            }
        }
        drop(leases);
        Ok(())
    }

    async fn rollback(self) -> TicketResult<()> {
        drop(self);
        Ok(())
    }
}
