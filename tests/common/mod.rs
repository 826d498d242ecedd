#![allow(dead_code)]

use async_trait::async_trait;
use fake::{faker::name::en::Name, Fake};
use std::sync::Arc;
use tokio::sync::mpsc;

use concert_ticketing::models::{Reservation, ReservationCreated, Seat, User};
use concert_ticketing::services::{
    ChannelEventPublisher, PublishError, ReservationEventPublisher, TicketingService,
};
use concert_ticketing::store::{MemoryStore, TicketStore};

pub const SEAT_PRICE: i64 = 1000;

pub struct Fixture {
    pub store: MemoryStore,
    pub service: Arc<TicketingService<MemoryStore>>,
    pub events: mpsc::UnboundedReceiver<ReservationCreated>,
}

pub fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let (publisher, events) = ChannelEventPublisher::channel();
    let service = Arc::new(TicketingService::new(store.clone(), Arc::new(publisher)));
    Fixture { store, service, events }
}

impl Fixture {
    pub fn user(&self, points: i64) -> User {
        let name: String = Name().fake();
        self.store.create_user(name, points)
    }

    pub fn seat(&self, price: Option<i64>) -> Seat {
        let label = format!("A{}", (1..500).fake::<u32>());
        self.store.create_seat(Seat::new(1, label, price))
    }

    pub async fn reserved(&self, user: &User, price: Option<i64>) -> (Seat, Reservation) {
        let seat = self.seat(price);
        let reservation = self
            .service
            .reserve_seat(user.id(), seat.id())
            .await
            .expect("reservation should succeed");
        (seat, reservation)
    }

    pub async fn seat_now(&self, seat_id: i64) -> Seat {
        self.store.find_seat(seat_id).await.unwrap().expect("seat exists")
    }

    pub async fn user_now(&self, user_id: i64) -> User {
        self.store.find_user(user_id).await.unwrap().expect("user exists")
    }

    pub async fn reservation_now(&self, reservation_id: i64) -> Option<Reservation> {
        self.store.find_reservation(reservation_id).await.unwrap()
    }
}

/// Publisher whose broker is always down.
pub struct BrokenPublisher;

#[async_trait]
impl ReservationEventPublisher for BrokenPublisher {
    async fn publish(&self, _event: &ReservationCreated) -> Result<(), PublishError> {
        Err(PublishError::ChannelClosed)
    }
}
