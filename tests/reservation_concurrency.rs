mod common;

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use common::{fixture, BrokenPublisher, SEAT_PRICE};
use concert_ticketing::error::{ErrorKind, TicketError};
use concert_ticketing::models::{ReservationStatus, Seat, SeatStatus};
use concert_ticketing::services::TicketingService;
use concert_ticketing::store::{MemoryStore, TicketStore};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hundred_callers_one_seat_exactly_one_wins() {
    let mut fx = fixture();
    let seat = fx.seat(Some(SEAT_PRICE));
    let users: Vec<_> = (0..100).map(|_| fx.user(0)).collect();

    let attempts = users.iter().map(|user| {
        let service = fx.service.clone();
        let (user_id, seat_id) = (user.id(), seat.id());
        tokio::spawn(async move { service.reserve_seat(user_id, seat_id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let losers: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(losers.len(), 99);
    for err in &losers {
        assert!(matches!(err, TicketError::SeatNotReservable), "got {:?}", err);
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    let winner = winners[0];
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Reserved);
    let stored = fx.reservation_now(winner.id()).await.expect("winner is stored");
    assert_eq!(stored.status(), ReservationStatus::NotPaid);
    assert_eq!(stored.seat_id(), seat.id());

    let event = fx.events.recv().await.expect("one event");
    assert_eq!(event.reservation_id, winner.id());
    assert_eq!(event.user_id, winner.user_id());
    assert!(fx.events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_seats_reserve_in_parallel() {
    let fx = fixture();
    let user = fx.user(0);
    let seats: Vec<_> = (0..20).map(|_| fx.seat(Some(SEAT_PRICE))).collect();

    let attempts = seats.iter().map(|seat| {
        let service = fx.service.clone();
        let (user_id, seat_id) = (user.id(), seat.id());
        tokio::spawn(async move { service.reserve_seat(user_id, seat_id).await })
    });
    for joined in join_all(attempts).await {
        joined.unwrap().expect("every seat is free");
    }
    for seat in &seats {
        assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Reserved);
    }
}

#[tokio::test]
async fn held_seat_lock_does_not_block_other_seats() {
    let store = MemoryStore::with_lock_timeout(Duration::from_millis(200));
    let service = TicketingService::new(store.clone(), Arc::new(BrokenPublisher));
    let user = store.create_user("solo", 0);
    let busy = store.create_seat(Seat::new(1, "A1", Some(SEAT_PRICE)));
    let free = store.create_seat(Seat::new(1, "A2", Some(SEAT_PRICE)));

    let mut holder = store.begin().await.unwrap();
    concert_ticketing::store::StoreTx::seat_for_update(&mut holder, busy.id())
        .await
        .unwrap();

    service.reserve_seat(user.id(), free.id()).await.unwrap();
    assert!(matches!(
        service.reserve_seat(user.id(), busy.id()).await,
        Err(TicketError::LockTimeout)
    ));
    drop(holder);

    assert_eq!(
        store.find_seat(busy.id()).await.unwrap().unwrap().status(),
        SeatStatus::Available
    );
}

#[tokio::test]
async fn paid_seat_cannot_be_reserved_again() {
    let fx = fixture();
    let owner = fx.user(SEAT_PRICE);
    let (seat, reservation) = fx.reserved(&owner, Some(SEAT_PRICE)).await;
    fx.service
        .pay(concert_ticketing::services::PaymentCommand {
            user_id: owner.id(),
            reservation_id: reservation.id(),
            use_point: None,
        })
        .await
        .unwrap();

    let other = fx.user(0);
    let err = fx.service.reserve_seat(other.id(), seat.id()).await.unwrap_err();
    assert!(matches!(err, TicketError::SeatNotReservable));
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Paid);
}

#[tokio::test]
async fn unknown_user_or_seat_is_not_found() {
    let fx = fixture();
    let user = fx.user(0);
    let seat = fx.seat(Some(SEAT_PRICE));

    let err = fx.service.reserve_seat(9_999, seat.id()).await.unwrap_err();
    assert!(matches!(err, TicketError::UserNotFound));
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Available);

    let err = fx.service.reserve_seat(user.id(), 9_999).await.unwrap_err();
    assert!(matches!(err, TicketError::SeatNotFound));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn lost_event_does_not_undo_reservation() {
    let store = MemoryStore::new();
    let service = TicketingService::new(store.clone(), Arc::new(BrokenPublisher));
    let user = store.create_user("payer", 0);
    let seat = store.create_seat(Seat::new(1, "B7", Some(SEAT_PRICE)));

    let reservation = service.reserve_seat(user.id(), seat.id()).await.unwrap();

    assert!(store.find_reservation(reservation.id()).await.unwrap().is_some());
    assert_eq!(
        store.find_seat(seat.id()).await.unwrap().unwrap().status(),
        SeatStatus::Reserved
    );
}
