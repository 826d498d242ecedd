mod common;

use futures::future::join_all;

use common::{fixture, SEAT_PRICE};
use concert_ticketing::error::{ErrorKind, TicketError};
use concert_ticketing::models::{ReservationStatus, SeatStatus};
use concert_ticketing::services::PaymentCommand;

fn pay_full(user_id: i64, reservation_id: i64) -> PaymentCommand {
    PaymentCommand {
        user_id,
        reservation_id,
        use_point: None,
    }
}

#[tokio::test]
async fn full_payment_settles_seat_reservation_and_balance() {
    let fx = fixture();
    let user = fx.user(1500);
    let (seat, reservation) = fx.reserved(&user, Some(SEAT_PRICE)).await;

    let receipt = fx
        .service
        .pay(pay_full(user.id(), reservation.id()))
        .await
        .unwrap();

    assert_eq!(receipt.paid_amount, SEAT_PRICE);
    assert_eq!(receipt.remaining_points, 500);
    assert_eq!(receipt.seat_id, seat.id());
    assert_eq!(fx.user_now(user.id()).await.points(), 500);
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Paid);
    assert_eq!(
        fx.reservation_now(reservation.id()).await.unwrap().status(),
        ReservationStatus::Paid
    );
}

#[tokio::test]
async fn insufficient_points_leave_everything_untouched() {
    let fx = fixture();
    let user = fx.user(0);
    let (seat, reservation) = fx.reserved(&user, Some(SEAT_PRICE)).await;

    let err = fx
        .service
        .pay(pay_full(user.id(), reservation.id()))
        .await
        .unwrap_err();

    assert!(matches!(err, TicketError::InsufficientPoints));
    assert_eq!(err.kind(), ErrorKind::InsufficientResource);
    assert_eq!(fx.user_now(user.id()).await.points(), 0);
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Reserved);
    assert_eq!(
        fx.reservation_now(reservation.id()).await.unwrap().status(),
        ReservationStatus::NotPaid
    );
}

#[tokio::test]
async fn stranger_cannot_pay_for_someone_elses_reservation() {
    let fx = fixture();
    let owner = fx.user(0);
    let stranger = fx.user(999_999);
    let (seat, reservation) = fx.reserved(&owner, Some(SEAT_PRICE)).await;

    let err = fx
        .service
        .pay(pay_full(stranger.id(), reservation.id()))
        .await
        .unwrap_err();

    assert!(matches!(err, TicketError::ReservationOwnerMismatch));
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(fx.user_now(stranger.id()).await.points(), 999_999);
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Reserved);
    assert!(!fx.reservation_now(reservation.id()).await.unwrap().is_paid());
}

#[tokio::test]
async fn second_payment_is_rejected_without_charging_again() {
    let fx = fixture();
    let user = fx.user(5000);
    let (seat, reservation) = fx.reserved(&user, Some(SEAT_PRICE)).await;

    fx.service
        .pay(pay_full(user.id(), reservation.id()))
        .await
        .unwrap();
    let err = fx
        .service
        .pay(pay_full(user.id(), reservation.id()))
        .await
        .unwrap_err();

    assert!(matches!(err, TicketError::ReservationAlreadyPaid));
    assert_eq!(fx.user_now(user.id()).await.points(), 4000);
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Paid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_payments_charge_once() {
    let fx = fixture();
    let user = fx.user(10 * SEAT_PRICE);
    let (_, reservation) = fx.reserved(&user, Some(SEAT_PRICE)).await;

    let attempts = (0..20).map(|_| {
        let service = fx.service.clone();
        let cmd = pay_full(user.id(), reservation.id());
        tokio::spawn(async move { service.pay(cmd).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let paid = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(paid, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, TicketError::ReservationAlreadyPaid), "got {:?}", err);
    }
    assert_eq!(fx.user_now(user.id()).await.points(), 9 * SEAT_PRICE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn one_user_paying_many_reservations_keeps_an_exact_balance() {
    let fx = fixture();
    let user = fx.user(5 * SEAT_PRICE);
    let mut reservations = Vec::new();
    for _ in 0..8 {
        reservations.push(fx.reserved(&user, Some(SEAT_PRICE)).await.1);
    }

    let attempts = reservations.iter().map(|reservation| {
        let service = fx.service.clone();
        let cmd = pay_full(user.id(), reservation.id());
        tokio::spawn(async move { service.pay(cmd).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let paid = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(paid, 5);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, TicketError::InsufficientPoints), "got {:?}", err);
    }
    assert_eq!(fx.user_now(user.id()).await.points(), 0);
}

#[tokio::test]
async fn partial_point_payment_is_accepted() {
    let fx = fixture();
    let user = fx.user(SEAT_PRICE);
    let (seat, reservation) = fx.reserved(&user, Some(SEAT_PRICE)).await;

    let receipt = fx
        .service
        .pay(PaymentCommand {
            user_id: user.id(),
            reservation_id: reservation.id(),
            use_point: Some(300),
        })
        .await
        .unwrap();

    assert_eq!(receipt.paid_amount, 300);
    assert_eq!(receipt.remaining_points, 700);
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Paid);
}

#[tokio::test]
async fn point_amount_is_bounded_by_price_and_zero() {
    let fx = fixture();
    let user = fx.user(10 * SEAT_PRICE);
    let (seat, reservation) = fx.reserved(&user, Some(SEAT_PRICE)).await;

    for (amount, expected) in [
        (SEAT_PRICE + 1, "POINT_EXCEEDS_SEAT_PRICE"),
        (0, "ILLEGAL_POINT_AMOUNT"),
        (-50, "ILLEGAL_POINT_AMOUNT"),
    ] {
        let err = fx
            .service
            .pay(PaymentCommand {
                user_id: user.id(),
                reservation_id: reservation.id(),
                use_point: Some(amount),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), expected, "amount {}", amount);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    assert_eq!(fx.user_now(user.id()).await.points(), 10 * SEAT_PRICE);
    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Reserved);
}

#[tokio::test]
async fn unpriced_seat_cannot_be_paid_for_free() {
    let fx = fixture();
    let user = fx.user(SEAT_PRICE);
    let (seat, reservation) = fx.reserved(&user, None).await;

    let err = fx
        .service
        .pay(pay_full(user.id(), reservation.id()))
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::IllegalPointAmount));

    let err = fx
        .service
        .pay(PaymentCommand {
            user_id: user.id(),
            reservation_id: reservation.id(),
            use_point: Some(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::PointExceedsSeatPrice));

    assert_eq!(fx.seat_now(seat.id()).await.status(), SeatStatus::Reserved);
    assert_eq!(fx.user_now(user.id()).await.points(), SEAT_PRICE);
}

#[tokio::test]
async fn unknown_reservation_is_not_found() {
    let fx = fixture();
    let user = fx.user(SEAT_PRICE);

    let err = fx.service.pay(pay_full(user.id(), 4242)).await.unwrap_err();
    assert!(matches!(err, TicketError::ReservationNotFound));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn charge_point_rejects_non_positive_amounts() {
    let fx = fixture();
    let user = fx.user(100);

    for amount in [0, -1, -1000, i64::MIN] {
        let err = fx.service.charge_point(user.id(), amount).await.unwrap_err();
        assert!(matches!(err, TicketError::IllegalPointAmount), "amount {}", amount);
    }
    assert_eq!(fx.user_now(user.id()).await.points(), 100);

    assert_eq!(fx.service.charge_point(user.id(), 250).await.unwrap(), 350);
    assert!(matches!(
        fx.service.charge_point(77_777, 10).await,
        Err(TicketError::UserNotFound)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_charges_are_not_lost() {
    let fx = fixture();
    let user = fx.user(0);

    let charges = (1..=50).map(|amount| {
        let service = fx.service.clone();
        let user_id = user.id();
        tokio::spawn(async move { service.charge_point(user_id, amount).await })
    });
    for joined in join_all(charges).await {
        joined.unwrap().unwrap();
    }

    assert_eq!(fx.user_now(user.id()).await.points(), (1..=50).sum::<i64>());
}
