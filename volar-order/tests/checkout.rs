mod common;

use chrono::Duration;
use common::{passenger, Harness};
use std::collections::HashSet;
use volar_core::CoreError;
use volar_order::{CheckinEngine, CheckoutEngine, CheckoutLine, HoldStore, SeatStatus};
use volar_shared::models::events::BOOKING_CONFIRMATION_TEMPLATE;
use volar_shared::{SeatClass, TicketStatus};

#[tokio::test]
async fn test_last_two_seats_are_both_assigned() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    h.sell(&flight, SeatClass::Economy, 8).await;
    let user = h.user(50_000).await;

    let holds = HoldStore::new(h.ctx.clone());
    holds.add_item(user, flight.id, SeatClass::Economy, 2).await.unwrap();

    let receipt = CheckoutEngine::new(h.ctx.clone())
        .with_seat_seed(11)
        .checkout(
            user,
            &[CheckoutLine {
                flight_id: flight.id,
                seat_class: SeatClass::Economy,
                passengers: vec![passenger("Ana Ruiz", "11111111A"), passenger("Luis Mora", "22222222B")],
            }],
        )
        .await
        .unwrap();

    assert_eq!(receipt.tickets.len(), 2);
    assert_eq!(receipt.total_cents, 20_000);
    assert_eq!(receipt.remaining_balance_cents, 30_000);
    assert_eq!(h.store.balance(user).await, Some(30_000));

    let seats: HashSet<_> = receipt.tickets.iter().map(|t| t.seat_code.clone()).collect();
    assert_eq!(seats.len(), 2);
    let sold_before: HashSet<_> = h
        .store
        .tickets()
        .await
        .into_iter()
        .filter(|t| t.user_id != user)
        .map(|t| t.seat_code)
        .collect();
    assert!(seats.is_disjoint(&sold_before));

    let economy: HashSet<_> = h.seat_codes(&flight, SeatClass::Economy).await.into_iter().collect();
    assert!(seats.is_subset(&economy));

    let after = holds.availability(flight.id, SeatClass::Economy).await.unwrap();
    assert_eq!(after.available, 0);
    assert!(h.store.holds().await.is_empty());

    let map = CheckinEngine::new(h.ctx.clone()).seat_map(flight.id).await.unwrap();
    assert_eq!(map.available(SeatClass::Economy), 0);
    assert_eq!(map.available(SeatClass::First), 2);
}

#[tokio::test]
async fn test_tickets_share_purchase_and_checkin_code() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 20, 4).await;
    let user = h.user(200_000).await;

    let holds = HoldStore::new(h.ctx.clone());
    holds.add_item(user, flight.id, SeatClass::Economy, 2).await.unwrap();
    holds.add_item(user, flight.id, SeatClass::First, 1).await.unwrap();

    let receipt = CheckoutEngine::new(h.ctx.clone())
        .with_seat_seed(3)
        .checkout(
            user,
            &[
                CheckoutLine {
                    flight_id: flight.id,
                    seat_class: SeatClass::Economy,
                    passengers: vec![passenger("Ana Ruiz", "11111111A"), passenger("Luis Mora", "22222222B")],
                },
                CheckoutLine {
                    flight_id: flight.id,
                    seat_class: SeatClass::First,
                    passengers: vec![passenger("Eva Gil", "33333333C")],
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(receipt.total_cents, 2 * 10_000 + 40_000);
    assert_eq!(receipt.checkin_code.len(), 8);

    let tickets = h.store.tickets().await;
    assert_eq!(tickets.len(), 3);
    assert_eq!(h.store.passenger_count().await, 3);
    assert!(tickets.iter().all(|t| t.purchase_id == receipt.purchase_id));
    assert!(tickets
        .iter()
        .all(|t| t.checkin_code.as_deref() == Some(receipt.checkin_code.as_str())));
    assert!(tickets.iter().all(|t| t.status == TicketStatus::Paid));

    let first = tickets.iter().find(|t| t.seat_class == SeatClass::First).unwrap();
    assert!(["A1", "B1", "C1", "D1"].contains(&first.seat_code.as_str()));

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|n| n.template == BOOKING_CONFIRMATION_TEMPLATE));
    assert!(sent.iter().any(|n| n.recipient == "eva.gil@example.com"));
}

#[tokio::test]
async fn test_exhausted_pool_rolls_back_everything() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    let user = h.user(100_000).await;

    let holds = HoldStore::new(h.ctx.clone());
    holds.add_item(user, flight.id, SeatClass::Economy, 1).await.unwrap();
    holds.add_item(user, flight.id, SeatClass::First, 2).await.unwrap();

    // Both first-class seats get sold outside the hold system.
    h.sell(&flight, SeatClass::First, 2).await;
    let before = h.store.tickets().await.len();

    let err = CheckoutEngine::new(h.ctx.clone())
        .with_seat_seed(5)
        .checkout(
            user,
            &[
                CheckoutLine {
                    flight_id: flight.id,
                    seat_class: SeatClass::Economy,
                    passengers: vec![passenger("Ana Ruiz", "11111111A")],
                },
                CheckoutLine {
                    flight_id: flight.id,
                    seat_class: SeatClass::First,
                    passengers: vec![passenger("Luis Mora", "22222222B"), passenger("Eva Gil", "33333333C")],
                },
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::NotEnoughSeats { requested: 2, remaining: 0, .. }
    ));
    assert_eq!(h.store.tickets().await.len(), before);
    assert_eq!(h.store.balance(user).await, Some(100_000));
    assert_eq!(h.store.holds().await.len(), 2);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_store_failure_at_commit_leaves_nothing() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    let user = h.user(100_000).await;

    HoldStore::new(h.ctx.clone())
        .add_item(user, flight.id, SeatClass::Economy, 1)
        .await
        .unwrap();
    h.store.fail_next_commit();

    let err = CheckoutEngine::new(h.ctx.clone())
        .checkout(
            user,
            &[CheckoutLine {
                flight_id: flight.id,
                seat_class: SeatClass::Economy,
                passengers: vec![passenger("Ana Ruiz", "11111111A")],
            }],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Store(_)));
    assert!(h.store.tickets().await.is_empty());
    assert_eq!(h.store.balance(user).await, Some(100_000));
    assert_eq!(h.store.holds().await.len(), 1);
}

#[tokio::test]
async fn test_insufficient_balance() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    let user = h.user(15_000).await;

    HoldStore::new(h.ctx.clone())
        .add_item(user, flight.id, SeatClass::Economy, 2)
        .await
        .unwrap();

    let err = CheckoutEngine::new(h.ctx.clone())
        .checkout(
            user,
            &[CheckoutLine {
                flight_id: flight.id,
                seat_class: SeatClass::Economy,
                passengers: vec![passenger("Ana Ruiz", "11111111A"), passenger("Luis Mora", "22222222B")],
            }],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::InsufficientBalance { required: 20_000, available: 15_000 }
    ));
    assert!(h.store.tickets().await.is_empty());
}

#[tokio::test]
async fn test_empty_and_expired_carts() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    let user = h.user(100_000).await;
    let engine = CheckoutEngine::new(h.ctx.clone());
    let lines = [CheckoutLine {
        flight_id: flight.id,
        seat_class: SeatClass::Economy,
        passengers: vec![passenger("Ana Ruiz", "11111111A")],
    }];

    assert!(matches!(engine.checkout(user, &lines).await, Err(CoreError::EmptyCart)));

    HoldStore::new(h.ctx.clone())
        .add_item(user, flight.id, SeatClass::Economy, 1)
        .await
        .unwrap();
    h.clock.advance(Duration::hours(24));

    assert!(matches!(engine.checkout(user, &lines).await, Err(CoreError::EmptyCart)));
}

#[tokio::test]
async fn test_lines_not_covered_by_holds() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    let user = h.user(100_000).await;

    HoldStore::new(h.ctx.clone())
        .add_item(user, flight.id, SeatClass::Economy, 1)
        .await
        .unwrap();

    let err = CheckoutEngine::new(h.ctx.clone())
        .checkout(
            user,
            &[CheckoutLine {
                flight_id: flight.id,
                seat_class: SeatClass::First,
                passengers: vec![passenger("Ana Ruiz", "11111111A")],
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(h.store.tickets().await.is_empty());
}

#[tokio::test]
async fn test_missing_fare() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    let user = h.user(100_000).await;

    let other = h.flight(Duration::days(5), 10, 2).await;
    let mut unpriced = other.clone();
    unpriced.id = uuid::Uuid::new_v4();
    h.store.insert_flight(unpriced.clone()).await;

    let holds = HoldStore::new(h.ctx.clone());
    holds.add_item(user, flight.id, SeatClass::Economy, 1).await.unwrap();
    holds.add_item(user, unpriced.id, SeatClass::Economy, 1).await.unwrap();

    let err = CheckoutEngine::new(h.ctx.clone())
        .checkout(
            user,
            &[
                CheckoutLine {
                    flight_id: flight.id,
                    seat_class: SeatClass::Economy,
                    passengers: vec![passenger("Ana Ruiz", "11111111A")],
                },
                CheckoutLine {
                    flight_id: unpriced.id,
                    seat_class: SeatClass::Economy,
                    passengers: vec![passenger("Luis Mora", "22222222B")],
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RateNotConfigured { .. }));
}

#[tokio::test]
async fn test_notification_failure_does_not_undo_checkout() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    let user = h.user(100_000).await;

    let holds = HoldStore::new(h.ctx.clone());
    holds.add_item(user, flight.id, SeatClass::Economy, 1).await.unwrap();
    h.notifier.fail(true);

    let receipt = CheckoutEngine::new(h.ctx.clone())
        .checkout(
            user,
            &[CheckoutLine {
                flight_id: flight.id,
                seat_class: SeatClass::Economy,
                passengers: vec![passenger("Ana Ruiz", "11111111A")],
            }],
        )
        .await
        .unwrap();

    assert_eq!(receipt.notifications_failed, 1);
    assert_eq!(h.store.tickets().await.len(), 1);
    assert_eq!(h.store.balance(user).await, Some(90_000));

    // The cart is already empty; clearing it again is a no-op.
    assert_eq!(holds.clear_cart(user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_seat_change_returns_purchased_seat_to_pool() {
    let h = Harness::new();
    let flight = h.flight(Duration::hours(10), 3, 0).await;
    let holds = HoldStore::new(h.ctx.clone());
    let checkin = CheckinEngine::new(h.ctx.clone());

    let first = h.user(100_000).await;
    holds.add_item(first, flight.id, SeatClass::Economy, 1).await.unwrap();
    let booked = CheckoutEngine::new(h.ctx.clone())
        .with_seat_seed(2)
        .checkout(
            first,
            &[CheckoutLine {
                flight_id: flight.id,
                seat_class: SeatClass::Economy,
                passengers: vec![passenger("Ana Ruiz", "11111111A")],
            }],
        )
        .await
        .unwrap();

    let purchased = booked.tickets[0].seat_code.clone();
    let map = checkin.seat_map(flight.id).await.unwrap();
    let target = map
        .seats
        .iter()
        .find(|s| s.seat_class == SeatClass::Economy && s.code != purchased)
        .unwrap()
        .code
        .clone();
    checkin
        .assign_seat(&booked.checkin_code, booked.tickets[0].ticket_id, &target)
        .await
        .unwrap();

    let map = checkin.seat_map(flight.id).await.unwrap();
    assert_eq!(map.available(SeatClass::Economy), 2);
    assert_eq!(map.status_of(&purchased), Some(SeatStatus::Available));

    let second = h.user(100_000).await;
    holds.add_item(second, flight.id, SeatClass::Economy, 2).await.unwrap();
    let receipt = CheckoutEngine::new(h.ctx.clone())
        .with_seat_seed(4)
        .checkout(
            second,
            &[CheckoutLine {
                flight_id: flight.id,
                seat_class: SeatClass::Economy,
                passengers: vec![passenger("Luis Mora", "22222222B"), passenger("Eva Gil", "33333333C")],
            }],
        )
        .await
        .unwrap();

    let seats: HashSet<_> = receipt.tickets.iter().map(|t| t.seat_code.clone()).collect();
    assert_eq!(seats.len(), 2);
    assert!(seats.contains(&purchased));
    assert!(!seats.contains(&target));
    assert_eq!(checkin.seat_map(flight.id).await.unwrap().available(SeatClass::Economy), 0);
}

#[tokio::test]
async fn test_checkout_of_part_of_a_hold() {
    let h = Harness::new();
    let flight = h.flight(Duration::days(5), 10, 2).await;
    let user = h.user(100_000).await;

    let holds = HoldStore::new(h.ctx.clone());
    holds.add_item(user, flight.id, SeatClass::Economy, 3).await.unwrap();
    holds.add_item(user, flight.id, SeatClass::First, 1).await.unwrap();

    let receipt = CheckoutEngine::new(h.ctx.clone())
        .with_seat_seed(8)
        .checkout(
            user,
            &[CheckoutLine {
                flight_id: flight.id,
                seat_class: SeatClass::Economy,
                passengers: vec![passenger("Ana Ruiz", "11111111A"), passenger("Luis Mora", "22222222B")],
            }],
        )
        .await
        .unwrap();

    // Only the issued tickets are charged.
    assert_eq!(receipt.tickets.len(), 2);
    assert_eq!(receipt.total_cents, 20_000);
    assert_eq!(h.store.balance(user).await, Some(80_000));

    // Seats held beyond the purchase go back with the cart.
    assert!(h.store.holds().await.is_empty());
    let economy = holds.availability(flight.id, SeatClass::Economy).await.unwrap();
    assert_eq!(economy.available, 8);
    let first = holds.availability(flight.id, SeatClass::First).await.unwrap();
    assert_eq!(first.available, 2);
}

#[tokio::test]
async fn test_flights_are_locked_in_id_order() {
    let h = Harness::new();
    let a = h.flight(Duration::days(5), 10, 2).await;
    let b = h.flight(Duration::days(6), 10, 2).await;
    let (low, high) = if a.id < b.id { (a, b) } else { (b, a) };
    let user = h.user(100_000).await;

    let holds = HoldStore::new(h.ctx.clone());
    holds.add_item(user, low.id, SeatClass::Economy, 1).await.unwrap();
    holds.add_item(user, high.id, SeatClass::Economy, 1).await.unwrap();
    let before = h.store.locked_flights().await.len();

    CheckoutEngine::new(h.ctx.clone())
        .with_seat_seed(6)
        .checkout(
            user,
            &[
                CheckoutLine {
                    flight_id: high.id,
                    seat_class: SeatClass::Economy,
                    passengers: vec![passenger("Ana Ruiz", "11111111A")],
                },
                CheckoutLine {
                    flight_id: low.id,
                    seat_class: SeatClass::Economy,
                    passengers: vec![passenger("Luis Mora", "22222222B")],
                },
            ],
        )
        .await
        .unwrap();

    let locked = h.store.locked_flights().await;
    assert_eq!(locked[before..], [low.id, high.id]);
}
