mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus, Slot};
use professional_cell::models::TimeRange;

use common::{at, Harness};

#[tokio::test]
async fn rejected_hold_releases_interval() {
    let h = Harness::new();
    let pro = Uuid::new_v4();
    let (patient_a, patient_b) = (Uuid::new_v4(), Uuid::new_v4());
    h.window(pro, at(10, 9, 0), at(10, 12, 0)).await;

    let a = h.state.booking.book(pro, patient_a, at(10, 9, 0), at(10, 10, 0)).await.unwrap();
    assert_eq!(a.status, AppointmentStatus::Pending);

    assert_matches!(
        h.state.booking.book(pro, patient_b, at(10, 9, 30), at(10, 10, 30)).await,
        Err(AppointmentError::SlotUnavailable)
    );

    let rejected = h.state.lifecycle.reject(a.id).await.unwrap();
    assert_eq!(rejected.status, AppointmentStatus::Rejected);

    let b = h.state.booking.book(pro, patient_b, at(10, 9, 30), at(10, 10, 30)).await.unwrap();
    assert_eq!(b.status, AppointmentStatus::Pending);
    assert_eq!(b.patient_id, patient_b);
}

#[tokio::test]
async fn slots_exclude_pending_and_accepted_holds() {
    let h = Harness::new();
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 17, 0)).await;

    let first = h.state.booking.book(pro, Uuid::new_v4(), at(10, 10, 0), at(10, 11, 0)).await.unwrap();
    h.state.booking.book(pro, Uuid::new_v4(), at(10, 13, 0), at(10, 14, 0)).await.unwrap();
    h.state.lifecycle.accept(first.id).await.unwrap();

    let slots = h.state.resolver.resolve(pro, &TimeRange::unbounded(), None).await.unwrap();
    assert_eq!(
        slots,
        vec![
            Slot::new(at(10, 9, 0), at(10, 10, 0)),
            Slot::new(at(10, 11, 0), at(10, 13, 0)),
            Slot::new(at(10, 14, 0), at(10, 17, 0)),
        ]
    );

    let holds = h.state.repository.list_for_professional(pro, None).await.unwrap();
    for slot in &slots {
        assert!(holds.iter().all(|a| !a.overlaps(slot.from, slot.to)));
    }
}

#[tokio::test]
async fn booking_must_fit_inside_a_slot() {
    let h = Harness::new();
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 12, 0)).await;

    // Edges of the window are bookable.
    h.state.booking.book(pro, Uuid::new_v4(), at(10, 11, 0), at(10, 12, 0)).await.unwrap();

    for (from, to) in [
        (at(10, 8, 30), at(10, 9, 30)),
        (at(10, 10, 30), at(10, 11, 30)),
        (at(10, 12, 0), at(10, 13, 0)),
        (at(11, 9, 0), at(11, 10, 0)),
    ] {
        assert_matches!(
            h.state.booking.book(pro, Uuid::new_v4(), from, to).await,
            Err(AppointmentError::SlotUnavailable)
        );
    }

    // Back-to-back with the existing hold is fine.
    h.state.booking.book(pro, Uuid::new_v4(), at(10, 10, 0), at(10, 11, 0)).await.unwrap();
}

#[tokio::test]
async fn malformed_booking_ranges_are_rejected() {
    let h = Harness::new();
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 12, 0)).await;

    assert_matches!(
        h.state.booking.book(pro, Uuid::new_v4(), at(10, 10, 0), at(10, 10, 0)).await,
        Err(AppointmentError::InvalidRange(_))
    );
    assert_matches!(
        h.state.booking.book(pro, Uuid::new_v4(), at(10, 11, 0), at(10, 10, 0)).await,
        Err(AppointmentError::InvalidRange(_))
    );
}

#[tokio::test]
async fn professional_without_windows_has_no_slots() {
    let h = Harness::new();
    let slots = h.state.resolver.resolve(Uuid::new_v4(), &TimeRange::unbounded(), None).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn resolution_is_repeatable() {
    let h = Harness::new();
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 12, 0)).await;
    h.window(pro, at(10, 11, 0), at(10, 15, 0)).await;
    h.state.booking.book(pro, Uuid::new_v4(), at(10, 9, 0), at(10, 9, 30)).await.unwrap();

    let range = TimeRange::new(Some(at(10, 0, 0)), Some(at(11, 0, 0)));
    let first = h.state.resolver.resolve(pro, &range, None).await.unwrap();
    let second = h.state.resolver.resolve(pro, &range, None).await.unwrap();
    assert_eq!(first, second);

    let windows_first = h.availability.list_windows(pro, Some(range)).await.unwrap();
    let windows_second = h.availability.list_windows(pro, Some(range)).await.unwrap();
    assert_eq!(windows_first, windows_second);
}

#[tokio::test]
async fn concurrent_bookings_for_one_interval_admit_one() {
    let h = Harness::new();
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 12, 0)).await;

    let booking = h.state.booking.clone();
    let attempts = (0..16).map(|i| {
        let booking = Arc::clone(&booking);
        let from = if i % 2 == 0 { at(10, 9, 0) } else { at(10, 9, 30) };
        let to = if i % 2 == 0 { at(10, 10, 0) } else { at(10, 10, 30) };
        tokio::spawn(async move { booking.book(pro, Uuid::new_v4(), from, to).await })
    });

    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task should not panic"))
        .collect();

    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn store_rejects_overlap_even_without_slot_check() {
    let h = Harness::new();
    let pro = Uuid::new_v4();

    h.state.repository.create(pro, Uuid::new_v4(), at(10, 9, 0), at(10, 10, 0)).await.unwrap();
    assert_matches!(
        h.state.repository.create(pro, Uuid::new_v4(), at(10, 9, 59), at(10, 11, 0)).await,
        Err(AppointmentError::SlotUnavailable)
    );

    // Other professionals are unaffected.
    h.state.repository.create(Uuid::new_v4(), Uuid::new_v4(), at(10, 9, 0), at(10, 10, 0)).await.unwrap();
}

#[tokio::test]
async fn merged_windows_allow_bookings_across_the_seam() {
    let config = shared_config::AppConfig {
        merge_overlapping_windows: true,
        ..shared_config::AppConfig::default()
    };
    let h = Harness::with_config(
        config,
        Arc::new(common::RecordingNotifier::default()),
        Arc::new(common::ApprovingGateway),
    );
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 11, 0)).await;
    h.window(pro, at(10, 10, 0), at(10, 12, 0)).await;

    h.state.booking.book(pro, Uuid::new_v4(), at(10, 9, 30), at(10, 11, 30)).await.unwrap();

    let unmerged = Harness::new();
    unmerged.window(pro, at(10, 9, 0), at(10, 11, 0)).await;
    unmerged.window(pro, at(10, 10, 0), at(10, 12, 0)).await;
    // Neither window alone covers 09:30-11:30.
    assert_matches!(
        unmerged.state.booking.book(pro, Uuid::new_v4(), at(10, 9, 30), at(10, 11, 30)).await,
        Err(AppointmentError::SlotUnavailable)
    );
}
