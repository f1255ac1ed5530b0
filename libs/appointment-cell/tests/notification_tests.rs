mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus};

use common::{at, ApprovingGateway, Harness, MockMailer, RecordingNotifier};

#[tokio::test]
async fn booking_emits_appointment_created() {
    let notifier = Arc::new(RecordingNotifier::default());
    let h = Harness::with(notifier.clone(), Arc::new(ApprovingGateway));
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 12, 0)).await;

    let appointment = h.state.booking.book(pro, Uuid::new_v4(), at(10, 9, 0), at(10, 10, 0)).await.unwrap();

    let events = notifier.events.lock().await;
    assert_eq!(events.len(), 1);
    let (event, payload) = &events[0];
    assert_eq!(event, "appointment_created");
    assert_eq!(payload["appointment"]["id"], appointment.id.to_string());
    assert_eq!(payload["appointment"]["professional_id"], pro.to_string());
}

#[tokio::test]
async fn failed_notification_does_not_undo_booking() {
    let mut mailer = MockMailer::new();
    mailer
        .expect_notify()
        .withf(|event, _| event.to_string() == "appointment_created")
        .times(1)
        .returning(|_, _| Err(AppointmentError::ExternalCollaboratorFailure("smtp down".to_string())));

    let h = Harness::with(Arc::new(mailer), Arc::new(ApprovingGateway));
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 12, 0)).await;

    let appointment = h.state.booking.book(pro, Uuid::new_v4(), at(10, 9, 0), at(10, 10, 0)).await.unwrap();

    let stored = h.state.repository.get(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn rejected_bookings_send_nothing() {
    let mut mailer = MockMailer::new();
    mailer.expect_notify().never();

    let h = Harness::with(Arc::new(mailer), Arc::new(ApprovingGateway));
    let pro = Uuid::new_v4();
    h.window(pro, at(10, 9, 0), at(10, 10, 0)).await;

    assert_matches!(
        h.state.booking.book(pro, Uuid::new_v4(), at(10, 9, 30), at(10, 10, 30)).await,
        Err(AppointmentError::SlotUnavailable)
    );
}
