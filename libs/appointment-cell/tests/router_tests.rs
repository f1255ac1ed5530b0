mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::{at, ApprovingGateway, Harness, RecordingNotifier};

fn harness(config: &TestConfig) -> Harness {
    Harness::with_config(
        config.to_app_config(),
        Arc::new(RecordingNotifier::default()),
        Arc::new(ApprovingGateway),
    )
}

fn request(method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, bearer);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn booking(professional: &TestUser) -> Value {
    json!({
        "professional_id": professional.uuid(),
        "from": at(10, 9, 0),
        "to": at(10, 10, 0)
    })
}

#[tokio::test]
async fn patient_books_and_professional_accepts() {
    let config = TestConfig::default();
    let h = harness(&config);
    let app: Router = appointment_routes(h.state.clone());

    let patient = TestUser::patient("patient@example.com");
    let nurse = TestUser::professional("nurse@example.com");
    h.window(nurse.uuid(), at(10, 9, 0), at(10, 12, 0)).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/",
            Some(&JwtTestUtils::bearer(&patient, &config)),
            Some(booking(&nurse)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["status"], "pending");
    assert_eq!(created["payment_status"], "unpaid");
    let id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/{}/accept", id),
            Some(&JwtTestUtils::bearer(&nurse, &config)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "accepted");

    let response = app
        .oneshot(request(
            Method::GET,
            "/professional",
            Some(&JwtTestUtils::bearer(&nurse, &config)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["appointments"][0]["id"], id.as_str());
}

#[tokio::test]
async fn double_booking_is_a_conflict() {
    let config = TestConfig::default();
    let h = harness(&config);
    let app = appointment_routes(h.state.clone());

    let nurse = TestUser::professional("nurse@example.com");
    h.window(nurse.uuid(), at(10, 9, 0), at(10, 12, 0)).await;

    for (patient, expected) in [
        (TestUser::patient("first@example.com"), StatusCode::CREATED),
        (TestUser::patient("second@example.com"), StatusCode::CONFLICT),
    ] {
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/",
                Some(&JwtTestUtils::bearer(&patient, &config)),
                Some(booking(&nurse)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn professionals_cannot_book() {
    let config = TestConfig::default();
    let h = harness(&config);
    let app = appointment_routes(h.state.clone());
    let nurse = TestUser::professional("nurse@example.com");

    let response = app
        .oneshot(request(
            Method::POST,
            "/",
            Some(&JwtTestUtils::bearer(&nurse, &config)),
            Some(booking(&nurse)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_the_assigned_professional_can_accept() {
    let config = TestConfig::default();
    let h = harness(&config);
    let app = appointment_routes(h.state.clone());

    let nurse = TestUser::professional("nurse@example.com");
    let other = TestUser::professional("other@example.com");
    h.window(nurse.uuid(), at(10, 9, 0), at(10, 12, 0)).await;
    let appointment = h
        .state
        .booking
        .book(nurse.uuid(), TestUser::patient("p@example.com").uuid(), at(10, 9, 0), at(10, 10, 0))
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            Method::PATCH,
            &format!("/{}/accept", appointment.id),
            Some(&JwtTestUtils::bearer(&other, &config)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn slot_lookup_returns_dates_and_slots() {
    let config = TestConfig::default();
    let h = harness(&config);
    let app = appointment_routes(h.state.clone());
    let nurse = TestUser::professional("nurse@example.com");
    let patient = TestUser::patient("patient@example.com");
    h.window(nurse.uuid(), at(10, 9, 0), at(10, 12, 0)).await;
    h.window(nurse.uuid(), at(12, 9, 0), at(12, 12, 0)).await;

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/slots/{}?date=2024-01-12", nurse.uuid()),
            Some(&JwtTestUtils::bearer(&patient, &config)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["dates"], json!(["2024-01-10", "2024-01-12"]));
    assert_eq!(body["slots"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let config = TestConfig::default();
    let h = harness(&config);
    let app = appointment_routes(h.state.clone());

    let response = app
        .oneshot(request(Method::GET, "/mine", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let config = TestConfig::default();
    let h = harness(&config);
    let app = appointment_routes(h.state.clone());
    let patient = TestUser::patient("patient@example.com");

    let response = app
        .oneshot(request(
            Method::POST,
            &format!("/{}/cancel", uuid::Uuid::new_v4()),
            Some(&JwtTestUtils::bearer(&patient, &config)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
