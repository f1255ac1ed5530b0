use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use appointment_cell::appointment_routes;
use professional_cell::professional_routes;

use crate::wiring::Services;

pub fn create_router(services: Services) -> Router {
    let backend = format!("{:?}", services.config.storage_backend).to_lowercase();

    Router::new()
        .route("/", get(|| async { "Home care scheduling API is running!" }))
        .route("/health", get(move || health(backend.clone())))
        .nest("/professionals", professional_routes(services.professionals))
        .nest("/appointments", appointment_routes(services.appointments))
}

async fn health(backend: String) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "storage": backend
    }))
}
