use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{AvailabilityService, ProfessionalService};

#[derive(Clone)]
pub struct ProfessionalState {
    pub config: Arc<AppConfig>,
    pub professionals: Arc<ProfessionalService>,
    pub availability: Arc<AvailabilityService>,
}

impl ProfessionalState {
    pub fn new(
        config: Arc<AppConfig>,
        professionals: Arc<ProfessionalService>,
        availability: Arc<AvailabilityService>,
    ) -> Self {
        Self {
            config,
            professionals,
            availability,
        }
    }
}

pub fn professional_routes(state: ProfessionalState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{professional_id}", get(handlers::get_professional))
        .route("/{professional_id}/availability", get(handlers::list_windows))
        .route("/{professional_id}/photo/url", get(handlers::get_photo_url));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/", get(handlers::find_professionals).post(handlers::register_professional))
        .route("/{professional_id}", put(handlers::update_professional))
        .route("/{professional_id}/photo", post(handlers::upload_photo))
        .route("/{professional_id}/documents/{name}", post(handlers::upload_document))
        .route("/{professional_id}/documents/{name}/url", get(handlers::get_document_url))

        // Verification workflow
        .route("/{professional_id}/submit", post(handlers::submit_for_verification))
        .route("/pending", get(handlers::list_pending_professionals))
        .route("/{professional_id}/approve", patch(handlers::approve_professional))
        .route("/{professional_id}/reject", patch(handlers::reject_professional))

        // Availability management
        .route("/{professional_id}/availability", post(handlers::add_window))
        .route(
            "/{professional_id}/availability/{window_id}",
            put(handlers::update_window).delete(handlers::delete_window),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
