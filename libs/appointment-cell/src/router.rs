use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use professional_cell::services::ProfessionalService;
use professional_cell::store::AvailabilityStore;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{
    AppointmentLifecycle, AppointmentRepository, BookingWorkflow, Notifier, PaymentGateway,
    SearchEngine, SlotResolver,
};
use crate::store::AppointmentStore;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<AppointmentRepository>,
    pub resolver: Arc<SlotResolver>,
    pub search: Arc<SearchEngine>,
    pub booking: Arc<BookingWorkflow>,
    pub lifecycle: Arc<AppointmentLifecycle>,
}

impl AppointmentState {
    /// Wires the scheduling services over the given stores and collaborators.
    pub fn new(
        config: Arc<AppConfig>,
        professionals: Arc<ProfessionalService>,
        windows: Arc<dyn AvailabilityStore>,
        appointments: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn Notifier>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let repository = Arc::new(AppointmentRepository::new(appointments));
        let resolver = Arc::new(SlotResolver::new(
            windows,
            repository.clone(),
            config.merge_overlapping_windows,
        ));
        let search = Arc::new(SearchEngine::new(professionals, resolver.clone()));
        let booking = Arc::new(BookingWorkflow::new(repository.clone(), resolver.clone(), notifier));
        let lifecycle = Arc::new(AppointmentLifecycle::new(
            repository.clone(),
            resolver.clone(),
            payments,
            config.consultation_fee_paise,
            config.payment_currency.clone(),
        ));

        Self {
            config,
            repository,
            resolver,
            search,
            booking,
            lifecycle,
        }
    }
}

pub fn appointment_routes(state: AppointmentState) -> Router {
    Router::new()
        // Search and slot discovery
        .route("/search", get(handlers::search_professionals))
        .route("/slots/{professional_id}", get(handlers::professional_slots))

        // Booking and listings
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::my_appointments))
        .route("/professional", get(handlers::professional_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))

        // Lifecycle
        .route("/{appointment_id}/accept", patch(handlers::accept_appointment))
        .route("/{appointment_id}/reject", patch(handlers::reject_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))

        // Payment
        .route("/{appointment_id}/payment/order", post(handlers::create_payment_order))
        .route("/{appointment_id}/payment", post(handlers::pay_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
