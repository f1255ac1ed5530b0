use std::sync::Arc;

use tracing::{info, warn};

use appointment_cell::services::{
    LogNotifier, Notifier, PaymentGateway, RazorpayGateway, SupabaseFunctionNotifier,
};
use appointment_cell::store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
use appointment_cell::AppointmentState;
use professional_cell::services::{
    AvailabilityService, DocumentStore, InMemoryDocumentStore, ProfessionalService,
    SupabaseDocumentStore,
};
use professional_cell::store::{
    AvailabilityStore, InMemoryAvailabilityStore, InMemoryProfessionalStore, ProfessionalStore,
    SupabaseAvailabilityStore, SupabaseProfessionalStore,
};
use professional_cell::ProfessionalState;
use shared_config::{AppConfig, StorageBackend};

/// Per-cell states built over one shared set of stores, so both cells see
/// the same availability windows.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<AppConfig>,
    pub professionals: ProfessionalState,
    pub appointments: AppointmentState,
}

struct Stores {
    professionals: Arc<dyn ProfessionalStore>,
    windows: Arc<dyn AvailabilityStore>,
    appointments: Arc<dyn AppointmentStore>,
    documents: Arc<dyn DocumentStore>,
}

impl Stores {
    fn for_backend(config: &AppConfig) -> Self {
        match config.storage_backend {
            StorageBackend::Supabase => {
                info!("Using Supabase storage at {}", config.supabase_url);
                Self {
                    professionals: Arc::new(SupabaseProfessionalStore::new(config)),
                    windows: Arc::new(SupabaseAvailabilityStore::new(config)),
                    appointments: Arc::new(SupabaseAppointmentStore::new(config)),
                    documents: Arc::new(SupabaseDocumentStore::new(config)),
                }
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage; data is lost on restart");
                Self {
                    professionals: Arc::new(InMemoryProfessionalStore::new()),
                    windows: Arc::new(InMemoryAvailabilityStore::new()),
                    appointments: Arc::new(InMemoryAppointmentStore::new()),
                    documents: Arc::new(InMemoryDocumentStore::new()),
                }
            }
        }
    }
}

impl Services {
    pub fn build(config: Arc<AppConfig>) -> Self {
        let stores = Stores::for_backend(&config);

        let notifier: Arc<dyn Notifier> =
            if config.storage_backend == StorageBackend::Supabase && !config.notify_function.is_empty() {
                Arc::new(SupabaseFunctionNotifier::new(&config))
            } else {
                info!("No notification function configured; notifications go to the log");
                Arc::new(LogNotifier)
            };

        if !config.is_payment_configured() {
            warn!("Razorpay credentials missing; payment orders will fail");
        }
        let payments: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(&config));

        let professionals = Arc::new(ProfessionalService::new(
            stores.professionals,
            stores.documents,
            config.documents_bucket.clone(),
            config.photos_bucket.clone(),
        ));
        let availability = Arc::new(AvailabilityService::new(stores.windows.clone()));

        Self {
            professionals: ProfessionalState::new(config.clone(), professionals.clone(), availability),
            appointments: AppointmentState::new(
                config.clone(),
                professionals,
                stores.windows,
                stores.appointments,
                notifier,
                payments,
            ),
            config,
        }
    }
}
