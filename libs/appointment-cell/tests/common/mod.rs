#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, ChargeOutcome, ChargeRequest, PaymentOrder};
use appointment_cell::services::{Notifier, PaymentGateway};
use appointment_cell::store::InMemoryAppointmentStore;
use appointment_cell::AppointmentState;
use professional_cell::models::{ProfessionalCategory, RegisterProfessionalRequest};
use professional_cell::services::{AvailabilityService, InMemoryDocumentStore, ProfessionalService};
use professional_cell::store::{InMemoryAvailabilityStore, InMemoryProfessionalStore};
use shared_config::AppConfig;

mock! {
    pub Mailer {}

    #[async_trait]
    impl Notifier for Mailer {
        async fn notify(&self, event: &str, payload: Value) -> Result<(), AppointmentError>;
    }
}

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn create_order(
            &self,
            amount: i64,
            currency: &str,
            receipt: &str,
        ) -> Result<PaymentOrder, AppointmentError>;

        async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, AppointmentError>;
    }
}

/// Notifier that remembers every event it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &str, payload: Value) -> Result<(), AppointmentError> {
        self.events.lock().await.push((event.to_string(), payload));
        Ok(())
    }
}

/// Gateway that approves every charge.
pub struct ApprovingGateway;

#[async_trait]
impl PaymentGateway for ApprovingGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentOrder, AppointmentError> {
        Ok(PaymentOrder {
            id: format!("order_{}", receipt),
            amount,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        })
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, AppointmentError> {
        Ok(ChargeOutcome::Succeeded {
            reference: request.payment_id.clone(),
        })
    }
}

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

pub struct Harness {
    pub state: AppointmentState,
    pub professionals: Arc<ProfessionalService>,
    pub availability: Arc<AvailabilityService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Arc::new(RecordingNotifier::default()), Arc::new(ApprovingGateway))
    }

    pub fn with(notifier: Arc<dyn Notifier>, payments: Arc<dyn PaymentGateway>) -> Self {
        Self::with_config(AppConfig::default(), notifier, payments)
    }

    pub fn with_config(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let windows = Arc::new(InMemoryAvailabilityStore::new());
        let professionals = Arc::new(ProfessionalService::new(
            Arc::new(InMemoryProfessionalStore::new()),
            Arc::new(InMemoryDocumentStore::new()),
            "professionals-files",
            "profile-photos",
        ));
        let availability = Arc::new(AvailabilityService::new(windows.clone()));

        let state = AppointmentState::new(
            Arc::new(config),
            professionals.clone(),
            windows,
            Arc::new(InMemoryAppointmentStore::new()),
            notifier,
            payments,
        );

        Self {
            state,
            professionals,
            availability,
        }
    }

    pub async fn window(&self, professional_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) {
        self.availability
            .add_window(professional_id, from, to)
            .await
            .expect("window should be accepted");
    }

    /// Registers, verifies and approves a professional.
    pub async fn approved_professional(&self, name: &str, city: &str, skills: &[&str]) -> Uuid {
        let id = Uuid::new_v4();
        self.professionals
            .register(
                id,
                RegisterProfessionalRequest {
                    full_name: name.to_string(),
                    email: None,
                    phone: None,
                    category: ProfessionalCategory::Nurse,
                    state: "Kerala".to_string(),
                    city: city.to_string(),
                    skills: skills.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
                    bio: None,
                },
            )
            .await
            .unwrap();
        self.professionals
            .upload_document(id, "license.pdf", vec![1, 2, 3], "application/pdf")
            .await
            .unwrap();
        self.professionals.submit_for_verification(id).await.unwrap();
        self.professionals.approve(id).await.unwrap();
        id
    }
}
