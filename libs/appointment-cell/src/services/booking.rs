// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::services::notification::{Notifier, APPOINTMENT_CREATED};
use crate::services::repository::{validate_range, AppointmentRepository};
use crate::services::slots::SlotResolver;

/// Validates a booking against freshly resolved slots and commits it.
pub struct BookingWorkflow {
    repository: Arc<AppointmentRepository>,
    resolver: Arc<SlotResolver>,
    notifier: Arc<dyn Notifier>,
}

impl BookingWorkflow {
    pub fn new(
        repository: Arc<AppointmentRepository>,
        resolver: Arc<SlotResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            resolver,
            notifier,
        }
    }

    /// The slot check is recomputed here rather than trusted from an
    /// earlier search; the store's exclusion rule settles any race that
    /// remains between the check and the insert.
    #[instrument(skip(self))]
    pub async fn book(
        &self,
        professional_id: Uuid,
        patient_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        validate_range(from, to)?;

        self.resolver
            .ensure_bookable(professional_id, from, to, None)
            .await?;

        let appointment = self
            .repository
            .create(professional_id, patient_id, from, to)
            .await?;
        info!("Booked appointment {} for patient {}", appointment.id, patient_id);

        let payload = json!({ "appointment": appointment });
        if let Err(e) = self.notifier.notify(APPOINTMENT_CREATED, payload).await {
            error!("Notification for appointment {} failed: {}", appointment.id, e);
        }

        Ok(appointment)
    }
}
