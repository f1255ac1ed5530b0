// libs/appointment-cell/src/services/repository.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use professional_cell::models::TimeRange;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, PaymentStatus};
use crate::store::AppointmentStore;

/// Owns appointment records. Every mutation is conditional on the version
/// the caller last read.
pub struct AppointmentRepository {
    store: Arc<dyn AppointmentStore>,
}

impl AppointmentRepository {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// New appointments start as `(pending, unpaid)`.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        professional_id: Uuid,
        patient_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        validate_range(from, to)?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            professional_id,
            patient_id,
            from,
            to,
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_order_id: None,
            payment_reference: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let appointment = self.store.insert(appointment).await?;
        info!("Created appointment {}", appointment.id);
        Ok(appointment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get(id).await?.ok_or(AppointmentError::NotFound)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.store.list_for_patient(patient_id).await?;
        debug!("Patient {} has {} appointments", patient_id, appointments.len());
        Ok(appointments)
    }

    pub async fn list_for_professional(
        &self,
        professional_id: Uuid,
        status_filter: Option<&[AppointmentStatus]>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .store
            .list_for_professional(professional_id, status_filter, &TimeRange::unbounded())
            .await?)
    }

    /// Capacity-consuming appointments overlapping `range`.
    pub async fn list_holding_capacity(
        &self,
        professional_id: Uuid,
        range: &TimeRange,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .store
            .list_for_professional(professional_id, Some(AppointmentStatus::capacity_consuming()), range)
            .await?)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        expected_version: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        self.modify(id, expected_version, |appointment| appointment.status = status)
            .await
    }

    pub async fn update_payment_status(
        &self,
        id: Uuid,
        expected_version: i64,
        payment_status: PaymentStatus,
        reference: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        self.modify(id, expected_version, |appointment| {
            appointment.payment_status = payment_status;
            if reference.is_some() {
                appointment.payment_reference = reference;
            }
        })
        .await
    }

    /// Sets both halves of the state pair in one write.
    pub async fn update_state(
        &self,
        id: Uuid,
        expected_version: i64,
        status: AppointmentStatus,
        payment_status: PaymentStatus,
    ) -> Result<Appointment, AppointmentError> {
        self.modify(id, expected_version, |appointment| {
            appointment.status = status;
            appointment.payment_status = payment_status;
        })
        .await
    }

    pub async fn update_times(
        &self,
        id: Uuid,
        expected_version: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        validate_range(from, to)?;
        self.modify(id, expected_version, |appointment| {
            appointment.from = from;
            appointment.to = to;
        })
        .await
    }

    pub async fn record_payment_order(
        &self,
        id: Uuid,
        expected_version: i64,
        order_id: String,
    ) -> Result<Appointment, AppointmentError> {
        self.modify(id, expected_version, |appointment| {
            appointment.payment_order_id = Some(order_id);
        })
        .await
    }

    /// Hard delete. Administrative cleanup only; cancellation is a status change.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.store.delete(id).await?;
        info!("Deleted appointment {}", id);
        Ok(())
    }

    async fn modify<F>(&self, id: Uuid, expected_version: i64, change: F) -> Result<Appointment, AppointmentError>
    where
        F: FnOnce(&mut Appointment),
    {
        let mut appointment = self.get(id).await?;
        if appointment.version != expected_version {
            return Err(AppointmentError::Conflict);
        }

        change(&mut appointment);
        let updated = self.store.update(appointment).await?;
        debug!("Appointment {} now at version {}", updated.id, updated.version);
        Ok(updated)
    }
}

pub(crate) fn validate_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), AppointmentError> {
    if from >= to {
        return Err(AppointmentError::InvalidRange(
            "start must be before end".to_string(),
        ));
    }
    Ok(())
}
