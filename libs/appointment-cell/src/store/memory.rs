use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use professional_cell::models::TimeRange;
use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentStatus};
use crate::store::{in_range, AppointmentStore};

/// Map-backed store. The exclusion rule is checked under the same lock as
/// the write, so concurrent bookings for one interval cannot both land.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn collides(rows: &HashMap<Uuid, Appointment>, candidate: &Appointment) -> bool {
    candidate.holds_capacity()
        && rows.values().any(|other| {
            other.id != candidate.id
                && other.professional_id == candidate.professional_id
                && other.holds_capacity()
                && other.overlaps(candidate.from, candidate.to)
        })
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| a.from.cmp(&b.from).then(a.id.cmp(&b.id)));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DatabaseError> {
        let mut rows = self.rows.lock().await;

        if rows.contains_key(&appointment.id) {
            return Err(DatabaseError::Conflict(format!("appointment {} already exists", appointment.id)));
        }
        if collides(&rows, &appointment) {
            return Err(DatabaseError::Overlap);
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let rows = self.rows.lock().await;
        Ok(sorted(
            rows.values()
                .filter(|a| a.patient_id == patient_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_professional(
        &self,
        professional_id: Uuid,
        statuses: Option<&[AppointmentStatus]>,
        range: &TimeRange,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let rows = self.rows.lock().await;
        Ok(sorted(
            rows.values()
                .filter(|a| a.professional_id == professional_id)
                .filter(|a| statuses.map_or(true, |wanted| wanted.contains(&a.status)))
                .filter(|a| in_range(a, range))
                .cloned()
                .collect(),
        ))
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, DatabaseError> {
        let mut rows = self.rows.lock().await;

        let stored_version = rows
            .get(&appointment.id)
            .map(|stored| stored.version)
            .ok_or(DatabaseError::NotFound)?;
        if stored_version != appointment.version {
            return Err(DatabaseError::Conflict(format!(
                "expected version {}, found {}",
                appointment.version, stored_version
            )));
        }
        if collides(&rows, &appointment) {
            return Err(DatabaseError::Overlap);
        }

        let updated = Appointment {
            version: appointment.version + 1,
            updated_at: Utc::now(),
            ..appointment
        };
        rows.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.rows
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(DatabaseError::NotFound)
    }
}
