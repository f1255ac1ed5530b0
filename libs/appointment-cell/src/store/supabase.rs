use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use professional_cell::models::TimeRange;
use shared_config::AppConfig;
use shared_database::{encode_timestamp, DatabaseError, SupabaseClient};

use crate::models::{Appointment, AppointmentStatus};
use crate::store::AppointmentStore;

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";

/// PostgREST-backed store. The exclusion rule lives in the database as the
/// `appointments_no_overlap` constraint (see `supabase/migrations`).
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn status_filter(statuses: &[AppointmentStatus]) -> String {
        let values: Vec<String> = statuses.iter().map(ToString::to_string).collect();
        format!("status=in.({})", values.join(","))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DatabaseError> {
        debug!("Inserting appointment {} for professional {}", appointment.id, appointment.professional_id);

        let body = serde_json::to_value(&appointment)?;
        let rows: Vec<Appointment> = self
            .supabase
            .write_rows(Method::POST, APPOINTMENTS_PATH, Some(body))
            .await?;

        rows.into_iter().next().ok_or_else(|| DatabaseError::Api {
            status: 500,
            message: "Insert returned no rows".to_string(),
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("{}?id=eq.{}&select=*", APPOINTMENTS_PATH, id);
        let rows: Vec<Appointment> = self.supabase.fetch_rows(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let path = format!(
            "{}?patient_id=eq.{}&select=*&order=from_datetime.asc",
            APPOINTMENTS_PATH, patient_id
        );
        self.supabase.fetch_rows(&path).await
    }

    async fn list_for_professional(
        &self,
        professional_id: Uuid,
        statuses: Option<&[AppointmentStatus]>,
        range: &TimeRange,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let mut query_parts = vec![
            format!("professional_id=eq.{}", professional_id),
            "select=*".to_string(),
        ];

        if let Some(statuses) = statuses {
            query_parts.push(Self::status_filter(statuses));
        }
        if let Some(from) = &range.from {
            query_parts.push(format!("to_datetime=gt.{}", encode_timestamp(from)));
        }
        if let Some(to) = &range.to {
            query_parts.push(format!("from_datetime=lt.{}", encode_timestamp(to)));
        }
        query_parts.push("order=from_datetime.asc".to_string());

        let path = format!("{}?{}", APPOINTMENTS_PATH, query_parts.join("&"));
        self.supabase.fetch_rows(&path).await
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, DatabaseError> {
        let path = format!(
            "{}?id=eq.{}&version=eq.{}",
            APPOINTMENTS_PATH, appointment.id, appointment.version
        );
        let body = json!({
            "from_datetime": appointment.from.to_rfc3339(),
            "to_datetime": appointment.to.to_rfc3339(),
            "status": appointment.status,
            "payment_status": appointment.payment_status,
            "payment_order_id": appointment.payment_order_id,
            "payment_reference": appointment.payment_reference,
            "version": appointment.version + 1,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self.supabase.write_rows(Method::PATCH, &path, Some(body)).await?;
        if let Some(updated) = rows.into_iter().next() {
            return Ok(updated);
        }

        // Nothing matched: either the row is gone or another writer bumped the version.
        match self.get(appointment.id).await? {
            Some(current) => {
                warn!(
                    "Stale write to appointment {}: expected version {}, found {}",
                    appointment.id, appointment.version, current.version
                );
                Err(DatabaseError::Conflict(format!(
                    "expected version {}, found {}",
                    appointment.version, current.version
                )))
            }
            None => Err(DatabaseError::NotFound),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        let rows: Vec<Appointment> = self.supabase.write_rows(Method::DELETE, &path, None).await?;
        if rows.is_empty() {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_uses_in_operator() {
        assert_eq!(
            SupabaseAppointmentStore::status_filter(AppointmentStatus::capacity_consuming()),
            "status=in.(pending,accepted)"
        );
    }
}
