use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{encode_timestamp, DatabaseError, SupabaseClient};

use crate::models::{AvailabilityWindow, Professional, TimeRange};
use crate::store::{AvailabilityStore, ProfessionalQuery, ProfessionalStore};

const PROFESSIONALS_PATH: &str = "/rest/v1/professionals";
const AVAILABILITY_PATH: &str = "/rest/v1/professional_availability";

fn first_row<T>(mut rows: Vec<T>) -> Result<T, DatabaseError> {
    if rows.is_empty() {
        return Err(DatabaseError::NotFound);
    }
    Ok(rows.swap_remove(0))
}

pub struct SupabaseProfessionalStore {
    supabase: SupabaseClient,
}

impl SupabaseProfessionalStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn list_path(query: &ProfessionalQuery) -> String {
        let mut filters = vec!["select=*".to_string()];

        if let Some(state) = &query.state {
            filters.push(format!("state=eq.{}", urlencoding::encode(state)));
        }
        if let Some(category) = &query.category {
            filters.push(format!("category=eq.{}", urlencoding::encode(&category.to_string())));
        }
        if let Some(status) = query.status {
            filters.push(format!("status=eq.{}", status));
        }
        filters.push("order=full_name.asc,id.asc".to_string());

        format!("{}?{}", PROFESSIONALS_PATH, filters.join("&"))
    }
}

#[async_trait]
impl ProfessionalStore for SupabaseProfessionalStore {
    async fn insert(&self, professional: Professional) -> Result<Professional, DatabaseError> {
        debug!("Inserting professional {}", professional.id);
        let body = serde_json::to_value(&professional)?;
        let rows = self
            .supabase
            .write_rows(Method::POST, PROFESSIONALS_PATH, Some(body))
            .await?;
        first_row(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Professional>, DatabaseError> {
        let path = format!("{}?id=eq.{}&select=*", PROFESSIONALS_PATH, id);
        let rows: Vec<Professional> = self.supabase.fetch_rows(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn list(&self, query: &ProfessionalQuery) -> Result<Vec<Professional>, DatabaseError> {
        self.supabase.fetch_rows(&Self::list_path(query)).await
    }

    async fn update(&self, professional: Professional) -> Result<Professional, DatabaseError> {
        debug!("Updating professional {} at version {}", professional.id, professional.version);
        let path = format!(
            "{}?id=eq.{}&version=eq.{}",
            PROFESSIONALS_PATH, professional.id, professional.version
        );

        let mut body = serde_json::to_value(&professional)?;
        if let Value::Object(fields) = &mut body {
            fields.remove("id");
            fields.insert("version".to_string(), json!(professional.version + 1));
        }

        let rows: Vec<Professional> = self.supabase.write_rows(Method::PATCH, &path, Some(body)).await?;
        if let Some(updated) = rows.into_iter().next() {
            return Ok(updated);
        }

        match self.get(professional.id).await? {
            Some(current) => {
                warn!(
                    "Stale write to professional {}: expected version {}, found {}",
                    professional.id, professional.version, current.version
                );
                Err(DatabaseError::Conflict(format!(
                    "expected version {}, found {}",
                    professional.version, current.version
                )))
            }
            None => Err(DatabaseError::NotFound),
        }
    }
}

pub struct SupabaseAvailabilityStore {
    supabase: SupabaseClient,
}

impl SupabaseAvailabilityStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn owned_window_path(professional_id: Uuid, window_id: Uuid) -> String {
        format!(
            "{}?id=eq.{}&professional_id=eq.{}",
            AVAILABILITY_PATH, window_id, professional_id
        )
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn insert(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, DatabaseError> {
        let body = serde_json::to_value(&window)?;
        let rows = self
            .supabase
            .write_rows(Method::POST, AVAILABILITY_PATH, Some(body))
            .await?;
        first_row(rows)
    }

    async fn update(
        &self,
        professional_id: Uuid,
        window_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AvailabilityWindow, DatabaseError> {
        let body = json!({
            "from_datetime": from.to_rfc3339(),
            "to_datetime": to.to_rfc3339(),
        });
        let rows = self
            .supabase
            .write_rows(
                Method::PATCH,
                &Self::owned_window_path(professional_id, window_id),
                Some(body),
            )
            .await?;
        first_row(rows)
    }

    async fn delete(&self, professional_id: Uuid, window_id: Uuid) -> Result<(), DatabaseError> {
        let rows: Vec<AvailabilityWindow> = self
            .supabase
            .write_rows(
                Method::DELETE,
                &Self::owned_window_path(professional_id, window_id),
                None,
            )
            .await?;
        first_row(rows).map(|_| ())
    }

    async fn list(
        &self,
        professional_id: Uuid,
        range: &TimeRange,
    ) -> Result<Vec<AvailabilityWindow>, DatabaseError> {
        let mut path = format!(
            "{}?professional_id=eq.{}&select=*",
            AVAILABILITY_PATH, professional_id
        );
        if let Some(from) = &range.from {
            path.push_str(&format!("&to_datetime=gte.{}", encode_timestamp(from)));
        }
        if let Some(to) = &range.to {
            path.push_str(&format!("&from_datetime=lte.{}", encode_timestamp(to)));
        }
        path.push_str("&order=from_datetime.asc,id.asc");

        self.supabase.fetch_rows(&path).await
    }
}
