use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{AvailabilityWindow, Professional, TimeRange};
use crate::store::{AvailabilityStore, ProfessionalQuery, ProfessionalStore};

#[derive(Default)]
pub struct InMemoryProfessionalStore {
    rows: Mutex<HashMap<Uuid, Professional>>,
}

impl InMemoryProfessionalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfessionalStore for InMemoryProfessionalStore {
    async fn insert(&self, professional: Professional) -> Result<Professional, DatabaseError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&professional.id) {
            return Err(DatabaseError::Conflict(format!(
                "professional {} already exists",
                professional.id
            )));
        }
        rows.insert(professional.id, professional.clone());
        Ok(professional)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Professional>, DatabaseError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn list(&self, query: &ProfessionalQuery) -> Result<Vec<Professional>, DatabaseError> {
        let rows = self.rows.lock().await;
        let mut matches: Vec<Professional> = rows
            .values()
            .filter(|p| query.state.as_ref().map_or(true, |s| &p.state == s))
            .filter(|p| query.category.as_ref().map_or(true, |c| &p.category == c))
            .filter(|p| query.status.map_or(true, |s| p.verification_status == s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn update(&self, professional: Professional) -> Result<Professional, DatabaseError> {
        let mut rows = self.rows.lock().await;
        let existing = rows.get_mut(&professional.id).ok_or(DatabaseError::NotFound)?;
        if existing.version != professional.version {
            return Err(DatabaseError::Conflict(format!(
                "expected version {}, found {}",
                professional.version, existing.version
            )));
        }

        *existing = Professional {
            version: professional.version + 1,
            ..professional
        };
        Ok(existing.clone())
    }
}

#[derive(Default)]
pub struct InMemoryAvailabilityStore {
    rows: Mutex<HashMap<Uuid, AvailabilityWindow>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn insert(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, DatabaseError> {
        self.rows.lock().await.insert(window.id, window.clone());
        Ok(window)
    }

    async fn update(
        &self,
        professional_id: Uuid,
        window_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AvailabilityWindow, DatabaseError> {
        let mut rows = self.rows.lock().await;
        let window = rows
            .get_mut(&window_id)
            .filter(|w| w.professional_id == professional_id)
            .ok_or(DatabaseError::NotFound)?;

        window.from = from;
        window.to = to;
        Ok(window.clone())
    }

    async fn delete(&self, professional_id: Uuid, window_id: Uuid) -> Result<(), DatabaseError> {
        let mut rows = self.rows.lock().await;
        match rows.get(&window_id) {
            Some(w) if w.professional_id == professional_id => {
                rows.remove(&window_id);
                Ok(())
            }
            _ => Err(DatabaseError::NotFound),
        }
    }

    async fn list(
        &self,
        professional_id: Uuid,
        range: &TimeRange,
    ) -> Result<Vec<AvailabilityWindow>, DatabaseError> {
        let rows = self.rows.lock().await;
        let mut windows: Vec<AvailabilityWindow> = rows
            .values()
            .filter(|w| w.professional_id == professional_id)
            .filter(|w| range.touches(w.from, w.to))
            .cloned()
            .collect();
        windows.sort_by(|a, b| a.from.cmp(&b.from).then(a.id.cmp(&b.id)));
        Ok(windows)
    }
}
