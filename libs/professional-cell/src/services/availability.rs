use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{AvailabilityWindow, ProfessionalError, TimeRange};
use crate::store::AvailabilityStore;

/// Manages the windows during which a professional accepts bookings.
/// Windows may overlap each other; that is harmless for slot resolution.
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn AvailabilityStore>) -> Self {
        Self { store }
    }

    pub async fn add_window(
        &self,
        professional_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AvailabilityWindow, ProfessionalError> {
        validate_range(from, to)?;

        let window = AvailabilityWindow {
            id: Uuid::new_v4(),
            professional_id,
            from,
            to,
            created_at: Utc::now(),
        };

        let window = self.store.insert(window).await?;
        info!("Added availability window {} for professional {}", window.id, professional_id);
        Ok(window)
    }

    pub async fn update_window(
        &self,
        professional_id: Uuid,
        window_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AvailabilityWindow, ProfessionalError> {
        validate_range(from, to)?;

        self.store
            .update(professional_id, window_id, from, to)
            .await
            .map_err(window_error)
    }

    pub async fn delete_window(
        &self,
        professional_id: Uuid,
        window_id: Uuid,
    ) -> Result<(), ProfessionalError> {
        self.store
            .delete(professional_id, window_id)
            .await
            .map_err(window_error)?;

        info!("Deleted availability window {} for professional {}", window_id, professional_id);
        Ok(())
    }

    /// Windows ordered by start. With a range, only windows touching it
    /// (inclusive at both ends) are returned.
    pub async fn list_windows(
        &self,
        professional_id: Uuid,
        range: Option<TimeRange>,
    ) -> Result<Vec<AvailabilityWindow>, ProfessionalError> {
        let range = range.unwrap_or_default();
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(ProfessionalError::InvalidRange(
                    "range start must not be after range end".to_string(),
                ));
            }
        }

        let mut windows = self.store.list(professional_id, &range).await?;
        windows.sort_by(|a, b| a.from.cmp(&b.from).then(a.id.cmp(&b.id)));
        debug!("Found {} windows for professional {}", windows.len(), professional_id);
        Ok(windows)
    }
}

fn validate_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), ProfessionalError> {
    if from >= to {
        return Err(ProfessionalError::InvalidRange(
            "window start must be before window end".to_string(),
        ));
    }
    Ok(())
}

fn window_error(err: shared_database::DatabaseError) -> ProfessionalError {
    match ProfessionalError::from(err) {
        ProfessionalError::NotFound => ProfessionalError::WindowNotFound,
        other => other,
    }
}
